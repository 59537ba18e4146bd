//! Spherical harmonics conversion

/// Number of RGB coefficients in the 3-band estimate
pub const SPHERICAL_HARMONICS_COEFFICIENTS: usize = 27;

/// Per-band factors turning Environmental HDR radiance coefficients into renderer
/// irradiance coefficients. Bands 6 and 7 are stored in opposite order by the two
/// conventions, so their factors are swapped here.
pub const IRRADIANCE_FACTORS: [f32; 9] = [
    0.282095, -0.325735, 0.325735, -0.325735, 0.273137, -0.273137, -0.273137, 0.078848, 0.136569,
];

/// Scale each RGB triple by its band factor
pub fn to_irradiance(
    coefficients: &[f32; SPHERICAL_HARMONICS_COEFFICIENTS],
) -> [f32; SPHERICAL_HARMONICS_COEFFICIENTS] {
    let mut irradiance = [0.0; SPHERICAL_HARMONICS_COEFFICIENTS];
    for (index, (out, value)) in irradiance.iter_mut().zip(coefficients).enumerate() {
        *out = value * IRRADIANCE_FACTORS[index / 3];
    }
    irradiance
}
