//! Common types shared between the view components and the renderer

use glam::{Mat4, Vec2, Vec3};

use super::traits::{BufferHandle, TextureHandle};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    /// Two 8-bit channels, used for the packed 16-bit depth image
    Rg8Unorm,
    Rgb16Float,
    Rgba16Float,
    R11G11B10Float,
    /// Opaque texture owned by the camera driver (OES / external image)
    External,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::R11G11B10Float
            | TextureFormat::External => 4,
            TextureFormat::Rgb16Float => 6,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Shape of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D2,
    Cube,
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            mip_levels: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_DST: Self = Self(1 << 3);
    pub const INDEX: Self = Self(1 << 4);
    pub const VERTEX: Self = Self(1 << 5);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn vertex(label: &str, size: u64) -> Self {
        Self {
            label: Some(label.to_string()),
            size,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        }
    }

    pub fn index(label: &str, size: u64) -> Self {
        Self {
            label: Some(label.to_string()),
            size,
            usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
        }
    }
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
        }
    }
}

/// Semantic of a vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSemantic {
    Position,
    Uv0,
}

/// One vertex stream bound to a renderable
#[derive(Debug, Clone)]
pub struct VertexStream {
    pub semantic: VertexSemantic,
    pub format: VertexFormat,
    pub buffer: BufferHandle,
}

/// Geometry of a renderable: vertex streams plus 16-bit indices
#[derive(Debug, Clone)]
pub struct Geometry {
    pub streams: Vec<VertexStream>,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

/// Material templates the renderer knows how to build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Camera feed without depth testing against the real world
    CameraStandard,
    /// Camera feed that writes real-world depth for occlusion
    CameraOcclusion,
    /// Detected plane grid with spotlight
    Plane,
    /// Transparent shadow catcher for planes
    PlaneShadow,
    /// Application-supplied material
    Custom(String),
}

/// Value of a material parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialParameter {
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4([f32; 4]),
    Mat4(Mat4),
}

/// Descriptor for a renderable entity added to the scene
#[derive(Debug, Clone)]
pub struct RenderableDescriptor {
    pub label: Option<String>,
    pub geometry: Geometry,
    pub material: super::traits::MaterialHandle,
    pub priority: u8,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub culling: bool,
}

/// Directional "main" light as applied to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainLightParams {
    /// Direction the light travels (from the light towards the scene)
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Image based ambient light as applied to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectLightParams {
    /// Irradiance spherical harmonics, 9 bands x RGB
    pub irradiance: Option<[f32; 27]>,
    /// Ambient color modulation (RGB scale factors)
    pub color: Vec3,
    pub intensity: f32,
    pub reflections: Option<TextureHandle>,
}
