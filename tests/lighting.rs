//! Light estimation through the view: anchoring, carry-forward and failure handling.

mod common;

use ar_scene_sync::lighting::BASE_INDIRECT_INTENSITY;
use ar_scene_sync::tracking::*;
use ar_scene_sync::{ArSceneView, ArViewConfig, LightEstimationConfig, RecordingBackend, SyncStatus};
use common::*;
use glam::Vec3;
use rstest::rstest;

fn hdr_estimate(timestamp: i64) -> RawLightEstimate {
    RawLightEstimate::hdr(
        timestamp,
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(2.0, 1.0, 0.5),
        [0.25; 27],
    )
}

fn hdr_view() -> (ArSceneView<RecordingBackend>, SessionProbe) {
    let config = ArViewConfig::default().with_light_estimation(LightEstimationConfig::ENVIRONMENTAL_HDR);
    resumed_view(config, SessionConfig::default())
}

/// Feed one HDR snapshot per camera x position, one tick each
fn run_trajectory(view: &mut ArSceneView<RecordingBackend>, probe: &SessionProbe, xs: &[f32]) {
    for (i, x) in xs.iter().enumerate() {
        let timestamp = i as i64 + 1;
        probe.push_frame(
            FakeFrame::new(timestamp)
                .with_camera_at(Vec3::new(*x, 0.0, 0.0))
                .with_light(hdr_estimate(timestamp)),
        );
        assert_eq!(view.on_begin_frame(), SyncStatus::Updated);
    }
}

#[rstest]
#[case::at_rest(&[0.0, 0.0], 1)]
#[case::within_threshold(&[0.0, 0.4], 1)]
#[case::beyond_threshold(&[0.0, 0.6], 2)]
#[case::drift_accumulates(&[0.0, 0.3, 0.6], 2)]
#[case::keeps_following(&[0.0, 0.6, 1.2], 3)]
fn test_light_anchor_follows_camera(#[case] xs: &[f32], #[case] expected_anchors: usize) {
    init_logging();
    let (mut view, probe) = hdr_view();
    run_trajectory(&mut view, &probe, xs);

    assert_eq!(view.light_estimator().anchor_recreations(), expected_anchors);
    assert_eq!(probe.anchors_created(), expected_anchors);
    for index in 0..expected_anchors - 1 {
        assert!(probe.anchor(index).lock().detached);
    }
    assert!(!probe.anchor(expected_anchors - 1).lock().detached);
}

#[test]
fn test_anchor_recreated_after_camera_moves() {
    let (mut view, probe) = hdr_view();
    run_trajectory(&mut view, &probe, &[0.0]);
    let first = view.estimated_environment_lights().hdr.clone().unwrap();
    assert_eq!(view.light_estimator().anchor().unwrap().pose().position(), Vec3::ZERO);

    probe.push_frame(
        FakeFrame::new(2)
            .with_camera_at(Vec3::new(0.6, 0.0, 0.0))
            .with_light(hdr_estimate(2)),
    );
    view.on_begin_frame();

    let anchor = view.light_estimator().anchor().unwrap();
    assert_eq!(anchor.pose().position(), Vec3::new(0.6, 0.0, 0.0));
    assert!(probe.anchor(0).lock().detached);
    let second = view.estimated_environment_lights().hdr.clone().unwrap();
    assert!((second.direction - first.direction).length() < 1e-5);
}

#[test]
fn test_anchor_recreated_when_tracking_lost() {
    let (mut view, probe) = hdr_view();
    run_trajectory(&mut view, &probe, &[0.0]);
    probe.anchor(0).lock().tracking_state = TrackingState::Paused;

    probe.push_frame(FakeFrame::new(2).with_light(hdr_estimate(2)));
    view.on_begin_frame();
    assert_eq!(probe.anchors_created(), 2);
    assert!(probe.anchor(0).lock().detached);
}

#[test]
fn test_hdr_lights_reach_renderer() {
    let (mut view, probe) = hdr_view();
    run_trajectory(&mut view, &probe, &[0.0]);

    let hdr = view.estimated_environment_lights().hdr.clone().unwrap();
    assert_eq!(hdr.direction, Vec3::Y);
    assert_eq!(hdr.color, Vec3::new(1.0, 0.5, 0.25));
    assert_eq!(hdr.intensity, 2.0);
    assert!(hdr.irradiance.is_some());

    let main_light = view.backend().main_light().unwrap();
    assert_eq!(main_light.direction, -Vec3::Y);
    assert!(view.backend().indirect_light().unwrap().irradiance.is_some());
}

#[test]
fn test_hdr_carries_forward_through_invalid_estimates() {
    let (mut view, probe) = hdr_view();
    run_trajectory(&mut view, &probe, &[0.0]);
    let valid = view.estimated_environment_lights().clone();
    assert!(valid.hdr.is_some());

    for timestamp in 2..5 {
        probe.push_frame(FakeFrame::new(timestamp).with_light(RawLightEstimate::not_valid(timestamp)));
        view.on_begin_frame();
        assert_eq!(view.estimated_environment_lights(), &valid);
    }
    assert_eq!(probe.anchors_created(), 1);
}

#[test]
fn test_ambient_carries_forward_through_invalid_estimates() {
    let config = ArViewConfig::default().with_light_estimation(LightEstimationConfig::AMBIENT_INTENSITY);
    let (mut view, probe) = resumed_view(config, SessionConfig::default());

    probe.push_frame(FakeFrame::new(1).with_light(RawLightEstimate::ambient(1, [0.5, 0.6, 0.7, 0.8])));
    view.on_begin_frame();
    let valid = view.estimated_environment_lights().clone();
    assert!(valid.hdr.is_none());
    assert!(valid.ambient.intensity > 0.0);

    probe.push_frame(FakeFrame::new(2).with_light(RawLightEstimate::not_valid(2)));
    probe.push_frame(FakeFrame::new(3));
    probe.push_frame(FakeFrame::new(4).with_light(RawLightEstimate::not_valid(4)));
    for _ in 0..3 {
        view.on_begin_frame();
        assert_eq!(view.estimated_environment_lights(), &valid);
    }
    assert_eq!(probe.anchors_created(), 0);
}

#[test]
fn test_anchor_creation_failure_is_survivable() {
    init_logging();
    let (mut view, probe) = hdr_view();
    probe.state.lock().fail_anchor_creation = true;

    run_trajectory(&mut view, &probe, &[0.0, 0.1]);
    assert!(view.estimated_environment_lights().hdr.is_none());
    assert_eq!(view.light_estimator().anchor_recreations(), 0);

    probe.state.lock().fail_anchor_creation = false;
    probe.push_frame(FakeFrame::new(10).with_light(hdr_estimate(10)));
    view.on_begin_frame();
    assert!(view.estimated_environment_lights().hdr.is_some());
}

#[test]
fn test_front_camera_disables_estimation() {
    let mut view = ArSceneView::new(RecordingBackend::new(), CAMERA_TEXTURE_ID, ArViewConfig::default()).unwrap();
    let camera_config = CameraConfig {
        facing_direction: FacingDirection::Front,
        ..CameraConfig::default()
    };
    let (session, probe) = FakeSession::with_config(SessionConfig::default(), camera_config);
    view.set_session(session).unwrap();
    view.resume().unwrap();

    assert!(view.backend().is_front_face_winding_inverted());
    assert_eq!(view.light_estimation_config(), &LightEstimationConfig::DISABLED);

    probe.push_frame(FakeFrame::new(1).with_light(hdr_estimate(1)));
    view.on_begin_frame();
    assert!(view.estimated_environment_lights().hdr.is_none());
    assert!(view.backend().main_light().is_none());
    assert_eq!(probe.anchors_created(), 0);
}

#[test]
fn test_capture_receives_next_hdr_estimate_once() {
    let (mut view, probe) = hdr_view();
    let captured = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&captured);
    view.capture_hdr_light_estimate(move |hdr| sink.lock().push(hdr.intensity));

    run_trajectory(&mut view, &probe, &[0.0, 0.1]);
    assert_eq!(*captured.lock(), vec![2.0]);
}

#[test]
fn test_exposure_scales_intensity() {
    let (mut view, probe) = hdr_view();
    view.set_camera_exposure_factor(0.5);
    run_trajectory(&mut view, &probe, &[0.0]);
    assert_eq!(view.estimated_environment_lights().hdr.as_ref().unwrap().intensity, 1.0);
    assert_eq!(view.backend().main_light().unwrap().intensity, 1.0);
}

#[test]
fn test_hdr_indirect_light_uses_base_intensity() {
    let (mut view, probe) = hdr_view();
    view.set_camera_exposure_factor(0.5);
    run_trajectory(&mut view, &probe, &[0.0, 0.1]);

    let hdr = view.estimated_environment_lights().hdr.clone().unwrap();
    assert_eq!(hdr.indirect_intensity, BASE_INDIRECT_INTENSITY);
    let indirect = view.backend().indirect_light().unwrap();
    assert_eq!(indirect.intensity, BASE_INDIRECT_INTENSITY);
    assert_eq!(indirect.color, Vec3::ONE);
}
