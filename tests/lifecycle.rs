//! Session attachment, pause/resume sequencing and teardown.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ar_scene_sync::frame::{InlineExecutor, TaskHandle, ThreadExecutor};
use ar_scene_sync::tracking::*;
use ar_scene_sync::{ArError, ArSceneView, ArViewConfig, RecordingBackend, SyncStatus, TaskError, TickOutcome};
use common::*;
use glam::Vec3;
use parking_lot::Mutex;

/// Pump the render thread until every handle is done, noting completion order
fn pump_until_done(view: &ArSceneView<RecordingBackend>, handles: &[&TaskHandle]) -> Vec<usize> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut order = Vec::new();
    while order.len() < handles.len() && Instant::now() < deadline {
        view.pump_render_thread();
        for (index, handle) in handles.iter().enumerate() {
            if handle.is_done() && !order.contains(&index) {
                order.push(index);
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    order
}

fn pause_events(probe: &SessionProbe) -> Vec<String> {
    probe
        .events()
        .into_iter()
        .filter(|e| e.starts_with("pause"))
        .collect()
}

#[test]
fn test_overlapping_pauses_run_one_after_another() {
    init_logging();
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    probe.state.lock().pause_delay = Some(Duration::from_millis(30));

    let first = view.pause_async(Arc::new(ThreadExecutor));
    let second = view.pause_async(Arc::new(ThreadExecutor));
    assert!(!view.sequencer().is_idle());
    assert!(pause_events(&probe).is_empty());

    let order = pump_until_done(&view, &[&first, &second]);
    assert_eq!(order, vec![0, 1]);
    assert_eq!(first.result(), Some(Ok(())));
    assert_eq!(second.result(), Some(Ok(())));
    assert_eq!(
        pause_events(&probe),
        vec!["pause begin", "pause end", "pause begin", "pause end"]
    );
    assert!(view.sequencer().is_idle());
    assert!(!view.scheduler().is_running());
}

#[test]
fn test_frames_report_no_session_during_transition() {
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    probe.state.lock().pause_delay = Some(Duration::from_millis(50));
    probe.push_frame(FakeFrame::new(1));

    let handle = view.pause_async(Arc::new(ThreadExecutor));
    view.pump_render_thread();
    assert_eq!(view.on_begin_frame(), SyncStatus::NoSession);
    assert_eq!(probe.updates(), 0);

    pump_until_done(&view, &[&handle]);
    assert_eq!(view.on_begin_frame(), SyncStatus::NotReady);
}

#[test]
fn test_pause_then_resume_async() {
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    probe.push_frame(FakeFrame::new(1));

    let pause = view.pause_async(Arc::new(InlineExecutor));
    let resume = view.resume_async(Arc::new(InlineExecutor));
    let order = pump_until_done(&view, &[&pause, &resume]);
    assert_eq!(order, vec![0, 1]);
    assert_eq!(resume.result(), Some(Ok(())));

    let events = probe.events();
    let tail: Vec<&str> = events.iter().rev().take(4).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["pause begin", "pause end", "resume", "display Rotation0 1080x1920"]);

    assert!(view.scheduler().is_running());
    assert_eq!(view.do_frame(0), TickOutcome::Ran(SyncStatus::Updated));
}

#[test]
fn test_destroy_cancels_queued_transitions() {
    init_logging();
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    let floor = square_plane(1, Vec3::new(0.0, -1.0, -2.0));
    probe.push_frame(
        FakeFrame::new(1)
            .with_updated(vec![TrackedEntity::Plane(floor.clone())])
            .with_hits(vec![hit_on(&floor, 2.0)]),
    );
    view.on_begin_frame();

    let pending = view.pause_async(Arc::new(InlineExecutor));
    let backend = view.destroy();

    assert_eq!(pending.result(), Some(Err(TaskError::Cancelled)));
    let events = probe.events();
    assert_eq!(
        &events[events.len() - 3..],
        &["pause begin".to_string(), "pause end".to_string(), "close".to_string()]
    );
    assert_eq!(backend.live_renderables(), 0);
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.live_textures(), 0);
}

#[test]
fn test_destroy_during_background_pause() {
    init_logging();
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    probe.state.lock().pause_delay = Some(Duration::from_millis(100));
    let resumes = |probe: &SessionProbe| probe.events().iter().filter(|e| *e == "resume").count();
    let resumed_once = resumes(&probe);

    let running = view.pause_async(Arc::new(ThreadExecutor));
    let queued = view.resume_async(Arc::new(InlineExecutor));
    // Runs the render thread step and hands the session pause to a worker.
    view.pump_render_thread();

    let backend = view.destroy();
    assert_eq!(queued.result(), Some(Err(TaskError::Cancelled)));
    assert_eq!(
        running.wait_timeout(Duration::from_secs(2)),
        Some(Err(TaskError::Cancelled))
    );
    assert_eq!(resumes(&probe), resumed_once);
    assert_eq!(backend.live_renderables(), 0);
}

#[test]
fn test_replacing_session_closes_previous() {
    let (mut view, first) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    let (session, second) = FakeSession::new();
    view.set_session(session).unwrap();

    assert_eq!(first.events().last().map(String::as_str), Some("close"));
    assert!(!second.events().contains(&"close".to_string()));

    second.push_frame(FakeFrame::new(1));
    assert_eq!(view.on_begin_frame(), SyncStatus::NotReady);
    view.resume().unwrap();
    assert_eq!(view.on_begin_frame(), SyncStatus::Updated);
    assert!(second.events().contains(&format!("texture {CAMERA_TEXTURE_ID}")));
}

#[test]
fn test_session_config_listener() {
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    view.set_on_session_config_change(move |config| sink.lock().push(config.plane_finding_mode));

    let config = SessionConfig::default().with_plane_finding_mode(PlaneFindingMode::HorizontalAndVertical);
    view.set_session_config(config.clone(), true).unwrap();
    view.set_session_config(config.clone(), false).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![PlaneFindingMode::HorizontalAndVertical, PlaneFindingMode::HorizontalAndVertical]
    );
    assert_eq!(probe.events().iter().filter(|e| *e == "configure").count(), 1);
    assert_eq!(view.session_config(), Some(&config));
}

#[test]
fn test_configuring_without_session_fails() {
    let mut view = ArSceneView::new(RecordingBackend::new(), CAMERA_TEXTURE_ID, ArViewConfig::default()).unwrap();
    assert_eq!(
        view.set_session_config(SessionConfig::default(), true),
        Err(ArError::NoSession)
    );
    assert!(view.set_session_config(SessionConfig::default(), false).is_ok());

    view.resume().unwrap();
    view.pause();
    assert_eq!(view.on_begin_frame(), SyncStatus::NoSession);
}

#[test]
fn test_camera_config_sets_frame_rate_cap() {
    let mut view = ArSceneView::new(RecordingBackend::new(), CAMERA_TEXTURE_ID, ArViewConfig::default()).unwrap();
    assert_eq!(view.scheduler().max_frames_per_second(), 60);

    let camera_config = CameraConfig {
        fps_range: (15, 24),
        ..CameraConfig::default()
    };
    let (session, _probe) = FakeSession::with_config(SessionConfig::default(), camera_config);
    view.set_session(session).unwrap();
    assert_eq!(view.scheduler().max_frames_per_second(), 24);
    assert_eq!(view.camera_config(), Some(&camera_config));
    assert!(!view.backend().is_front_face_winding_inverted());
}

#[test]
fn test_layout_forwarded_to_session() {
    let (mut view, probe) = resumed_view(ArViewConfig::default(), SessionConfig::default());
    view.on_layout(1920, 1080, DisplayRotation::Rotation90);
    assert_eq!(
        probe.events().last().map(String::as_str),
        Some("display Rotation90 1920x1080")
    );
}
