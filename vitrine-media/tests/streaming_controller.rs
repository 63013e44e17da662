mod common;

use std::time::Duration;

use common::{CountingPeakSource, FakePlatform, FakeSurface, SessionCall};
use vitrine_media::streaming::{
    CapReason, DeliveryMode, NetworkConditions, ReadinessSignal, RecoveryAction, StreamError,
    StreamErrorKind, StreamEvent, StreamQualityLevel,
};
use vitrine_media::{DocumentVisibility, MediaMount, StreamState};

const SRC: &str = "https://cdn.example/hero/master.m3u8";

fn levels() -> Vec<StreamQualityLevel> {
    [(360, 800_000), (480, 1_400_000), (720, 2_800_000), (1080, 5_000_000)]
        .into_iter()
        .map(|(height, bandwidth)| StreamQualityLevel {
            height: Some(height),
            width: Some(height * 16 / 9),
            bandwidth,
            uri: format!("https://cdn.example/hero/{height}p.m3u8"),
        })
        .collect()
}

fn downlink(mbps: f64) -> Option<NetworkConditions> {
    Some(NetworkConditions {
        save_data: false,
        downlink_mbps: Some(mbps),
    })
}

fn fatal(kind: StreamErrorKind) -> StreamEvent {
    StreamEvent::Error(StreamError {
        kind,
        fatal: true,
        details: "fragLoadError".into(),
    })
}

fn hero() -> MediaMount {
    MediaMount::new(SRC).with_poster("https://cdn.example/hero/poster.jpg")
}

#[test]
fn adaptive_attach_caps_quality_once_the_manifest_is_parsed() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    let platform = FakePlatform::adaptive(downlink(3.0));
    let controller = runtime.stream_controller(surface.clone(), platform.clone(), hero());

    controller.attach();
    assert_eq!(controller.mode(), Some(DeliveryMode::Adaptive));
    assert_eq!(controller.state(), StreamState::Attaching);
    assert_eq!(
        platform.session(0).calls(),
        vec![
            SessionCall::Attach,
            SessionCall::LevelCap(None),
            SessionCall::Load(SRC.to_string())
        ]
    );

    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });

    let cap = controller.cap().expect("levels are known");
    assert_eq!(cap.max_level, 2);
    assert_eq!(cap.max_height, Some(720));
    assert_eq!(cap.reason, CapReason::Downlink { mbps: 3.0 });
    assert_eq!(platform.session(0).last_level_cap(), Some(Some(2)));
    assert_eq!(controller.state(), StreamState::Buffering);
    assert_eq!(controller.levels().len(), 4);
    assert_eq!(surface.play_calls(), 1);
}

#[test]
fn save_data_pins_the_lowest_level() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(Some(NetworkConditions {
        save_data: true,
        downlink_mbps: Some(50.0),
    }));
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();

    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });

    let cap = controller.cap().unwrap();
    assert_eq!(cap.max_level, 0);
    assert_eq!(cap.reason, CapReason::SaveData);
    assert_eq!(platform.session(0).last_level_cap(), Some(Some(0)));
}

#[test]
fn unknown_network_uses_the_default_ceiling() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform, hero());
    controller.attach();

    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });

    let cap = controller.cap().unwrap();
    assert_eq!(cap.max_height, Some(720));
    assert_eq!(cap.reason, CapReason::Default);
}

#[test]
fn network_change_recomputes_the_cap() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(downlink(1.0));
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();
    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });
    assert_eq!(controller.cap().unwrap().max_level, 0);

    platform.set_network(downlink(12.0));
    controller.on_network_change();

    assert_eq!(controller.cap().unwrap().max_level, 3);
    assert_eq!(platform.session(0).last_level_cap(), Some(Some(3)));
}

#[test]
fn native_playback_is_used_without_an_adaptive_engine() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    surface.update(|state| state.native_hls = true);
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::without_adaptive(), hero());

    controller.attach();

    assert_eq!(controller.mode(), Some(DeliveryMode::Native));
    assert_eq!(controller.state(), StreamState::Buffering);
    assert_eq!(surface.snapshot().src.as_deref(), Some(SRC));
    assert_eq!(surface.play_calls(), 1);
}

#[test]
fn failed_session_falls_back_to_native_playback() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    surface.update(|state| state.native_hls = true);
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::unavailable(), hero());

    controller.attach();

    assert_eq!(controller.mode(), Some(DeliveryMode::Native));
}

#[test]
fn no_playback_path_detaches_and_keeps_the_poster() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::without_adaptive(), hero());

    controller.attach();

    assert_eq!(controller.state(), StreamState::Detached);
    assert_eq!(controller.poster(), Some("https://cdn.example/hero/poster.jpg"));
    assert_eq!(surface.play_calls(), 0);
    assert_eq!(surface.snapshot().src, None);
}

#[test]
fn attach_only_runs_once() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());

    controller.attach();
    controller.attach();

    assert_eq!(platform.sessions().len(), 1);
}

#[test]
fn fatal_network_errors_restart_loading_until_the_budget_runs_out() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();

    for _ in 0..3 {
        controller.handle_event(fatal(StreamErrorKind::Network));
    }
    let session = platform.session(0);
    assert_eq!(session.count(&SessionCall::StartLoad), 3);
    assert_eq!(controller.state(), StreamState::Recovering);

    controller.handle_event(fatal(StreamErrorKind::Network));

    assert_eq!(controller.state(), StreamState::Detached);
    assert_eq!(session.count(&SessionCall::StartLoad), 3);
    assert_eq!(session.count(&SessionCall::Destroy), 1);
}

#[test]
fn playing_again_refills_the_recovery_budget() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();

    for _ in 0..3 {
        controller.handle_event(fatal(StreamErrorKind::Network));
    }
    controller.on_playing();
    controller.handle_event(fatal(StreamErrorKind::Network));

    assert_eq!(controller.state(), StreamState::Recovering);
    assert_eq!(platform.session(0).count(&SessionCall::StartLoad), 4);
}

#[test]
fn fatal_media_errors_have_their_own_budget() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();

    controller.handle_event(fatal(StreamErrorKind::Media));
    controller.handle_event(fatal(StreamErrorKind::Media));
    assert_eq!(platform.session(0).count(&SessionCall::RecoverMedia), 2);
    assert_eq!(controller.state(), StreamState::Recovering);

    controller.handle_event(fatal(StreamErrorKind::Media));
    assert_eq!(controller.state(), StreamState::Detached);
}

#[test]
fn other_fatal_errors_detach_immediately() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();

    controller.handle_event(fatal(StreamErrorKind::Other));

    assert_eq!(controller.state(), StreamState::Detached);
    assert_eq!(platform.session(0).count(&SessionCall::Destroy), 1);
}

#[test]
fn non_fatal_errors_are_left_to_the_session() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();
    let before = platform.session(0).calls();

    controller.handle_event(StreamEvent::Error(StreamError {
        kind: StreamErrorKind::Network,
        fatal: false,
        details: "fragLoadTimeOut".into(),
    }));

    assert_eq!(controller.state(), StreamState::Attaching);
    assert_eq!(platform.session(0).calls(), before);
}

#[test]
fn buffer_stall_reloads_and_playing_clears_it() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();
    controller.on_playing();

    controller.handle_event(StreamEvent::BufferStalled);
    assert_eq!(controller.state(), StreamState::Recovering);
    assert_eq!(platform.session(0).count(&SessionCall::StartLoad), 1);

    controller.on_playing();
    assert_eq!(controller.state(), StreamState::Playing);
    controller.on_waiting();
    assert_eq!(controller.state(), StreamState::Stalled);
}

#[test]
fn refused_autoplay_is_retried_on_readiness_signals() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    surface.update(|state| {
        state.native_hls = true;
        state.reject_play = true;
    });
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::without_adaptive(), hero());

    controller.attach();
    controller.on_readiness(ReadinessSignal::CanPlay);
    assert_eq!(surface.play_calls(), 2);
    assert!(surface.snapshot().paused);

    surface.update(|state| state.reject_play = false);
    controller.on_document_visibility(DocumentVisibility::Visible);
    assert_eq!(surface.play_calls(), 3);
    assert!(!surface.snapshot().paused);

    controller.on_readiness(ReadinessSignal::CanPlayThrough);
    assert_eq!(surface.play_calls(), 3);
}

#[test]
fn teardown_is_idempotent_and_silences_events() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(FakeSurface::new(), platform.clone(), hero());
    controller.attach();

    controller.teardown();
    controller.teardown();
    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });
    controller.on_playing();

    let session = platform.session(0);
    assert_eq!(session.count(&SessionCall::Destroy), 1);
    assert_eq!(session.last_level_cap(), Some(None));
    assert_eq!(controller.state(), StreamState::Detached);
    assert!(controller.watchdog_tick().is_none());
}

#[test]
fn native_teardown_clears_the_source() {
    let (runtime, _time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    surface.update(|state| state.native_hls = true);
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::without_adaptive(), hero());
    controller.attach();

    drop(controller);

    let snapshot = surface.snapshot();
    assert_eq!(snapshot.src, None);
    assert_eq!(snapshot.clears, 1);
}

#[test]
fn watchdog_escalates_resume_rebind_then_nudge() {
    let (runtime, time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    let platform = FakePlatform::adaptive(downlink(3.0));
    let controller = runtime.stream_controller(surface.clone(), platform.clone(), hero());
    controller.attach();
    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });
    surface.update(|state| state.position = 10.0);
    assert!(!controller.is_watchdog_running());

    assert_eq!(controller.watchdog_tick(), None);

    time.advance(Duration::from_secs(4));
    assert_eq!(controller.watchdog_tick(), Some(RecoveryAction::Resume));
    assert_eq!(surface.play_calls(), 2);
    assert_eq!(controller.state(), StreamState::Recovering);

    time.advance(Duration::from_secs(1));
    assert_eq!(controller.watchdog_tick(), None, "still cooling down");

    time.advance(Duration::from_secs(2));
    assert_eq!(controller.watchdog_tick(), Some(RecoveryAction::Rebind));
    assert_eq!(platform.session(0).count(&SessionCall::Destroy), 1);
    assert_eq!(platform.sessions().len(), 2);
    assert_eq!(
        platform.session(1).calls(),
        vec![
            SessionCall::Attach,
            SessionCall::LevelCap(Some(2)),
            SessionCall::Load(SRC.to_string())
        ]
    );
    assert_eq!(surface.seeks(), vec![10.0]);
    assert_eq!(surface.play_calls(), 3);

    time.advance(Duration::from_secs(3));
    match controller.watchdog_tick() {
        Some(RecoveryAction::Nudge { to }) => assert!((to - 9.9).abs() < 1e-9),
        other => panic!("expected a nudge, got {other:?}"),
    }
    assert_eq!(surface.seeks().len(), 2);
    assert_eq!(surface.play_calls(), 4);
}

#[test]
fn watchdog_ignores_background_tabs_and_paused_video() {
    let (runtime, time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::adaptive(None), hero());
    controller.attach();
    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });
    assert_eq!(controller.watchdog_tick(), None);

    controller.on_document_visibility(DocumentVisibility::Hidden);
    time.advance(Duration::from_secs(10));
    assert_eq!(controller.watchdog_tick(), None);

    controller.on_document_visibility(DocumentVisibility::Visible);
    surface.update(|state| state.paused = true);
    time.advance(Duration::from_secs(10));
    assert_eq!(controller.watchdog_tick(), None);

    surface.update(|state| state.paused = false);
    assert_eq!(controller.watchdog_tick(), None);
    time.advance(Duration::from_secs(4));
    assert_eq!(controller.watchdog_tick(), Some(RecoveryAction::Resume));
}

#[test]
fn progress_resets_the_escalation_ladder() {
    let (runtime, time) = common::runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    let controller =
        runtime.stream_controller(surface.clone(), FakePlatform::adaptive(None), hero());
    controller.attach();
    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });
    controller.watchdog_tick();

    time.advance(Duration::from_secs(4));
    assert_eq!(controller.watchdog_tick(), Some(RecoveryAction::Resume));

    surface.update(|state| state.position = 2.0);
    time.advance(Duration::from_secs(1));
    assert_eq!(controller.watchdog_tick(), None);

    time.advance(Duration::from_secs(4));
    assert_eq!(controller.watchdog_tick(), Some(RecoveryAction::Resume));
}

#[tokio::test(start_paused = true)]
async fn background_watchdog_runs_on_its_interval() {
    let runtime = common::tokio_clock_runtime(CountingPeakSource::empty());
    let surface = FakeSurface::new();
    let platform = FakePlatform::adaptive(None);
    let controller = runtime.stream_controller(surface.clone(), platform.clone(), hero());
    controller.attach();
    controller.handle_event(StreamEvent::ManifestParsed { levels: levels() });
    assert!(controller.is_watchdog_running());
    assert_eq!(surface.play_calls(), 1);

    // Samples at 4s (baseline), 8s (resume) and 12s (rebind).
    tokio::time::sleep(Duration::from_millis(14_500)).await;

    assert_eq!(surface.play_calls(), 3);
    assert_eq!(platform.sessions().len(), 2);

    controller.teardown();
    assert!(!controller.is_watchdog_running());
}
