use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use view_enhancer::kernel::event::EventKind;
use view_enhancer::kernel::scheduler::ScheduleStatus;
use view_enhancer::page::{
    AdMarkers, CreatorIdentity, PageAction, PageActuator, PageFrame, PageSensor, ScriptedPage,
};
use view_enhancer::settings::{ConfigurationRequests, InMemorySettings, PreferenceSource, ViewerSettings};
use view_enhancer::{Engine, EngineConfig, EngineError};

const WATCH: &str = "https://video.example/watch?v=abc";

fn promo_markers() -> AdMarkers {
    AdMarkers {
        badge: Some("Sponsored".into()),
        ad_showing: true,
        skip_button: true,
        ..Default::default()
    }
}

fn watch_frame() -> PageFrame {
    PageFrame {
        url: WATCH.into(),
        creator: CreatorIdentity {
            creator_id: "UC-news".into(),
            creator_name: "Daily News".into(),
            avatar_url: String::new(),
        },
        skip_controls: vec!["skip".into()],
        playback_position: Some(12.0),
        ..Default::default()
    }
}

fn setup(frame: PageFrame) -> (Arc<ScriptedPage>, Arc<InMemorySettings>, Engine) {
    let page = Arc::new(ScriptedPage::new(frame));
    let settings = Arc::new(InMemorySettings::new(ViewerSettings::default()));
    let sensor: Arc<dyn PageSensor> = page.clone();
    let actuator: Arc<dyn PageActuator> = page.clone();
    let preferences: Arc<dyn PreferenceSource> = settings.clone();
    let requests: Arc<dyn ConfigurationRequests> = settings.clone();
    let engine = Engine::new(EngineConfig::default(), sensor, actuator, preferences, requests);
    (page, settings, engine)
}

fn inserted(page: &ScriptedPage) -> usize {
    page.actions()
        .iter()
        .filter(|a| **a == PageAction::ConfigAffordanceInserted)
        .count()
}

async fn ticks(n: usize) {
    for _ in 0..n {
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_integrity_failure_prevents_startup() {
    let (page, _settings, engine) = setup(watch_frame());
    let result = engine.launch(&|| false);
    assert!(matches!(result, Err(EngineError::IntegrityRejected)));
    assert!(!engine.is_running());
    assert_eq!(engine.bus().subscriber_count(EventKind::Tick), 0);

    ticks(5).await;
    assert!(page.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_embedded_frame_is_refused() {
    let mut frame = watch_frame();
    frame.embedded = true;
    let (_page, _settings, engine) = setup(frame);
    assert!(matches!(engine.launch(&|| true), Err(EngineError::EmbeddedFrame)));
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_promotion_is_muted_skipped_and_restored() {
    let (page, _settings, engine) = setup(watch_frame());
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;

    page.update(|f| f.markers = promo_markers());
    ticks(1).await;
    assert!(matches!(engine.schedule_status(), ScheduleStatus::Scheduled { .. }));
    assert!(page.frame().muted);
    assert_eq!(page.countdown(), Some(5));

    ticks(30).await;
    assert_eq!(page.activations(), vec!["skip"]);
    assert_eq!(engine.schedule_status(), ScheduleStatus::Idle);

    page.update(|f| f.markers = AdMarkers::default());
    ticks(1).await;
    assert!(!page.frame().muted);

    // VERIFY: Skipped exactly once over the whole promotion.
    ticks(10).await;
    assert_eq!(page.activations(), vec!["skip"]);
    engine.stop(&handle);
}

#[tokio::test(start_paused = true)]
async fn test_url_change_drops_pending_enhancement() {
    let mut frame = watch_frame();
    frame.markers = promo_markers();
    let (page, _settings, engine) = setup(frame);
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;
    assert!(!engine.scheduler().is_idle());

    page.update(|f| f.url = "https://video.example/watch?v=next".into());
    ticks(1).await;

    assert!(engine.scheduler().is_idle());
    assert_eq!(page.countdown(), None);
    ticks(30).await;
    assert!(page.activations().is_empty());
    engine.stop(&handle);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_pending_from_countdown() {
    let mut frame = watch_frame();
    frame.markers = promo_markers();
    let (page, _settings, engine) = setup(frame);
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;

    assert!(engine.cancel_pending());
    ticks(30).await;
    assert!(page.activations().is_empty());
    assert!(page.actions().contains(&PageAction::CountdownRemoved));
    engine.stop(&handle);
}

#[tokio::test(start_paused = true)]
async fn test_overlays_dismissed_every_tick() {
    let mut frame = watch_frame();
    frame.overlay_controls = vec!["banner-close".into()];
    let (page, _settings, engine) = setup(frame);
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;
    ticks(2).await;

    let closed = page.activations().iter().filter(|id| *id == "banner-close").count();
    assert_eq!(closed, 3);
    engine.stop(&handle);
}

#[tokio::test(start_paused = true)]
async fn test_config_affordance_kept_in_page() {
    let mut frame = watch_frame();
    frame.config_container = true;
    let (page, settings, engine) = setup(frame);
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;

    assert_eq!(inserted(&page), 1);

    ticks(3).await;
    assert_eq!(inserted(&page), 1);

    // A new document drops the affordance; it comes back once.
    page.navigate("https://video.example/watch?v=other");
    ticks(2).await;
    assert_eq!(inserted(&page), 2);

    assert!(engine.configure_current_creator());
    let requests = settings.configuration_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].creator_id, "UC-news");
    engine.stop(&handle);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_creator_is_not_configured() {
    let mut frame = watch_frame();
    frame.creator = CreatorIdentity::default();
    let (_page, settings, engine) = setup(frame);
    assert!(!engine.configure_current_creator());
    assert!(settings.configuration_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_launch_does_not_rewire() {
    let (_page, _settings, engine) = setup(watch_frame());
    let first = engine.launch(&|| true).unwrap();
    let wired = engine.bus().subscriber_count(EventKind::Tick);
    let _second = engine.launch(&|| true).unwrap();
    assert_eq!(engine.bus().subscriber_count(EventKind::Tick), wired);

    engine.stop(&first);
    assert!(!engine.is_running());

    // A relaunch after stop starts a fresh loop on the same wiring.
    let third = engine.launch(&|| true).unwrap();
    assert!(engine.is_running());
    assert_eq!(engine.bus().subscriber_count(EventKind::Tick), wired);
    engine.stop(&third);
}

#[tokio::test(start_paused = true)]
async fn test_external_subscribers_see_events() {
    let (page, _settings, engine) = setup(watch_frame());
    let started = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&started);
    let sub = engine.subscribe(EventKind::PromotionStarted, move |e| {
        assert!(e.current.is_promotion_active());
        s.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;
    page.update(|f| f.markers = promo_markers());
    ticks(2).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);

    sub.dispose();
    page.update(|f| f.markers.visit_advertiser = Some("Visit".into()));
    ticks(1).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    engine.stop(&handle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_drops_schedule_and_restores_volume() {
    let mut frame = watch_frame();
    frame.markers = promo_markers();
    let (page, _settings, engine) = setup(frame);
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;
    assert!(!engine.scheduler().is_idle());
    assert!(page.frame().muted);

    engine.stop(&handle);

    // VERIFY: Nothing of the session is left on the page.
    assert!(engine.scheduler().is_idle());
    assert_eq!(page.countdown(), None);
    assert!(!page.frame().muted);

    tokio::time::advance(Duration::from_secs(40)).await;
    tokio::task::yield_now().await;
    assert!(page.activations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_leaves_user_mute_alone() {
    let mut frame = watch_frame();
    frame.muted = true;
    let (page, _settings, engine) = setup(frame);
    let handle = engine.launch(&|| true).unwrap();
    tokio::task::yield_now().await;

    engine.stop(&handle);
    assert!(page.frame().muted);
}
