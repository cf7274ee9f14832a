use super::*;

use canvas::geom::Rect;

use crate::services::test_helpers::MemoryStore;

fn add(name: &str, x: f64) -> Command {
    Command::AddWidget { widget_type: "cpu".into(), rect: Rect::new(x, 0.0, 100.0, 100.0), id: Some(name.into()) }
}

async fn open(store: &Arc<MemoryStore>) -> Session {
    Session::open(store.clone(), "main", EngineConfig::default()).await.unwrap()
}

fn saved_widget_count(store: &MemoryStore) -> usize {
    let text = store.get("main").unwrap();
    CanvasSnapshot::parse(&text, EngineConfig::default().zoom).unwrap().widgets.len()
}

// =============================================================================
// open
// =============================================================================

#[tokio::test(start_paused = true)]
async fn open_missing_profile_starts_empty() {
    let store = Arc::new(MemoryStore::default());
    let session = open(&store).await;
    assert!(session.core().canvas().is_empty());
    assert_eq!(session.core().save_status(), &SaveStatus::Idle);
    assert_eq!(session.profile(), "main");
}

#[tokio::test(start_paused = true)]
async fn open_existing_profile_restores_canvas() {
    let store = Arc::new(MemoryStore::default());
    let mut first = open(&store).await;
    first.apply(add("w1", 0.0));
    assert!(matches!(first.flush().await, SaveStatus::Saved { .. }));

    let second = open(&store).await;
    assert_eq!(second.core().canvas(), first.core().canvas());
    assert_eq!(second.core().history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn open_corrupt_profile_fails() {
    let store: Arc<dyn ProfileStore> = Arc::new(MemoryStore::with_profile("main", "{\"widgets\": 3}"));
    let err = Session::open(store, "main", EngineConfig::default()).await.err().unwrap();
    assert!(matches!(err, SessionError::Corrupt { .. }));
    assert!(err.to_string().contains("main"));
}

// =============================================================================
// run loop
// =============================================================================

#[tokio::test(start_paused = true)]
async fn run_saves_after_debounce_window() {
    let store = Arc::new(MemoryStore::default());
    let mut session = open(&store).await;
    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(async move {
        let status = session.run(rx).await;
        (session, status)
    });

    tx.send(add("w1", 0.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(store.get("main").is_none());

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(saved_widget_count(&store), 1);
    assert_eq!(store.save_attempts(), 1);

    drop(tx);
    let (session, status) = handle.await.unwrap();
    assert!(matches!(status, SaveStatus::Saved { .. }));
    assert!(!session.core().is_dirty());
    assert_eq!(store.save_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn closing_the_command_channel_flushes_immediately() {
    let store = Arc::new(MemoryStore::default());
    let mut session = open(&store).await;
    let (tx, rx) = mpsc::channel(8);
    tx.send(add("w1", 0.0)).await.unwrap();
    tx.send(add("w2", 300.0)).await.unwrap();
    drop(tx);

    let status = session.run(rx).await;
    assert!(matches!(status, SaveStatus::Saved { .. }));
    assert_eq!(saved_widget_count(&store), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_saves_retry_with_backoff() {
    let store = Arc::new(MemoryStore::failing(2));
    let mut session = open(&store).await;
    session.apply(add("w1", 0.0));
    let opened_at = Instant::now();

    let status = session.flush().await;
    assert!(matches!(status, SaveStatus::Saved { .. }));
    assert_eq!(store.save_attempts(), 3);
    // Two retries: 2 s then 4 s.
    assert!(opened_at.elapsed() >= Duration::from_millis(6_000));
    assert_eq!(saved_widget_count(&store), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_failure() {
    let store = Arc::new(MemoryStore::failing(100));
    let mut session = open(&store).await;
    session.apply(add("w1", 0.0));

    let status = session.flush().await;
    match status {
        SaveStatus::Failed { attempts, message } => {
            assert_eq!(attempts, 4);
            assert!(message.contains("disk full"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(session.core().is_dirty());
    assert_eq!(session.core().canvas().total_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_with_nothing_dirty_is_immediate() {
    let store = Arc::new(MemoryStore::default());
    let mut session = open(&store).await;
    assert_eq!(session.flush().await, SaveStatus::Idle);
    assert_eq!(store.save_attempts(), 0);
}

// =============================================================================
// apply / subscribe
// =============================================================================

#[tokio::test(start_paused = true)]
async fn subscribers_see_every_action() {
    let store = Arc::new(MemoryStore::default());
    let mut session = open(&store).await;
    let mut actions = session.subscribe();
    let returned = session.apply(add("w1", 0.0));

    let mut seen = Vec::new();
    while let Ok(action) = actions.try_recv() {
        seen.push(action);
    }
    assert_eq!(seen, returned);
    assert!(seen.iter().any(|a| matches!(a, Action::EntityAdded { .. })));
}

#[tokio::test(start_paused = true)]
async fn momentum_frames_are_scheduled_by_the_loop() {
    use canvas::geom::Point;
    use canvas::input::{DeltaMode, Modifiers, WheelDelta};

    let store = Arc::new(MemoryStore::default());
    let mut session = open(&store).await;
    let (tx, rx) = mpsc::channel(8);
    let wheel = Command::Wheel {
        screen: Point::new(0.0, 0.0),
        delta: WheelDelta { dx: 0.0, dy: -100.0, mode: DeltaMode::Pixel },
        modifiers: Modifiers::default(),
    };
    tx.send(wheel).await.unwrap();
    let handle = tokio::spawn(async move {
        session.run(rx).await;
        session
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    drop(tx);
    let session = handle.await.unwrap();
    assert!(!session.core().momentum_active());
    assert!(session.core().viewport().zoom > 1.05);
}
