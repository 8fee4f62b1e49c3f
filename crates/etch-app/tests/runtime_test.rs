//! Runtime tests under paused tokio time.

use std::time::Duration;

use etch_app::{BroadcastRoom, Channel, Runtime, RuntimeConfig, RuntimeError, SystemEnv};
use etch_core::{Message, ParticipantRole, Point, SyncConfig, SyncState};
use etch_proto::decode;
use tokio::time::Instant;

fn host() -> RuntimeConfig {
    RuntimeConfig { role: ParticipantRole::Host, ..Default::default() }
}

#[tokio::test(start_paused = true)]
async fn joiner_requests_on_backoff_schedule() {
    let room = BroadcastRoom::new(64);
    let mut observer = room.join("a");
    let channel = room.join("b");

    let config = RuntimeConfig::default();
    let (runtime, handle) =
        Runtime::new(SystemEnv::new(), "b", channel, SyncConfig::default(), &config);
    let task = tokio::spawn(runtime.run());

    let start = Instant::now();
    handle.activate_surface(1).await.unwrap();

    let mut sent_at = Vec::new();
    for _ in 0..3 {
        let inbound = observer.recv().await.unwrap();
        assert_eq!(inbound.sender_id, "b");
        assert_eq!(decode(&inbound.payload).unwrap(), Message::StateRequest {
            requester_id: "b".into()
        });
        sent_at.push(start.elapsed());
    }

    for (elapsed, expected_ms) in sent_at.iter().zip([0u64, 3000, 9000]) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            *elapsed >= expected && *elapsed < expected + Duration::from_millis(10),
            "request at {elapsed:?}, expected {expected:?}"
        );
    }

    let mut view = handle.subscribe();
    view.wait_for(|v| v.sync_state == SyncState::Synced).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(21000));

    // No fourth request
    let extra = tokio::time::timeout(Duration::from_secs(60), observer.recv()).await;
    assert!(extra.is_err());

    drop(view);
    drop(handle);
    // Exit tears the session down
    let controller = task.await.unwrap();
    assert_eq!(controller.sync_state(), SyncState::Idle);
    assert_eq!(controller.next_deadline(), None);
}

#[tokio::test(start_paused = true)]
async fn late_joiner_receives_existing_strokes() {
    let room = BroadcastRoom::new(64);
    let channel_a = room.join("a");
    let (runtime_a, handle_a) =
        Runtime::new(SystemEnv::new(), "a", channel_a, SyncConfig::default(), &host());
    let task_a = tokio::spawn(runtime_a.run());

    handle_a.activate_surface(0).await.unwrap();
    handle_a.start_stroke(Point::new(0.1, 0.1)).await.unwrap();
    handle_a.extend_stroke(vec![Point::new(0.2, 0.2), Point::new(0.3, 0.3)]).await.unwrap();
    handle_a.finish_stroke().await.unwrap();

    let mut view_a = handle_a.subscribe();
    view_a.wait_for(|v| v.strokes.len() == 1 && v.local_stroke.is_none()).await.unwrap();

    let channel_b = room.join("b");
    let remote_peers = channel_b.remote_peer_count();
    let config = RuntimeConfig::default();
    let (runtime_b, handle_b) =
        Runtime::new(SystemEnv::new(), "b", channel_b, SyncConfig::default(), &config);
    let task_b = tokio::spawn(runtime_b.run());

    let start = Instant::now();
    handle_b.activate_surface(remote_peers).await.unwrap();

    let mut view_b = handle_b.subscribe();
    view_b.wait_for(|v| v.sync_state == SyncState::Synced).await.unwrap();
    assert!(start.elapsed() <= Duration::from_millis(110));

    let synced = handle_b.view();
    assert_eq!(synced.strokes, handle_a.view().strokes);
    assert_eq!(synced.strokes[0].points.len(), 3);
    assert!(synced.active_strokes.is_empty());

    drop((view_a, view_b, handle_a, handle_b));
    task_a.await.unwrap();
    task_b.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn privileged_commands_are_gated_by_role() {
    let room = BroadcastRoom::new(64);
    let (runtime_a, host_handle) =
        Runtime::new(SystemEnv::new(), "a", room.join("a"), SyncConfig::default(), &host());
    let (runtime_b, guest_handle) = Runtime::new(
        SystemEnv::new(),
        "b",
        room.join("b"),
        SyncConfig::default(),
        &RuntimeConfig::default(),
    );
    let task_a = tokio::spawn(runtime_a.run());
    let task_b = tokio::spawn(runtime_b.run());

    host_handle.activate_surface(1).await.unwrap();
    guest_handle.activate_surface(1).await.unwrap();

    host_handle.start_stroke(Point::new(0.5, 0.5)).await.unwrap();
    host_handle.finish_stroke().await.unwrap();

    let mut guest_view = guest_handle.subscribe();
    guest_view.wait_for(|v| v.strokes.len() == 1).await.unwrap();
    let stroke_id = guest_handle.view().strokes[0].id.clone();

    // Participants may neither clear nor delete someone else's stroke
    assert!(!guest_handle.clear_all().await.unwrap());
    assert!(!guest_handle.delete_stroke(&stroke_id).await.unwrap());
    assert!(!guest_handle.delete_stroke("missing").await.unwrap());

    assert!(host_handle.clear_all().await.unwrap());
    guest_view.wait_for(|v| v.strokes.is_empty()).await.unwrap();
    assert!(host_handle.view().strokes.is_empty());

    drop((guest_view, host_handle, guest_handle));
    task_a.await.unwrap();
    task_b.await.unwrap();
}

#[tokio::test]
async fn handle_reports_stopped_runtime() {
    let room = BroadcastRoom::new(8);
    let (runtime, handle) = Runtime::new(
        SystemEnv::new(),
        "a",
        room.join("a"),
        SyncConfig::default(),
        &RuntimeConfig::default(),
    );
    drop(runtime);

    assert_eq!(handle.finish_stroke().await, Err(RuntimeError::Stopped));
}
