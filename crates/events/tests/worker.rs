//! Publisher -> worker -> emitter hand-off.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bloch_core::notification::NotificationDraft;
use bloch_events::{ConnectionRegistry, NotificationEmitter, NotificationPublisher, NotificationWorker};
use common::{InMemoryStore, RecordingTransport, Sent, StalledTransport};

#[tokio::test]
async fn worker_drains_queue_and_stops_when_publishers_drop() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(RecordingTransport::new());
    let emitter = Arc::new(NotificationEmitter::new(
        store.clone(),
        transport.clone(),
        Arc::new(ConnectionRegistry::new()),
    ));

    let (publisher, receiver) = NotificationPublisher::channel(16);
    let worker = tokio::spawn(NotificationWorker::new(emitter).run(receiver));

    for i in 0..5 {
        let draft = NotificationDraft::new("Brevet", "Created", format!("n{i}")).for_client(7);
        publisher.publish(draft, Some("u1")).unwrap();
    }
    publisher
        .publish(NotificationDraft::new("Maintenance", "Created", "global"), None)
        .unwrap();
    drop(publisher);

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker should stop after the queue closes")
        .unwrap();

    assert_eq!(store.notifications().len(), 6);
    let sent = transport.sent();
    assert_eq!(sent.len(), 6);
    assert_eq!(
        sent.iter().filter(|s| matches!(s, Sent::Group(g, _) if g == "client_7")).count(),
        5
    );
    assert_eq!(sent.iter().filter(|s| matches!(s, Sent::All(_))).count(), 1);
}

#[tokio::test]
async fn publisher_clone_keeps_worker_alive() {
    let store = Arc::new(InMemoryStore::new());
    let emitter = Arc::new(NotificationEmitter::new(
        store.clone(),
        Arc::new(RecordingTransport::new()),
        Arc::new(ConnectionRegistry::new()),
    ));

    let (publisher, receiver) = NotificationPublisher::channel(4);
    let clone = publisher.clone();
    let worker = tokio::spawn(NotificationWorker::new(emitter).run(receiver));

    drop(publisher);
    clone
        .publish(NotificationDraft::new("Brevet", "Created", "late").for_client(1), None)
        .unwrap();
    drop(clone);

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker should stop")
        .unwrap();
    assert_eq!(store.notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_pushes_are_bounded_and_time_out() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(StalledTransport::new());
    let emitter = Arc::new(NotificationEmitter::new(
        store.clone(),
        transport.clone(),
        Arc::new(ConnectionRegistry::new()),
    ));

    let (publisher, receiver) = NotificationPublisher::channel(16);
    let worker = NotificationWorker::with_limits(emitter, 2, Duration::from_secs(1));
    let worker = tokio::spawn(worker.run(receiver));

    for i in 0..5 {
        let draft = NotificationDraft::new("Brevet", "Created", format!("n{i}")).for_client(7);
        publisher.publish(draft, None).unwrap();
    }
    drop(publisher);

    tokio::time::timeout(Duration::from_secs(60), worker)
        .await
        .expect("worker should stop once every emission has timed out")
        .unwrap();

    assert_eq!(store.notifications().len(), 5);
    assert!(transport.peak() <= 2, "peak was {}", transport.peak());
    assert_eq!(transport.pending(), 0);
}
