use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use roast_client::{
    ConnectivityProbe, DrainPolicy, HttpResponse, HttpTransport, LocalStore, LocalStoreExt,
    MemoryStore, OfflineRequestQueue, PendingRequest, QueueError, RequestOptions, SubmitOutcome,
    TransportError, DEAD_LETTER_KEY, PENDING_REQUESTS_KEY,
};
use roast_diagnostics::DiagnosticsContext;
use serde_json::json;
use tokio::sync::Notify;

#[derive(Clone)]
enum Reply {
    Status(u16),
    Unreachable,
    Invalid,
}

/// Scripted transport: replies per URL (default 200) and records every call.
#[derive(Default)]
struct MockTransport {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, RequestOptions)>>,
    // When set, sends to this URL wait for `release` before replying.
    hold: Mutex<Option<(String, Arc<Notify>, Arc<Notify>)>>,
}

impl MockTransport {
    fn reply(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Returns (entered, release).
    fn hold(&self, url: &str) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some((url.to_string(), entered.clone(), release.clone()));
        (entered, release)
    }
}

impl HttpTransport for MockTransport {
    fn send<'a>(
        &'a self,
        url: &'a str,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        async move {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));

            let held = self
                .hold
                .lock()
                .unwrap()
                .as_ref()
                .filter(|(held_url, _, _)| held_url == url)
                .map(|(_, entered, release)| (entered.clone(), release.clone()));
            if let Some((entered, release)) = held {
                entered.notify_one();
                release.notified().await;
            }

            let reply = self
                .replies
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or(Reply::Status(200));
            match reply {
                Reply::Status(status) => Ok(HttpResponse::new(status, format!("status {status}"))),
                Reply::Unreachable => Err(TransportError::Network("connection refused".into())),
                Reply::Invalid => Err(TransportError::InvalidRequest("bad url".into())),
            }
        }
        .boxed()
    }
}

#[derive(Default)]
struct Switch(AtomicBool);

impl Switch {
    fn set(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for Switch {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    transport: Arc<MockTransport>,
    network: Arc<Switch>,
    diagnostics: Arc<DiagnosticsContext>,
    queue: Arc<OfflineRequestQueue>,
}

fn harness(policy: DrainPolicy) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(MockTransport::default());
    let network = Arc::new(Switch::default());
    let diagnostics = DiagnosticsContext::create();
    let queue = Arc::new(
        OfflineRequestQueue::new(
            store.clone(),
            transport.clone(),
            network.clone(),
            diagnostics.clone(),
        )
        .with_policy(policy),
    );
    Harness {
        store,
        transport,
        network,
        diagnostics,
        queue,
    }
}

fn post(n: u32) -> RequestOptions {
    RequestOptions::post_json(json!({ "roast": n }))
}

fn urls(requests: &[PendingRequest]) -> Vec<&str> {
    requests.iter().map(|r| r.url.as_str()).collect()
}

#[tokio::test]
async fn test_offline_submit_stores_exactly_one_entry() {
    let h = harness(DrainPolicy::default());

    let outcome = h.queue.submit("/roasts", post(1)).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Stored { pending: 1 });
    assert!(h.transport.calls().is_empty());
    let pending = h.queue.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "/roasts");
    assert_eq!(pending[0].options, post(1));
    assert!(pending[0].timestamp > 0);
}

#[tokio::test]
async fn test_three_offline_submits_persist_in_order() {
    let h = harness(DrainPolicy::default());
    for n in 1..=3 {
        h.queue.submit(&format!("/roasts/{n}"), post(n)).await.unwrap();
    }

    let stored: Vec<PendingRequest> = h.store.get_json(PENDING_REQUESTS_KEY).unwrap().unwrap();
    assert_eq!(urls(&stored), ["/roasts/1", "/roasts/2", "/roasts/3"]);
    assert!(stored.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_online_submit_sends_directly() {
    let h = harness(DrainPolicy::default());
    h.network.set(true);

    let outcome = h.queue.submit("/roasts", post(1)).await.unwrap();

    assert_eq!(outcome.response().map(|r| r.status), Some(200));
    assert_eq!(h.transport.calls(), ["/roasts"]);
    assert_eq!(h.queue.pending_len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_application_error_is_returned_not_queued() {
    let h = harness(DrainPolicy::default());
    h.network.set(true);
    h.transport.reply("/roasts", Reply::Status(422));

    let outcome = h.queue.submit("/roasts", post(1)).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Sent(HttpResponse::new(422, "status 422")));
    assert_eq!(h.queue.pending_len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_network_failure_while_online_falls_back_to_storage() {
    let h = harness(DrainPolicy::default());
    h.network.set(true);
    h.transport.reply("/roasts", Reply::Unreachable);

    let outcome = h.queue.submit("/roasts", post(1)).await.unwrap();

    assert!(outcome.is_stored());
    assert_eq!(h.transport.calls(), ["/roasts"]);
    assert_eq!(h.queue.pending_len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_request_is_an_error() {
    let h = harness(DrainPolicy::default());
    h.network.set(true);
    h.transport.reply("::", Reply::Invalid);

    let err = h.queue.submit("::", post(1)).await.unwrap_err();

    assert!(matches!(err, QueueError::Transport(TransportError::InvalidRequest(_))));
    assert_eq!(h.queue.pending_len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_online_submit_queues_behind_pending_entries() {
    let h = harness(DrainPolicy::default());
    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.network.set(true);

    let outcome = h.queue.submit("/roasts/2", post(2)).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Stored { pending: 2 });
    assert!(h.transport.calls().is_empty());

    h.queue.drain().await.unwrap();
    assert_eq!(h.transport.calls(), ["/roasts/1", "/roasts/2"]);
}

#[tokio::test]
async fn test_drain_attempts_every_entry_and_clears() {
    let h = harness(DrainPolicy::FireAndClear);
    for n in 1..=3 {
        h.queue.submit(&format!("/roasts/{n}"), post(n)).await.unwrap();
    }
    h.network.set(true);
    h.transport.reply("/roasts/2", Reply::Unreachable);

    let report = h.queue.drain().await.unwrap();

    assert_eq!(h.transport.calls(), ["/roasts/1", "/roasts/2", "/roasts/3"]);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.requeued, 0);
    assert_eq!(h.queue.pending_len().await.unwrap(), 0);
    assert_eq!(h.store.get(PENDING_REQUESTS_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_drain_of_empty_queue_sends_nothing() {
    let h = harness(DrainPolicy::default());
    let report = h.queue.drain().await.unwrap();
    assert_eq!(report.attempted, 0);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_retry_policy_requeues_only_failed_entries() {
    let h = harness(DrainPolicy::RetryFailed { max_attempts: 3 });
    for n in 1..=3 {
        h.queue.submit(&format!("/roasts/{n}"), post(n)).await.unwrap();
    }
    h.transport.reply("/roasts/2", Reply::Unreachable);

    let report = h.queue.drain().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.requeued, 1);
    let pending = h.queue.pending().await.unwrap();
    assert_eq!(urls(&pending), ["/roasts/2"]);
    assert_eq!(pending[0].failed_attempts, 1);
    assert_eq!(pending[0].options, post(2));
}

#[tokio::test]
async fn test_retry_policy_dead_letters_after_max_attempts() {
    let h = harness(DrainPolicy::RetryFailed { max_attempts: 2 });
    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.transport.reply("/roasts/1", Reply::Unreachable);

    let first = h.queue.drain().await.unwrap();
    assert_eq!((first.requeued, first.dead_lettered), (1, 0));

    let second = h.queue.drain().await.unwrap();
    assert_eq!((second.requeued, second.dead_lettered), (0, 1));

    assert_eq!(h.queue.pending_len().await.unwrap(), 0);
    let dead = h.queue.dead_letters().await.unwrap();
    assert_eq!(urls(&dead), ["/roasts/1"]);
    assert_eq!(dead[0].failed_attempts, 2);

    assert_eq!(h.queue.clear_dead_letters().await.unwrap(), 1);
    assert!(h.queue.dead_letters().await.unwrap().is_empty());
    assert_eq!(h.store.get(DEAD_LETTER_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_retry_policy_dead_letters_rejected_entries_immediately() {
    let h = harness(DrainPolicy::RetryFailed { max_attempts: 5 });
    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.transport.reply("/roasts/1", Reply::Status(409));

    let report = h.queue.drain().await.unwrap();

    assert_eq!(report.dead_lettered, 1);
    assert_eq!(report.requeued, 0);
    assert_eq!(h.queue.dead_letters().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_requeued_entries_stay_ahead_of_newer_submissions() {
    let h = harness(DrainPolicy::RetryFailed { max_attempts: 3 });
    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.transport.reply("/roasts/1", Reply::Unreachable);
    h.queue.drain().await.unwrap();

    h.queue.submit("/roasts/2", post(2)).await.unwrap();

    let pending = h.queue.pending().await.unwrap();
    assert_eq!(urls(&pending), ["/roasts/1", "/roasts/2"]);
}

#[tokio::test]
async fn test_submit_during_drain_survives() {
    let h = harness(DrainPolicy::FireAndClear);
    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.queue.submit("/roasts/2", post(2)).await.unwrap();
    let (entered, release) = h.transport.hold("/roasts/1");

    let queue = h.queue.clone();
    let drain = tokio::spawn(async move { queue.drain().await });

    entered.notified().await;
    let outcome = h.queue.submit("/roasts/3", post(3)).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Stored { pending: 3 });
    release.notify_one();

    let report = drain.await.unwrap().unwrap();
    assert_eq!(report.attempted, 2);

    let pending = h.queue.pending().await.unwrap();
    assert_eq!(urls(&pending), ["/roasts/3"]);
}

#[tokio::test]
async fn test_concurrent_drains_replay_each_entry_once() {
    let h = harness(DrainPolicy::FireAndClear);
    for n in 1..=3 {
        h.queue.submit(&format!("/roasts/{n}"), post(n)).await.unwrap();
    }

    let (a, b) = tokio::join!(h.queue.drain(), h.queue.drain());
    let total = a.unwrap().attempted + b.unwrap().attempted;

    assert_eq!(total, 3);
    assert_eq!(h.transport.calls().len(), 3);
}

#[tokio::test]
async fn test_queue_survives_restart_on_same_store() {
    let h = harness(DrainPolicy::default());
    h.queue.submit("/roasts/1", post(1)).await.unwrap();

    let reopened = OfflineRequestQueue::new(
        h.store.clone(),
        h.transport.clone(),
        h.network.clone(),
        DiagnosticsContext::disabled(),
    );
    assert_eq!(reopened.pending_len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_diagnostics_are_emitted() {
    let h = harness(DrainPolicy::default());
    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.queue.drain().await.unwrap();

    let events = h.diagnostics.shutdown();
    assert!(events.iter().all(|e| e.subsystem == "offline_queue"));
    assert!(events
        .iter()
        .any(|e| e.metric("drain_attempted").is_some()));
}

#[tokio::test(start_paused = true)]
async fn test_sync_service_drains_on_reconnect() {
    let h = harness(DrainPolicy::default());
    let monitor = roast_client::ConnectivityMonitor::new(false);
    let queue = Arc::new(OfflineRequestQueue::new(
        h.store.clone(),
        h.transport.clone(),
        Arc::new(|| true),
        DiagnosticsContext::disabled(),
    ));
    h.queue.submit("/roasts/1", post(1)).await.unwrap();

    // Probe says online at start, so the startup drain already replays.
    let handle = roast_client::SyncService::start(queue.clone(), &monitor, None);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.transport.calls(), ["/roasts/1"]);

    h.queue.submit("/roasts/2", post(2)).await.unwrap();
    monitor.set_connected(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.transport.calls(), ["/roasts/1", "/roasts/2"]);
    assert!(handle.is_running());

    handle.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_sync_service_periodic_retry() {
    let h = harness(DrainPolicy::default());
    let monitor = roast_client::ConnectivityMonitor::new(true);
    h.queue.submit("/roasts/1", post(1)).await.unwrap();

    let _handle =
        roast_client::SyncService::start(h.queue.clone(), &monitor, Some(Duration::from_secs(5)));
    // h.network is offline: neither startup nor the timer replays.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(h.transport.calls().is_empty());

    h.network.set(true);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.transport.calls(), ["/roasts/1"]);
}

#[tokio::test(start_paused = true)]
async fn test_sync_service_retry_stops_on_shutdown() {
    let h = harness(DrainPolicy::default());
    let monitor = roast_client::ConnectivityMonitor::new(true);
    let handle =
        roast_client::SyncService::start(h.queue.clone(), &monitor, Some(Duration::from_secs(5)));

    h.queue.submit("/roasts/1", post(1)).await.unwrap();
    h.network.set(true);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.transport.calls(), ["/roasts/1"]);

    handle.shutdown();
    h.network.set(false);
    h.queue.submit("/roasts/2", post(2)).await.unwrap();
    h.network.set(true);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.transport.calls(), ["/roasts/1"]);
    assert_eq!(h.queue.pending_len().await.unwrap(), 1);
}

/// Serves one connection: reads the full request, then answers with a
/// status line and a body cut short of its declared length.
async fn truncated_body_server() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&request).to_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let declared = text[..end]
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|len| len.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + declared {
                    break;
                }
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n{\"ok\":")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_answered_request_with_broken_body_is_not_queued() {
    let base_url = truncated_body_server().await;
    let store = Arc::new(MemoryStore::new());
    let queue = OfflineRequestQueue::new(
        store,
        Arc::new(roast_client::ReqwestTransport::with_base_url(&base_url)),
        Arc::new(|| true),
        DiagnosticsContext::disabled(),
    );

    let outcome = queue.submit("/roasts", post(1)).await.unwrap();

    let response = outcome.response().expect("server answered");
    assert_eq!(response.status, 200);
    assert_eq!(queue.pending_len().await.unwrap(), 0);
}
