//! End-to-end behaviour of the scan state machine over an in-process host.

use async_trait::async_trait;
use cadenza::bridge::{EventEmitter, HostTransport, ListenerId, RawHandler};
use cadenza::{
    Bridge, CancellationToken, ErrorKind, LocalHost, ScanError, ScanOrchestrator, ScanRequest,
    ScanTerminal,
};
use cadenza_protocol::defaults::{CREATE_LIBRARY_COMMAND, LIBRARY_SCAN_EVENT};
use cadenza_protocol::{HostError, HostErrorType, ScanPhase};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn request() -> ScanRequest {
    ScanRequest::new("MyLib", ["/music"]).unwrap()
}

fn orchestrator_for(host: &LocalHost) -> ScanOrchestrator {
    ScanOrchestrator::new(Bridge::new(Arc::new(host.clone())))
}

fn progress(current: u64, total: u64, path: &str) -> Value {
    json!({
        "type": "ok",
        "data": { "phase": "reading", "current": current, "total": total, "path": path }
    })
}

fn failure(path: &str, error: Value) -> Value {
    json!({ "type": "error", "data": { "path": path, "error": error } })
}

fn send(emitter: &EventEmitter, event: Value) {
    emitter.emit_value(LIBRARY_SCAN_EVENT, event);
}

#[tokio::test]
async fn test_success_with_item_failure_completes_with_errors() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |args, emitter| async move {
        assert_eq!(args, json!({"name": "MyLib", "scanLocations": ["/music"]}));
        send(&emitter, progress(1, 2, "/music/a.mp3"));
        send(&emitter, failure("/music/b.mp3", json!("bad header")));
        Ok(json!({"id": 1}))
    });

    let orchestrator = orchestrator_for(&host);
    let terminal = orchestrator.start_scan(&request()).await.unwrap();
    let session = orchestrator.session();

    assert_eq!(terminal, ScanTerminal::CompletedWithErrors);
    assert_eq!(session.terminal, ScanTerminal::CompletedWithErrors);
    assert_eq!(session.item_failures.len(), 1);
    assert_eq!(session.item_failures[0].path, "/music/b.mp3");
    assert_eq!(session.item_failures[0].error.kind, ErrorKind::Descriptive);
    assert_eq!(session.item_failures[0].error.message, "bad header");
    assert!(session.item_failures[0].error.context.is_none());

    let latest = session.latest_progress.unwrap();
    assert_eq!(latest.current, 1);
    assert_eq!(latest.phase, ScanPhase::Reading);

    assert!(session.command_error.is_none());
    assert_eq!(session.outcome.unwrap().id, 1);
    assert_eq!(host.listener_count(LIBRARY_SCAN_EVENT), 0);
}

#[tokio::test]
async fn test_plain_string_rejection_fails_with_descriptive_error() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, _emitter| async move {
        Err(json!("disk full"))
    });

    let orchestrator = orchestrator_for(&host);
    let terminal = orchestrator.start_scan(&request()).await.unwrap();
    let session = orchestrator.session();

    assert_eq!(terminal, ScanTerminal::Failed);
    let error = session.command_error.unwrap();
    assert_eq!(error.message, "disk full");
    assert_eq!(error.kind, ErrorKind::Descriptive);
    assert!(session.outcome.is_none());
    assert!(session.finished_at.is_some());
}

#[tokio::test]
async fn test_clean_run() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, emitter| async move {
        send(&emitter, progress(1, 2, "/music/a.mp3"));
        send(&emitter, progress(2, 2, "/music/b.mp3"));
        Ok(json!({"id": 7, "name": "MyLib", "track_count": 2, "failed_count": 0}))
    });

    let orchestrator = orchestrator_for(&host);
    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::CompletedClean
    );

    let session = orchestrator.session();
    assert!(session.item_failures.is_empty());
    assert_eq!(session.progress_events, 2);
    assert_eq!(session.latest_progress.unwrap().path, "/music/b.mp3");
    assert_eq!(session.outcome.unwrap().track_count, 2);
}

#[tokio::test]
async fn test_every_failure_kept_in_arrival_order() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, emitter| async move {
        for i in 0..50 {
            send(&emitter, failure(&format!("/music/{:02}.mp3", i), json!("bad header")));
            if i % 10 == 0 {
                send(&emitter, progress(i + 1, 50, "/music"));
            }
        }
        Ok(json!({"id": 1}))
    });

    let orchestrator = orchestrator_for(&host);
    orchestrator.start_scan(&request()).await.unwrap();
    let session = orchestrator.session();

    assert_eq!(session.terminal, ScanTerminal::CompletedWithErrors);
    assert_eq!(session.item_failures.len(), 50);
    for (i, item) in session.item_failures.iter().enumerate() {
        assert_eq!(item.path, format!("/music/{:02}.mp3", i));
    }

    let digest = session.failure_digest(20);
    assert_eq!(digest.shown.len(), 20);
    assert!(digest.to_string().ends_with("+30 more\n"));
}

#[tokio::test]
async fn test_rejection_wins_over_item_failures_and_releases_listener() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, emitter| async move {
        send(&emitter, failure("/music/a.mp3", json!("bad header")));
        send(&emitter, failure("/music/b.mp3", json!("bad header")));
        Err(HostError::new(HostErrorType::Io, "IO: Not found")
            .with_context("/music")
            .to_value())
    });

    let orchestrator = orchestrator_for(&host);
    let mut state = orchestrator.state();
    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::Failed
    );

    let settled = state.borrow_and_update().clone();
    assert_eq!(settled.item_failures.len(), 2);
    let error = settled.command_error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::Io);
    assert_eq!(error.context_lines(), vec!["/music"]);

    // Nothing reaches the session once the stream is released.
    assert_eq!(host.listener_count(LIBRARY_SCAN_EVENT), 0);
    let reached = host
        .emitter()
        .emit_value(LIBRARY_SCAN_EVENT, failure("/music/late.mp3", json!("late")));
    assert_eq!(reached, 0);
    assert!(!state.has_changed().unwrap());
    assert_eq!(orchestrator.session(), settled);
}

#[tokio::test]
async fn test_orchestrator_runs_once() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, _emitter| async move {
        Ok(json!({"id": 1}))
    });

    let orchestrator = orchestrator_for(&host);
    orchestrator.start_scan(&request()).await.unwrap();

    let err = orchestrator.start_scan(&request()).await.unwrap_err();
    assert_eq!(
        err,
        ScanError::NotIdle {
            state: ScanTerminal::CompletedClean
        }
    );
    assert_eq!(orchestrator.session().terminal, ScanTerminal::CompletedClean);
}

#[tokio::test]
async fn test_unknown_command_fails() {
    let host = LocalHost::new();
    let orchestrator = orchestrator_for(&host);

    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::Failed
    );
    let error = orchestrator.session().command_error.unwrap();
    assert_eq!(error.kind, ErrorKind::Descriptive);
    assert_eq!(error.message, "command create_library not found");
}

#[tokio::test]
async fn test_malformed_events_are_skipped() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, emitter| async move {
        send(&emitter, json!({"type": "mystery", "data": 1}));
        send(&emitter, json!("not an envelope"));
        send(&emitter, failure("/music/a.mp3", json!({"short": "Decoder", "message": "eof"})));
        Ok(json!({"id": 1}))
    });

    let orchestrator = orchestrator_for(&host);
    orchestrator.start_scan(&request()).await.unwrap();
    let session = orchestrator.session();

    assert_eq!(session.item_failures.len(), 1);
    assert_eq!(session.item_failures[0].error.message, "Decoder");
    assert_eq!(session.item_failures[0].error.context_lines(), vec!["eof"]);
    assert_eq!(session.progress_events, 0);
}

#[tokio::test]
async fn test_undecodable_outcome_fails() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, _emitter| async move {
        Ok(json!({"library": "MyLib"}))
    });

    let orchestrator = orchestrator_for(&host);
    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::Failed
    );
    let error = orchestrator.session().command_error.unwrap();
    assert_eq!(error.kind, ErrorKind::Serialization);
    assert_eq!(error.message, "Unexpected response from create_library");
}

#[tokio::test]
async fn test_cancellation_mid_flight() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, emitter| async move {
        send(&emitter, progress(1, 100, "/music/a.mp3"));
        std::future::pending::<()>().await;
        Ok(json!({"id": 1}))
    });

    let token = CancellationToken::new();
    let orchestrator = orchestrator_for(&host).with_cancellation(token.clone());
    let mut state = orchestrator.state();

    let canceller = tokio::spawn(async move {
        state
            .wait_for(|session| session.latest_progress.is_some())
            .await
            .unwrap();
        token.cancel();
    });

    let terminal = tokio::time::timeout(Duration::from_secs(5), orchestrator.start_scan(&request()))
        .await
        .expect("cancellation should end the scan")
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(terminal, ScanTerminal::Failed);
    let session = orchestrator.session();
    assert_eq!(session.command_error.unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(session.progress_events, 1);
    assert_eq!(host.listener_count(LIBRARY_SCAN_EVENT), 0);
}

#[tokio::test]
async fn test_pre_cancelled_token_never_completes_the_command() {
    let host = LocalHost::new();
    host.register_command(CREATE_LIBRARY_COMMAND, |_args, _emitter| async move {
        Ok(json!({"id": 1}))
    });

    let token = CancellationToken::new();
    token.cancel();
    let orchestrator = orchestrator_for(&host).with_cancellation(token);

    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::Failed
    );
    assert!(orchestrator.session().outcome.is_none());
}

/// Transport whose listener registration always fails.
struct RefusingTransport {
    called: AtomicBool,
}

#[async_trait]
impl HostTransport for RefusingTransport {
    async fn call(&self, _command: &str, _args: Value) -> Result<Value, Value> {
        self.called.store(true, Ordering::SeqCst);
        Ok(json!({"id": 1}))
    }

    async fn listen(&self, _event: &str, _handler: RawHandler) -> Result<ListenerId, Value> {
        Err(json!({"type": "bridge", "message": "listen refused"}))
    }

    fn unlisten(&self, _id: ListenerId) {}
}

#[tokio::test]
async fn test_subscribe_failure_prevents_dispatch() {
    let transport = Arc::new(RefusingTransport {
        called: AtomicBool::new(false),
    });
    let orchestrator = ScanOrchestrator::new(Bridge::new(transport.clone()));

    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::Failed
    );
    assert!(!transport.called.load(Ordering::SeqCst));

    let error = orchestrator.session().command_error.unwrap();
    assert_eq!(error.kind, ErrorKind::Bridge);
    assert_eq!(error.message, "listen refused");
}

/// Transport whose command handler panics.
struct PanickingTransport {
    inner: LocalHost,
}

#[async_trait]
impl HostTransport for PanickingTransport {
    async fn call(&self, command: &str, _args: Value) -> Result<Value, Value> {
        panic!("host crashed while running {}", command);
    }

    async fn listen(&self, event: &str, handler: RawHandler) -> Result<ListenerId, Value> {
        self.inner.listen(event, handler).await
    }

    fn unlisten(&self, id: ListenerId) {
        self.inner.unlisten(id)
    }
}

#[tokio::test]
async fn test_transport_panic_becomes_failed_session() {
    let inner = LocalHost::new();
    let transport = Arc::new(PanickingTransport {
        inner: inner.clone(),
    });
    let orchestrator = ScanOrchestrator::new(Bridge::new(transport));

    assert_eq!(
        orchestrator.start_scan(&request()).await.unwrap(),
        ScanTerminal::Failed
    );
    let error = orchestrator.session().command_error.unwrap();
    assert_eq!(error.kind, ErrorKind::Unknown);
    assert_eq!(
        error.context_lines(),
        vec!["host crashed while running create_library"]
    );
    assert_eq!(inner.listener_count(LIBRARY_SCAN_EVENT), 0);
}
