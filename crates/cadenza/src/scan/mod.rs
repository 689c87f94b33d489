//! Scan job orchestration.
//!
//! A [`ScanOrchestrator`] runs exactly one `create_library` job. It listens to
//! the `library_scan` event stream before dispatching the command, folds every
//! event into its [`ScanSession`], and decides the completion state once the
//! command has settled and the stream has been released.

mod request;
mod session;

pub use request::ScanRequest;
pub use session::{FailureDigest, ItemFailure, ScanError, ScanSession, ScanTerminal};

use crate::bridge::Bridge;
use crate::cancel::CancellationToken;
use crate::error::TypedError;
use cadenza_protocol::defaults::{CREATE_LIBRARY_COMMAND, LIBRARY_SCAN_EVENT};
use cadenza_protocol::{LibraryOutcome, LibraryScanEvent};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drives one scan job and publishes its state.
///
/// The session is only ever mutated here; [`ScanOrchestrator::state`] hands out
/// read-only receivers that observe every change.
pub struct ScanOrchestrator {
    bridge: Bridge,
    state: Arc<watch::Sender<ScanSession>>,
    cancel: Option<CancellationToken>,
}

impl ScanOrchestrator {
    pub fn new(bridge: Bridge) -> Self {
        let (state, _) = watch::channel(ScanSession::new(Uuid::new_v4()));
        Self {
            bridge,
            state: Arc::new(state),
            cancel: None,
        }
    }

    /// Stop waiting for the command when `token` fires and settle as failed.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.state.borrow().job_id
    }

    pub fn state(&self) -> watch::Receiver<ScanSession> {
        self.state.subscribe()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> ScanSession {
        self.state.borrow().clone()
    }

    /// Run the job to completion and return the state it finished in.
    ///
    /// Only an orchestrator that has never run can start; everything that goes
    /// wrong after that is recorded in the session, not returned.
    pub async fn start_scan(&self, request: &ScanRequest) -> Result<ScanTerminal, ScanError> {
        let mut begun = Ok(());
        self.state.send_if_modified(|session| {
            begun = session.begin();
            begun.is_ok()
        });
        begun?;

        let job_id = self.job_id();
        info!(
            %job_id,
            library = request.name(),
            locations = request.scan_locations().len(),
            "Starting library scan"
        );

        let sink = Arc::clone(&self.state);
        let subscription = match self
            .bridge
            .subscribe(LIBRARY_SCAN_EVENT, move |event: LibraryScanEvent<Value>| {
                apply_event(&sink, event)
            })
            .await
        {
            Ok(subscription) => subscription,
            Err(error) => {
                warn!(%job_id, "Could not subscribe to scan events: {}", error);
                return self.settle(Err(error));
            }
        };

        let args = request.to_args();
        let command = self
            .bridge
            .invoke::<LibraryOutcome, _>(CREATE_LIBRARY_COMMAND, &args);

        let result = match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    warn!(%job_id, "Library scan cancelled");
                    Err(TypedError::cancelled())
                }
                result = command => result,
            },
            None => command.await,
        };

        subscription.unsubscribe();
        self.settle(result)
    }

    fn settle(&self, result: Result<LibraryOutcome, TypedError>) -> Result<ScanTerminal, ScanError> {
        let mut settled = Err(ScanError::NotRunning {
            state: ScanTerminal::Idle,
        });
        self.state.send_if_modified(|session| {
            settled = session.settle(result);
            settled.is_ok()
        });
        let terminal = settled?;

        let session = self.state.borrow();
        match terminal {
            ScanTerminal::Failed => {
                if let Some(error) = &session.command_error {
                    warn!(job_id = %session.job_id, kind = %error.kind, "Library scan failed: {}", error.message);
                }
            }
            _ => info!(
                job_id = %session.job_id,
                %terminal,
                item_failures = session.item_failures.len(),
                elapsed_ms = session.elapsed_ms().unwrap_or_default(),
                "Library scan finished"
            ),
        }
        Ok(terminal)
    }
}

fn apply_event(state: &watch::Sender<ScanSession>, event: LibraryScanEvent<Value>) {
    state.send_if_modified(|session| match event {
        LibraryScanEvent::Ok(progress) => {
            debug!(phase = %progress.phase, current = progress.current, total = progress.total, "Scan progress");
            session.record_progress(progress)
        }
        LibraryScanEvent::Error(failure) => {
            let error = TypedError::from_raw(&failure.error);
            warn!(path = %failure.path, "Item failed: {}", error);
            session.record_failure(ItemFailure {
                path: failure.path,
                error,
            })
        }
    });
}
