//! Typed command/event bridge to the host process.
//!
//! [`HostTransport`] is the untyped boundary: JSON in, JSON out, raw errors of
//! any shape. [`Bridge`] is the only component allowed to touch it. Every call
//! through the bridge returns `Result<_, TypedError>`; failures raised by the
//! transport, including panics, are translated here and nowhere else.

pub mod local;

pub use local::{EventEmitter, LocalHost};

use crate::error::{ErrorKind, TypedError};
use crate::outcome::{capture_async, Raised};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifier of one registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Untyped event callback. Called once per event, in emission order.
pub type RawHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Raw host primitives.
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Invoke `command` and await its single response. `Err` carries the host's
    /// failure value untouched.
    async fn call(&self, command: &str, args: Value) -> Result<Value, Value>;

    /// Register `handler` for every future event named `event`. The listener is
    /// active once this resolves.
    async fn listen(&self, event: &str, handler: RawHandler) -> Result<ListenerId, Value>;

    /// Remove a listener. Unknown or already-removed ids are ignored.
    fn unlisten(&self, id: ListenerId);
}

/// Typed wrapper over a [`HostTransport`].
#[derive(Clone)]
pub struct Bridge {
    transport: Arc<dyn HostTransport>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("transport", &"<dyn HostTransport>")
            .finish()
    }
}

impl Bridge {
    pub fn new(transport: Arc<dyn HostTransport>) -> Self {
        Self { transport }
    }

    /// Invoke a host command and decode its result.
    pub async fn invoke<T, A>(&self, command: &str, args: &A) -> Result<T, TypedError>
    where
        T: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        let args = serde_json::to_value(args).map_err(|e| {
            TypedError::new(ErrorKind::Serialization, format!("Failed to encode arguments for {}", command))
                .with_context(e.to_string())
        })?;

        let transport = Arc::clone(&self.transport);
        let owned_command = command.to_string();
        let response = capture_async(
            async move { transport.call(&owned_command, args).await },
            |raised| translate_raised(command, raised),
        )
        .await?;

        serde_json::from_value(response).map_err(|e| {
            TypedError::new(ErrorKind::Serialization, format!("Unexpected response from {}", command))
                .with_context(e.to_string())
        })
    }

    /// Subscribe to a host event stream.
    ///
    /// `handler` runs once per decodable payload, in arrival order, until the
    /// returned [`Subscription`] is released. Payloads that do not decode as `T`
    /// are logged and skipped.
    pub async fn subscribe<T, F>(&self, event: &str, handler: F) -> Result<Subscription, TypedError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let event_name = event.to_string();

        let gate = Arc::clone(&active);
        let raw: RawHandler = Arc::new(move |payload: Value| {
            if !gate.load(Ordering::SeqCst) {
                return;
            }
            match serde_json::from_value::<T>(payload) {
                Ok(typed) => handler(typed),
                Err(e) => warn!(event = %event_name, "Dropping undecodable event payload: {}", e),
            }
        });

        let id = self
            .transport
            .listen(event, raw)
            .await
            .map_err(|raw_err| TypedError::from_raw(&raw_err))?;
        debug!(event, %id, "Subscribed");

        Ok(Subscription {
            transport: Arc::clone(&self.transport),
            id,
            event: event.to_string(),
            active,
        })
    }
}

fn translate_raised(command: &str, raised: Raised<Value>) -> TypedError {
    match raised {
        Raised::Error(raw) => TypedError::from_raw(&raw),
        Raised::Panic(message) => {
            warn!(command, "Host transport panicked: {}", message);
            TypedError::new(ErrorKind::Unknown, format!("Host call {} panicked", command))
                .with_context(message)
        }
        Raised::Aborted => TypedError::new(
            ErrorKind::Task,
            format!("Host call {} was aborted before it completed", command),
        ),
    }
}

/// Handle to an active event subscription.
///
/// Released explicitly with [`Subscription::unsubscribe`] or implicitly on
/// drop. Once released the handler never runs again.
pub struct Subscription {
    transport: Arc<dyn HostTransport>,
    id: ListenerId,
    event: String,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Release the subscription. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.transport.unlisten(self.id);
            debug!(event = %self.event, id = %self.id, "Unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("active", &self.is_active())
            .finish()
    }
}
