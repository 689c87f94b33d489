//! In-process host.
//!
//! Runs the host side in the same process as the interface: commands are
//! registered async handlers, events are delivered synchronously to every
//! listener of the emitted name. Used by the CLI and by tests.

use super::{HostTransport, ListenerId, RawHandler};
use async_trait::async_trait;
use cadenza_protocol::HostError;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, trace};

type CommandFuture = Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>;
type CommandHandler = Arc<dyn Fn(Value, EventEmitter) -> CommandFuture + Send + Sync>;

#[derive(Default)]
struct Registry {
    commands: RwLock<HashMap<String, CommandHandler>>,
    /// INVARIANT: lock held only to edit or snapshot the map, never while a
    /// listener runs.
    listeners: Mutex<HashMap<String, Vec<(ListenerId, RawHandler)>>>,
    next_listener: AtomicU64,
}

/// In-process [`HostTransport`].
#[derive(Clone, Default)]
pub struct LocalHost {
    registry: Arc<Registry>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `name`.
    pub fn register_command<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Value, EventEmitter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let boxed: CommandHandler =
            Arc::new(move |args, emitter| -> CommandFuture { Box::pin(handler(args, emitter)) });
        let mut commands = match self.registry.commands.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        commands.insert(name.to_string(), boxed);
        debug!(command = name, "Registered host command");
    }

    /// Emitter for pushing events from outside a command handler.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Number of live listeners for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock_listeners().get(event).map(Vec::len).unwrap_or(0)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(ListenerId, RawHandler)>>> {
        lock_listeners(&self.registry)
    }
}

fn lock_listeners(
    registry: &Registry,
) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(ListenerId, RawHandler)>>> {
    match registry.listeners.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl HostTransport for LocalHost {
    async fn call(&self, command: &str, args: Value) -> Result<Value, Value> {
        let handler = {
            let commands = match self.registry.commands.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            commands.get(command).cloned()
        };

        match handler {
            Some(handler) => {
                debug!(command, "Dispatching host command");
                handler(args, self.emitter()).await
            }
            None => Err(Value::String(format!("command {} not found", command))),
        }
    }

    async fn listen(&self, event: &str, handler: RawHandler) -> Result<ListenerId, Value> {
        let id = ListenerId(self.registry.next_listener.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock_listeners()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) {
        let mut listeners = self.lock_listeners();
        for handlers in listeners.values_mut() {
            handlers.retain(|(existing, _)| *existing != id);
        }
        listeners.retain(|_, handlers| !handlers.is_empty());
    }
}

/// Sends events to the listeners of a [`LocalHost`].
#[derive(Clone)]
pub struct EventEmitter {
    registry: Arc<Registry>,
}

impl EventEmitter {
    /// Serialise `payload` and deliver it to every current listener of `event`.
    ///
    /// Returns the number of listeners reached.
    pub fn emit<P: Serialize + ?Sized>(&self, event: &str, payload: &P) -> Result<usize, HostError> {
        let value = serde_json::to_value(payload)?;
        Ok(self.emit_value(event, value))
    }

    pub fn emit_value(&self, event: &str, payload: Value) -> usize {
        let targets: Vec<RawHandler> = lock_listeners(&self.registry)
            .get(event)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(event, listeners = targets.len(), "Emitting event");
        for handler in &targets {
            handler(payload.clone());
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_command_rejects_with_string() {
        let host = LocalHost::new();
        let err = host.call("nope", Value::Null).await.unwrap_err();
        assert_eq!(err, json!("command nope not found"));
    }

    #[tokio::test]
    async fn test_registered_command_receives_args() {
        let host = LocalHost::new();
        host.register_command("echo", |args, _emitter| async move { Ok(args) });
        let response = host.call("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(response, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_events_reach_listeners_in_order() {
        let host = LocalHost::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = host
            .listen("tick", Arc::new(move |v: Value| sink.lock().unwrap().push(v)))
            .await
            .unwrap();

        let emitter = host.emitter();
        emitter.emit("tick", &1).unwrap();
        emitter.emit("tick", &2).unwrap();
        emitter.emit("other", &3).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2)]);

        host.unlisten(id);
        host.unlisten(id);
        assert_eq!(emitter.emit("tick", &4).unwrap(), 0);
        assert_eq!(host.listener_count("tick"), 0);
    }
}
