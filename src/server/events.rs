//! Subscriber-list event bus.
//!
//! Emission iterates a snapshot of the subscriber list and isolates each
//! callback: a panicking subscriber is logged and the remaining
//! subscribers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

/// A player finished its hello and became visible to peers
#[derive(Debug, Clone)]
pub struct PlayerConnectEvent {
    pub id: u16,
    pub username: String,
}

/// A player's record was removed
#[derive(Debug, Clone)]
pub struct PlayerDisconnectEvent {
    pub id: u16,
    pub username: String,
    pub timed_out: bool,
}

/// A chat line awaiting routing. Cancelling suppresses the broadcast.
#[derive(Debug)]
pub struct PlayerChatEvent {
    pub id: u16,
    pub username: String,
    pub message: String,
    cancelled: bool,
}

impl PlayerChatEvent {
    pub fn new(id: u16, username: String, message: String) -> Self {
        Self {
            id,
            username,
            message,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Token returned by subscribe, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberHandle(u64);

type ConnectCallback = Arc<dyn Fn(&PlayerConnectEvent) + Send + Sync>;
type DisconnectCallback = Arc<dyn Fn(&PlayerDisconnectEvent) + Send + Sync>;
type ChatCallback = Arc<dyn Fn(&mut PlayerChatEvent) + Send + Sync>;

/// Event bus owned by the manager
#[derive(Default)]
pub struct ServerEvents {
    next_handle: AtomicU64,
    connect: RwLock<Vec<(u64, ConnectCallback)>>,
    disconnect: RwLock<Vec<(u64, DisconnectCallback)>>,
    chat: RwLock<Vec<(u64, ChatCallback)>>,
}

impl ServerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    pub fn subscribe_connect(
        &self,
        callback: impl Fn(&PlayerConnectEvent) + Send + Sync + 'static,
    ) -> SubscriberHandle {
        let handle = self.next_handle();
        self.connect.write().push((handle, Arc::new(callback)));
        SubscriberHandle(handle)
    }

    pub fn subscribe_disconnect(
        &self,
        callback: impl Fn(&PlayerDisconnectEvent) + Send + Sync + 'static,
    ) -> SubscriberHandle {
        let handle = self.next_handle();
        self.disconnect.write().push((handle, Arc::new(callback)));
        SubscriberHandle(handle)
    }

    pub fn subscribe_chat(
        &self,
        callback: impl Fn(&mut PlayerChatEvent) + Send + Sync + 'static,
    ) -> SubscriberHandle {
        let handle = self.next_handle();
        self.chat.write().push((handle, Arc::new(callback)));
        SubscriberHandle(handle)
    }

    /// Remove a subscriber from whichever list holds it
    pub fn unsubscribe(&self, handle: SubscriberHandle) {
        self.connect.write().retain(|(h, _)| *h != handle.0);
        self.disconnect.write().retain(|(h, _)| *h != handle.0);
        self.chat.write().retain(|(h, _)| *h != handle.0);
    }

    pub fn emit_connect(&self, event: &PlayerConnectEvent) {
        let subscribers: Vec<ConnectCallback> =
            self.connect.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!("Connect subscriber panicked for client {}", event.id);
            }
        }
    }

    pub fn emit_disconnect(&self, event: &PlayerDisconnectEvent) {
        let subscribers: Vec<DisconnectCallback> =
            self.disconnect.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!("Disconnect subscriber panicked for client {}", event.id);
            }
        }
    }

    /// Run chat subscribers in order; any of them may cancel the event
    pub fn emit_chat(&self, event: &mut PlayerChatEvent) {
        let subscribers: Vec<ChatCallback> =
            self.chat.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(&mut *event))).is_err() {
                warn!("Chat subscriber panicked for client {}", event.id);
            }
        }
    }
}
