use std::sync::Arc;

use tracing::warn;

use crate::access::AccessLists;
use crate::net::transport::{Outbox, Transport};
use crate::server::events::{PlayerChatEvent, ServerEvents};
use crate::session::table::SessionTable;

/// Longest chat line the server accepts or originates
pub const MAX_MESSAGE_LENGTH: usize = 256;

/// Who sent a command, with a reply channel
pub struct CommandSender {
    pub id: u16,
    /// True when the sender's auth key is on the authorized list
    pub is_authorized: bool,
    pub outbox: Arc<dyn Outbox>,
}

impl CommandSender {
    /// Reply to the sender only, one chat frame per line
    pub fn reply(&self, text: &str) {
        send_chat_lines(self.outbox.as_ref(), text);
    }
}

/// Command dispatch consumed by the chat router.
///
/// Returns true when the message was handled as a command and must not be
/// broadcast.
pub trait CommandBus: Send + Sync {
    fn dispatch(&self, sender: &CommandSender, message: &str) -> bool;
}

impl<F> CommandBus for F
where
    F: Fn(&CommandSender, &str) -> bool + Send + Sync,
{
    fn dispatch(&self, sender: &CommandSender, message: &str) -> bool {
        self(sender, message)
    }
}

/// Split server→client text on newlines into separate chat frames
pub fn send_chat_lines(outbox: &dyn Outbox, text: &str) {
    for line in text.split('\n') {
        outbox.add_chat_message(line);
    }
}

/// Routes inbound chat: command dispatch, then the cancelable chat event,
/// then a broadcast to every active record including the sender.
pub struct ChatRouter {
    commands: Arc<dyn CommandBus>,
}

impl ChatRouter {
    pub fn new(commands: Arc<dyn CommandBus>) -> Self {
        Self { commands }
    }

    pub fn route(
        &self,
        table: &SessionTable,
        transport: &dyn Transport,
        access: &dyn AccessLists,
        events: &ServerEvents,
        sender_id: u16,
        message: &str,
    ) {
        let Some((username, auth_key)) =
            table.read(sender_id, |r| (r.username.clone(), r.auth_key.clone()))
        else {
            warn!("Chat from unknown client {}", sender_id);
            return;
        };
        let Some(outbox) = transport.outbox_for(sender_id) else {
            warn!("Chat from client {} with no outbox", sender_id);
            return;
        };

        let sender = CommandSender {
            id: sender_id,
            is_authorized: access.is_authorized(&auth_key),
            outbox,
        };
        if self.commands.dispatch(&sender, message) {
            return;
        }

        let mut event = PlayerChatEvent::new(sender_id, username.clone(), message.to_string());
        events.emit_chat(&mut event);
        if event.is_cancelled() {
            return;
        }

        let line = format!("[{}]: {}", username, message);
        for id in table.active_ids(None) {
            if let Some(outbox) = transport.outbox_for(id) {
                outbox.add_chat_message(&line);
            }
        }
    }
}
