//! Channel-backed client session.
//!
//! Each connection gets a bounded outbound queue drained by its writer
//! task. All room-side sends are `try_send`: a queue that is full (slow
//! reader) or closed (writer gone) reports delivery failure, which is the
//! signal rooms use to drop the member. Nothing at this layer blocks or
//! retries.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use parlor_core::{ClientSession, MuteRegistry, Room, SessionId};
use tokio::sync::mpsc;

/// Outbound line capacity per client. A reader that falls this far behind
/// is treated as disconnected.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Production [`ClientSession`] bridging rooms to a socket writer task.
pub struct ChannelSession {
    id: SessionId,
    display_name: Mutex<Option<String>>,
    current_room: Mutex<Weak<Room>>,
    outbound: mpsc::Sender<String>,
    mutes: MuteRegistry,
}

impl ChannelSession {
    /// Creates a session and the receiving end of its outbound queue.
    pub fn new(id: SessionId) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let session = Arc::new(Self {
            id,
            display_name: Mutex::new(None),
            current_room: Mutex::new(Weak::new()),
            outbound: tx,
            mutes: MuteRegistry::new(),
        });
        (session, rx)
    }

    /// Records the name announced by the remote client.
    pub fn set_display_name(&self, name: &str) {
        *self.display_name.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(name.to_string());
    }

    fn push_line(&self, line: String) -> bool {
        self.outbound.try_send(line).is_ok()
    }
}

impl ClientSession for ChannelSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_current_room(&self, room: &Arc<Room>) {
        *self.current_room.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(room);
    }

    fn current_room(&self) -> Option<Arc<Room>> {
        self.current_room.lock().unwrap_or_else(PoisonError::into_inner).upgrade()
    }

    fn send(&self, sender_name: &str, body: &str) -> bool {
        self.push_line(format!("{sender_name}: {body}"))
    }

    fn send_connection_status(&self, name: &str, is_joining: bool, message: Option<&str>) -> bool {
        let line = match (is_joining, message) {
            (_, Some(detail)) => format!("* {name} {detail}"),
            (true, None) => format!("* {name} is here"),
            (false, None) => format!("* {name} left"),
        };
        self.push_line(line)
    }

    fn send_clear_list(&self) -> bool {
        self.push_line("* room roster follows".to_string())
    }

    fn mutes(&self) -> &MuteRegistry {
        &self.mutes
    }
}
