//! Client session interface.
//!
//! A session is one connected participant. The core never owns sessions or
//! performs socket I/O on them; it routes messages through the send
//! primitives below and trusts the transport to report delivery as a plain
//! boolean. A `false` from any send means the peer is gone and the room
//! will drop the member from its set.

use std::sync::Arc;

use crate::{mute::MuteRegistry, room::Room};

/// Opaque session identity.
///
/// Membership uniqueness and all session comparisons key off this id, never
/// the display name, since names can be unset or change hands across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A connected, addressable participant.
///
/// Implementations live in the transport layer (the production one wraps a
/// bounded outbound channel). All sends are fire-and-forget: non-blocking,
/// never retried, with the boolean result meaning "the transport still
/// accepts output for this peer".
pub trait ClientSession: Send + Sync {
    /// Stable identity for membership bookkeeping.
    fn id(&self) -> SessionId;

    /// Display name, or `None` before the session has announced one.
    ///
    /// A nameless session may already hold room membership (initial lobby
    /// placement); rooms defer roster sync until the name resolves.
    fn display_name(&self) -> Option<String>;

    /// Updates the back-reference to the room this session occupies.
    ///
    /// Written by [`Room::add_client`]; the session holds it weakly, rooms
    /// are owned by the directory.
    fn set_current_room(&self, room: &Arc<Room>);

    /// The room this session currently occupies, if it still exists.
    fn current_room(&self) -> Option<Arc<Room>>;

    /// Delivers a chat payload attributed to `sender_name`.
    ///
    /// Returns whether the transport accepted the message.
    fn send(&self, sender_name: &str, body: &str) -> bool;

    /// Delivers a join/leave/system event about the named peer.
    ///
    /// `message` carries human-readable detail ("joined the room lobby");
    /// `None` is used for roster entries pushed to a fresh joiner.
    fn send_connection_status(&self, name: &str, is_joining: bool, message: Option<&str>) -> bool;

    /// Tells the client to discard its stale roster before a resync.
    fn send_clear_list(&self) -> bool;

    /// The peers this session has chosen to suppress.
    fn mutes(&self) -> &MuteRegistry;
}

/// Shared handle to a session, as stored in room membership sets.
pub type SessionRef = Arc<dyn ClientSession>;
