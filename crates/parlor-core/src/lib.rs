//! Parlor room-membership and message-fan-out core.
//!
//! This crate is the heart of a multi-room chat service: it tracks which
//! sessions belong to which room, routes broadcast/private/system messages
//! among them, interprets the in-band `/` command grammar, and owns room
//! lifecycle (creation, empty-room cleanup, migration of stranded sessions
//! to the default room). It performs no I/O of its own; transports
//! implement [`ClientSession`] and report delivery as a boolean.
//!
//! ## Architecture
//!
//! ```text
//! parlor-core
//!   ├─ RoomDirectory   (name → room registry, owns the default room)
//!   ├─ Room            (membership set, fan-out, lifecycle)
//!   ├─ command         (trigger grammar → tagged Command variants)
//!   ├─ MuteRegistry    (per-viewer suppression set + MuteStore seam)
//!   ├─ ClientSession   (transport-side send primitives, trait)
//!   └─ Environment     (randomness seam for dice/coin commands)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
mod directory;
mod env;
mod mute;
mod room;
mod session;

pub use command::{Command, ParsedCommand};
pub use directory::RoomDirectory;
pub use env::Environment;
pub use mute::{MemoryMuteStore, MuteRegistry, MuteStore, MuteStoreError};
pub use room::{MUTE_DAEMON, Room};
pub use session::{ClientSession, SessionId, SessionRef};
