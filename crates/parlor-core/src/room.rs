//! Room membership and message fan-out.
//!
//! ## Responsibilities
//!
//! - Membership: insertion-ordered set of sessions, unique by id
//! - Routing: broadcast, private delivery, join/leave announcements
//! - Commands: gate every message through the command grammar first
//! - Lifecycle: empty-room cleanup and close-time migration to the default
//!   room
//!
//! ## Concurrency
//!
//! Membership mutation happens under the room's mutex. Fan-out clones a
//! point-in-time snapshot, delivers without the lock (all sends are
//! non-blocking), then prunes failed recipients under the lock. A member
//! removed concurrently during a sweep may still receive that sweep's
//! message; nothing is ever delivered twice and the sweep never observes a
//! torn set.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::{
    command::{self, Command, ParsedCommand},
    directory::RoomDirectory,
    env::Environment,
    mute::MuteStore,
    session::{SessionId, SessionRef},
};

/// Attributed sender for mute/unmute notices.
pub const MUTE_DAEMON: &str = "Mute Daemon";

/// A named, mutually exclusive membership set of sessions sharing broadcast
/// scope.
///
/// Rooms are created and owned by the [`RoomDirectory`]; there is no closed
/// sentinel state; a room that has been closed is simply absent from the
/// directory, and dropping the last handle disposes of it.
pub struct Room {
    name: String,
    is_default: bool,
    directory: Weak<RoomDirectory>,
    env: Arc<dyn Environment>,
    mute_store: Arc<dyn MuteStore>,
    members: Mutex<Vec<SessionRef>>,
}

impl Room {
    pub(crate) fn new(
        name: &str,
        is_default: bool,
        directory: Weak<RoomDirectory>,
        env: Arc<dyn Environment>,
        mute_store: Arc<dyn MuteStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            is_default,
            directory,
            env,
            mute_store,
            members: Mutex::new(Vec::new()),
        })
    }

    /// The room's name, unique within its directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the directory's default room (exempt from
    /// auto-close).
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Number of current members.
    pub fn member_count(&self) -> usize {
        self.lock_members().len()
    }

    /// Whether the session with `id` is currently a member.
    pub fn is_member(&self, id: SessionId) -> bool {
        self.lock_members().iter().any(|m| m.id() == id)
    }

    /// Display names of current members that have one, in join order.
    pub fn member_names(&self) -> Vec<String> {
        self.lock_members().iter().filter_map(|m| m.display_name()).collect()
    }

    /// Adds a session to the membership set.
    ///
    /// Adding a session that is already a member is logged and ignored. If
    /// the session has a resolved display name the full join protocol runs
    /// (roster reset, join announcement, roster push); a nameless session
    /// just holds membership until [`Room::sync_client`] runs after its
    /// name resolves.
    pub fn add_client(self: &Arc<Self>, session: &SessionRef) {
        {
            let mut members = self.lock_members();
            if members.iter().any(|m| m.id() == session.id()) {
                tracing::info!(
                    "attempted to add session {} to {} twice",
                    session.id(),
                    self.name
                );
                return;
            }
            session.set_current_room(self);
            members.push(Arc::clone(session));
        }
        if session.display_name().is_some() {
            self.sync_client(session);
        }
    }

    /// Runs the named-join protocol for a member: clears its stale roster,
    /// announces the join to everyone else, and pushes the current roster
    /// to it.
    ///
    /// Deferred until the display name resolves, since announcements and
    /// roster entries are keyed by name.
    pub fn sync_client(&self, session: &SessionRef) {
        if session.display_name().is_none() {
            tracing::debug!("deferring roster sync for nameless session {}", session.id());
            return;
        }
        if !self.is_member(session.id()) {
            tracing::debug!("roster sync requested for non-member {}", session.id());
            return;
        }
        let _ = session.send_clear_list();
        self.send_connection_status(session, true, Some(&format!("joined the room {}", self.name)));
        for member in self.member_snapshot() {
            if member.id() == session.id() {
                continue;
            }
            if let Some(peer) = member.display_name() {
                let _ = session.send_connection_status(&peer, true, None);
            }
        }
    }

    /// Removes a session from the membership set.
    ///
    /// Removing an absent session is logged and ignored. A non-empty
    /// remainder hears the departure; an empty remainder triggers
    /// empty-room cleanup (the default room is exempt).
    pub fn remove_client(&self, session: &SessionRef) {
        let now_empty = {
            let mut members = self.lock_members();
            let before = members.len();
            members.retain(|m| m.id() != session.id());
            if members.len() == before {
                tracing::debug!(
                    "attempted to remove session {} not in {}",
                    session.id(),
                    self.name
                );
                return;
            }
            members.is_empty()
        };
        if now_empty {
            self.cleanup_empty();
        } else {
            self.send_connection_status(
                session,
                false,
                Some(&format!("left the room {}", self.name)),
            );
        }
    }

    fn cleanup_empty(&self) {
        if self.is_default {
            return;
        }
        tracing::info!("closing empty room: {}", self.name);
        self.close();
    }

    /// Closes the room: detaches it from the directory and migrates any
    /// remaining members to the default room.
    ///
    /// The registry entry is removed *before* migration so a concurrent
    /// `joinroom` can never resolve a half-closed room. Normal cleanup only
    /// closes empty rooms; the migration loop covers other lifecycle
    /// callers closing a room that still has members.
    pub fn close(&self) {
        if self.is_default {
            tracing::warn!("refusing to close the default room {}", self.name);
            return;
        }
        let Some(directory) = self.directory.upgrade() else {
            return;
        };
        directory.forget_room(self);
        let default_room = directory.default_room();
        let migrating = self.member_count();
        if migrating > 0 {
            tracing::info!(
                "migrating {} members from {} to {}",
                migrating,
                self.name,
                default_room.name()
            );
            loop {
                let member = {
                    let mut members = self.lock_members();
                    if members.is_empty() { None } else { Some(members.remove(0)) }
                };
                let Some(member) = member else { break };
                default_room.add_client(&member);
            }
        }
    }

    /// Routes a message from `sender`.
    ///
    /// The message is first offered to the command grammar; a consumed
    /// command produces its own responses and nothing is broadcast.
    /// Otherwise the text fans out to every member except recipients that
    /// have muted the sender.
    pub fn send_message(self: &Arc<Self>, sender: &SessionRef, text: &str) {
        tracing::debug!("{}: routing message to {} members", self.name, self.member_count());
        if self.process_command(sender, text) {
            return;
        }
        let sender_name = sender.display_name().unwrap_or_default();
        self.broadcast(&sender_name, text);
    }

    /// Routes a message from `sender` to an explicit recipient subset.
    ///
    /// Same command gate as [`Room::send_message`]; delivery reaches only
    /// members whose display name appears in `recipients`, never the
    /// sender itself.
    pub fn send_private_message(
        self: &Arc<Self>,
        sender: &SessionRef,
        recipients: &[String],
        text: &str,
    ) {
        if self.process_command(sender, text) {
            return;
        }
        self.deliver_private(sender, recipients, text);
    }

    /// Announces a join/leave/system event about `session` to every other
    /// member.
    pub fn send_connection_status(
        &self,
        session: &SessionRef,
        is_joining: bool,
        message: Option<&str>,
    ) {
        let subject = session.display_name().unwrap_or_default();
        let mut failed = Vec::new();
        for member in self.member_snapshot() {
            if member.id() == session.id() {
                continue;
            }
            if !member.send_connection_status(&subject, is_joining, message) {
                failed.push(member.id());
            }
        }
        self.prune_failed(&failed);
    }

    /// Fans `text` out to the membership snapshot, skipping recipients
    /// that have muted `sender_name`.
    fn broadcast(&self, sender_name: &str, text: &str) {
        let mut failed = Vec::new();
        for member in self.member_snapshot() {
            if member.mutes().is_muted(sender_name) {
                continue;
            }
            if !member.send(sender_name, text) {
                failed.push(member.id());
            }
        }
        self.prune_failed(&failed);
    }

    fn deliver_private(&self, sender: &SessionRef, recipients: &[String], text: &str) {
        let sender_name = sender.display_name().unwrap_or_default();
        let mut failed = Vec::new();
        for member in self.member_snapshot() {
            if member.id() == sender.id() {
                continue;
            }
            let Some(name) = member.display_name() else {
                continue;
            };
            if !recipients.iter().any(|r| *r == name) {
                continue;
            }
            if member.mutes().is_muted(&sender_name) {
                continue;
            }
            if !member.send(&sender_name, text) {
                failed.push(member.id());
            }
        }
        self.prune_failed(&failed);
    }

    /// Offers `text` to the command grammar. Returns whether the message
    /// was consumed as a command.
    ///
    /// Malformed invocations are logged and fall through as plain text; no
    /// error response reaches the remote party.
    fn process_command(self: &Arc<Self>, sender: &SessionRef, text: &str) -> bool {
        match command::parse(text) {
            ParsedCommand::NotACommand => false,
            ParsedCommand::Malformed { command, reason } => {
                tracing::warn!("malformed /{command} from session {}: {reason}", sender.id());
                false
            },
            ParsedCommand::Recognized(cmd) => {
                self.dispatch(sender, cmd);
                true
            },
        }
    }

    fn dispatch(self: &Arc<Self>, sender: &SessionRef, command: Command) {
        match command {
            Command::CreateRoom { room } => {
                let Some(directory) = self.directory.upgrade() else {
                    return;
                };
                if directory.create_room(&room) {
                    directory.join_room(&room, sender);
                } else {
                    tracing::debug!("room {room} already exists");
                }
            },
            Command::JoinRoom { room } => {
                let Some(directory) = self.directory.upgrade() else {
                    return;
                };
                if !directory.join_room(&room, sender) {
                    tracing::debug!("no such room: {room}");
                }
            },
            Command::Roll => {
                let value = self.env.random_u64() % 5 + 1;
                let sender_name = sender.display_name().unwrap_or_default();
                self.broadcast(&sender_name, &format!("%You got:{value}%"));
            },
            Command::Flip => {
                let side = if self.env.random_u64() % 2 == 0 { "*Heads*" } else { "*Tails*" };
                let sender_name = sender.display_name().unwrap_or_default();
                self.broadcast(&sender_name, side);
            },
            Command::Mute { target } => self.update_mute(sender, &target, true),
            Command::Unmute { target } => self.update_mute(sender, &target, false),
            Command::PrivateMessage { to, body } => {
                self.deliver_private(sender, &[to], &body);
            },
        }
    }

    /// Applies a mute or unmute from `sender` against a named member,
    /// notifies both parties, and persists the sender's updated list.
    fn update_mute(&self, sender: &SessionRef, target: &str, mute: bool) {
        let Some(sender_name) = sender.display_name() else {
            tracing::warn!("nameless session {} cannot manage mutes", sender.id());
            return;
        };
        let Some(target_session) = self
            .member_snapshot()
            .into_iter()
            .find(|m| m.display_name().as_deref() == Some(target))
        else {
            tracing::debug!("mute target {target} is not a member of {}", self.name);
            return;
        };
        let changed =
            if mute { sender.mutes().mute(target) } else { sender.mutes().unmute(target) };
        if !changed {
            return;
        }
        if mute {
            let _ = target_session.send(MUTE_DAEMON, &format!("You were muted by {sender_name}"));
            let _ = sender.send(MUTE_DAEMON, &format!("Muted {target}"));
        } else {
            let _ = target_session.send(MUTE_DAEMON, &format!("You are unmuted by {sender_name}"));
            let _ = sender.send(MUTE_DAEMON, &format!("Unmuted {target}"));
        }
        if let Err(e) = self.mute_store.persist(&sender_name, &sender.mutes().snapshot()) {
            tracing::error!("failed to persist mute list for {sender_name}: {e}");
        }
    }

    /// Drops members whose transport reported a failed delivery, then runs
    /// empty-room cleanup if the prune emptied a non-default room.
    fn prune_failed(&self, failed: &[SessionId]) {
        if failed.is_empty() {
            return;
        }
        let now_empty = {
            let mut members = self.lock_members();
            members.retain(|m| !failed.contains(&m.id()));
            members.is_empty()
        };
        for id in failed {
            tracing::info!("removed member {id} from {} after failed delivery", self.name);
        }
        if now_empty {
            self.cleanup_empty();
        }
    }

    fn member_snapshot(&self) -> Vec<SessionRef> {
        self.lock_members().clone()
    }

    fn lock_members(&self) -> MutexGuard<'_, Vec<SessionRef>> {
        // A poisoned lock only means a peer task panicked mid-update;
        // membership stays usable and these ops are never fatal.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("is_default", &self.is_default)
            .field("member_count", &self.member_count())
            .finish()
    }
}
