//! Room directory.
//!
//! Single owned registry mapping room names to live rooms, constructed
//! once at service start and handed to rooms as a shared handle. Nothing
//! here is process-global, so tests can run directories side by side.
//!
//! The directory is the sole authority on room existence: closing a room
//! is removing it from this map. It also enforces the one-room-per-session
//! invariant: every cross-room move goes through [`RoomDirectory::join_room`],
//! which removes the session from its previous room before adding it to
//! the next.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{env::Environment, mute::MuteStore, room::Room, session::SessionRef};

/// Registry of live rooms, owner of the default room.
pub struct RoomDirectory {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
    default_room: Arc<Room>,
    env: Arc<dyn Environment>,
    mute_store: Arc<dyn MuteStore>,
}

impl RoomDirectory {
    /// Creates a directory with its default room already registered.
    ///
    /// The default room lives for the directory's lifetime and is exempt
    /// from empty-room cleanup.
    pub fn new(
        default_name: &str,
        env: Arc<dyn Environment>,
        mute_store: Arc<dyn MuteStore>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let default_room =
                Room::new(default_name, true, weak.clone(), env.clone(), mute_store.clone());
            let mut rooms = HashMap::new();
            rooms.insert(default_name.to_string(), Arc::clone(&default_room));
            Self { rooms: Mutex::new(rooms), default_room, env, mute_store }
        })
    }

    /// The default room ("lobby").
    pub fn default_room(&self) -> Arc<Room> {
        Arc::clone(&self.default_room)
    }

    /// Looks up a live room by name.
    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.lock_rooms().get(name).cloned()
    }

    /// Names of all live rooms, sorted.
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_rooms().keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates a new empty room. Returns `false` if the name is taken.
    pub fn create_room(self: &Arc<Self>, name: &str) -> bool {
        let mut rooms = self.lock_rooms();
        if rooms.contains_key(name) {
            return false;
        }
        let room = Room::new(
            name,
            false,
            Arc::downgrade(self),
            self.env.clone(),
            self.mute_store.clone(),
        );
        rooms.insert(name.to_string(), room);
        tracing::info!("created room {name}");
        true
    }

    /// Moves a session into the named room, removing it from its current
    /// room first. Returns `false` (and leaves the session where it is) if
    /// no such room exists; no room is created implicitly.
    pub fn join_room(&self, name: &str, session: &SessionRef) -> bool {
        let Some(room) = self.room(name) else {
            tracing::warn!("session {} asked to join unknown room {name}", session.id());
            return false;
        };
        self.move_session(session, &room);
        true
    }

    /// Moves a session into the default room.
    pub fn join_default_room(&self, session: &SessionRef) {
        let room = self.default_room();
        self.move_session(session, &room);
    }

    /// Removes a closed room from the registry.
    ///
    /// Matches by identity, not just name, so a name reused by a newer
    /// room is never evicted by a stale close. The default room is never
    /// forgotten.
    pub fn forget_room(&self, room: &Room) {
        if room.is_default() {
            tracing::warn!("refusing to forget the default room {}", room.name());
            return;
        }
        let mut rooms = self.lock_rooms();
        if let Some(current) = rooms.get(room.name()) {
            if std::ptr::eq(Arc::as_ptr(current), room) {
                rooms.remove(room.name());
                tracing::debug!("forgot room {}", room.name());
            }
        }
    }

    fn move_session(&self, session: &SessionRef, room: &Arc<Room>) {
        if let Some(previous) = session.current_room() {
            if Arc::ptr_eq(&previous, room) {
                tracing::debug!("session {} is already in {}", session.id(), room.name());
                return;
            }
            previous.remove_client(session);
        }
        room.add_client(session);
    }

    fn lock_rooms(&self) -> MutexGuard<'_, HashMap<String, Arc<Room>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RoomDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomDirectory")
            .field("room_count", &self.lock_rooms().len())
            .field("default_room", &self.default_room.name())
            .finish()
    }
}
