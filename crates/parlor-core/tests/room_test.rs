//! Room membership, lifecycle, and fan-out tests.

use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicBool, Ordering},
};

use parlor_core::{
    ClientSession, Environment, MemoryMuteStore, MuteRegistry, Room, RoomDirectory, SessionId,
    SessionRef,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded environment so dice/coin tests are reproducible.
struct TestEnv(Mutex<ChaCha8Rng>);

impl TestEnv {
    fn new(seed: u64) -> Arc<Self> {
        Arc::new(Self(Mutex::new(ChaCha8Rng::seed_from_u64(seed))))
    }
}

impl Environment for TestEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.0.lock().unwrap().fill_bytes(buffer);
    }
}

/// Everything a session can be told, recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Received {
    Chat { sender: String, body: String },
    Status { name: String, is_joining: bool, message: Option<String> },
    ClearList,
}

/// In-memory session double. `alive = false` makes every send fail, which
/// is how the transport reports a disconnected peer.
struct TestSession {
    id: SessionId,
    name: Mutex<Option<String>>,
    room: Mutex<Weak<Room>>,
    alive: AtomicBool,
    inbox: Mutex<Vec<Received>>,
    mutes: MuteRegistry,
}

impl TestSession {
    fn new(id: u64, name: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId(id),
            name: Mutex::new(name.map(str::to_string)),
            room: Mutex::new(Weak::new()),
            alive: AtomicBool::new(true),
            inbox: Mutex::new(Vec::new()),
            mutes: MuteRegistry::new(),
        })
    }

    fn set_name(&self, name: &str) {
        *self.name.lock().unwrap() = Some(name.to_string());
    }

    fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    fn received(&self) -> Vec<Received> {
        self.inbox.lock().unwrap().clone()
    }

    fn chats_from(&self, sender: &str) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|r| match r {
                Received::Chat { sender: s, body } if s == sender => Some(body),
                _ => None,
            })
            .collect()
    }

    fn clear_inbox(&self) {
        self.inbox.lock().unwrap().clear();
    }

    fn record(&self, event: Received) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        self.inbox.lock().unwrap().push(event);
        true
    }
}

impl ClientSession for TestSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn display_name(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }

    fn set_current_room(&self, room: &Arc<Room>) {
        *self.room.lock().unwrap() = Arc::downgrade(room);
    }

    fn current_room(&self) -> Option<Arc<Room>> {
        self.room.lock().unwrap().upgrade()
    }

    fn send(&self, sender_name: &str, body: &str) -> bool {
        self.record(Received::Chat { sender: sender_name.to_string(), body: body.to_string() })
    }

    fn send_connection_status(&self, name: &str, is_joining: bool, message: Option<&str>) -> bool {
        self.record(Received::Status {
            name: name.to_string(),
            is_joining,
            message: message.map(str::to_string),
        })
    }

    fn send_clear_list(&self) -> bool {
        self.record(Received::ClearList)
    }

    fn mutes(&self) -> &MuteRegistry {
        &self.mutes
    }
}

fn make_directory(seed: u64) -> (Arc<RoomDirectory>, Arc<MemoryMuteStore>) {
    let store = Arc::new(MemoryMuteStore::new());
    let directory = RoomDirectory::new("lobby", TestEnv::new(seed), store.clone());
    (directory, store)
}

/// Lobby with alice, bob, and charlie already joined and inboxes cleared.
fn lobby_trio(
    seed: u64,
) -> (Arc<RoomDirectory>, Arc<MemoryMuteStore>, [Arc<TestSession>; 3]) {
    let (directory, store) = make_directory(seed);
    let alice = TestSession::new(1, Some("alice"));
    let bob = TestSession::new(2, Some("bob"));
    let charlie = TestSession::new(3, Some("charlie"));
    for session in [&alice, &bob, &charlie] {
        let session_ref: SessionRef = session.clone();
        directory.join_default_room(&session_ref);
    }
    for session in [&alice, &bob, &charlie] {
        session.clear_inbox();
    }
    (directory, store, [alice, bob, charlie])
}

#[test]
fn adding_a_session_twice_is_idempotent() {
    let (directory, _, [alice, _, _]) = lobby_trio(1);
    let lobby = directory.default_room();
    let alice_ref: SessionRef = alice.clone();

    assert_eq!(lobby.member_count(), 3);
    lobby.add_client(&alice_ref);
    assert_eq!(lobby.member_count(), 3);
}

#[test]
fn removing_an_absent_session_is_a_noop() {
    let (directory, _, [_, bob, _]) = lobby_trio(1);
    let lobby = directory.default_room();
    let stranger: SessionRef = TestSession::new(99, Some("stranger"));

    lobby.remove_client(&stranger);

    assert_eq!(lobby.member_count(), 3);
    // No departure announcement for someone who was never here
    assert!(bob.received().is_empty());
}

#[test]
fn membership_preserves_join_order() {
    let (directory, _, _) = lobby_trio(1);
    let lobby = directory.default_room();

    assert_eq!(lobby.member_names(), vec!["alice", "bob", "charlie"]);
}

#[test]
fn empty_room_closes_but_default_room_survives() {
    let (directory, _, [alice, _, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();

    assert!(directory.create_room("den"));
    assert!(directory.join_room("den", &alice_ref));
    assert!(directory.room("den").is_some());

    let den = directory.room("den").unwrap();
    den.remove_client(&alice_ref);

    assert!(directory.room("den").is_none(), "empty non-default room must close");
    assert!(directory.room("lobby").is_some());

    // The lobby itself never closes, even when emptied
    let (directory, _) = make_directory(2);
    let solo = TestSession::new(1, Some("solo"));
    let solo_ref: SessionRef = solo.clone();
    directory.join_default_room(&solo_ref);
    directory.default_room().remove_client(&solo_ref);
    assert_eq!(directory.default_room().member_count(), 0);
    assert!(directory.room("lobby").is_some());
}

#[test]
fn closing_a_nonempty_room_migrates_members_to_default() {
    let (directory, _, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let bob_ref: SessionRef = bob.clone();

    directory.create_room("den");
    directory.join_room("den", &alice_ref);
    directory.join_room("den", &bob_ref);
    let den = directory.room("den").unwrap();
    assert_eq!(den.member_count(), 2);

    den.close();

    assert_eq!(den.member_count(), 0);
    assert!(directory.room("den").is_none());
    let lobby = directory.default_room();
    assert!(lobby.is_member(SessionId(1)));
    assert!(lobby.is_member(SessionId(2)));
    assert_eq!(alice.current_room().unwrap().name(), "lobby");
    assert_eq!(bob.current_room().unwrap().name(), "lobby");
}

#[test]
fn session_is_in_at_most_one_room() {
    let (directory, _, [alice, _, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();

    directory.create_room("den");
    directory.join_room("den", &alice_ref);

    assert!(!directory.default_room().is_member(SessionId(1)));
    assert!(directory.room("den").unwrap().is_member(SessionId(1)));
}

#[test]
fn broadcast_reaches_all_members_including_sender() {
    let (_directory, _, [alice, bob, charlie]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "hello");

    for session in [&alice, &bob, &charlie] {
        assert_eq!(session.chats_from("alice"), vec!["hello"]);
    }
}

#[test]
fn failed_delivery_drops_the_recipient_without_aborting_fanout() {
    let (directory, _, [alice, bob, charlie]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = directory.default_room();

    bob.disconnect();
    lobby.send_message(&alice_ref, "anyone there?");

    assert!(!lobby.is_member(SessionId(2)), "dead member must be pruned");
    assert_eq!(charlie.chats_from("alice"), vec!["anyone there?"]);
    assert_eq!(lobby.member_count(), 2);
}

#[test]
fn prune_that_empties_a_room_closes_it() {
    let (directory, _, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let bob_ref: SessionRef = bob.clone();

    directory.create_room("den");
    directory.join_room("den", &alice_ref);
    directory.join_room("den", &bob_ref);
    let den = directory.room("den").unwrap();

    alice.disconnect();
    bob.disconnect();
    den.send_message(&alice_ref, "last words");

    assert_eq!(den.member_count(), 0);
    assert!(directory.room("den").is_none());
}

#[test]
fn join_announcements_and_roster_sync() {
    let (directory, _, [alice, bob, _]) = lobby_trio(1);
    let lobby = directory.default_room();
    let dana = TestSession::new(4, Some("dana"));
    let dana_ref: SessionRef = dana.clone();

    lobby.add_client(&dana_ref);

    // Everyone already present hears the join
    for session in [&alice, &bob] {
        assert!(session.received().contains(&Received::Status {
            name: "dana".to_string(),
            is_joining: true,
            message: Some("joined the room lobby".to_string()),
        }));
    }
    // The joiner gets a roster reset followed by one entry per named peer
    let received = dana.received();
    assert_eq!(received.first(), Some(&Received::ClearList));
    for peer in ["alice", "bob", "charlie"] {
        assert!(received.contains(&Received::Status {
            name: peer.to_string(),
            is_joining: true,
            message: None,
        }));
    }
}

#[test]
fn nameless_join_defers_roster_sync_until_named() {
    let (directory, _, [alice, _, _]) = lobby_trio(1);
    let lobby = directory.default_room();
    let ghost = TestSession::new(9, None);
    let ghost_ref: SessionRef = ghost.clone();

    lobby.add_client(&ghost_ref);

    assert!(lobby.is_member(SessionId(9)), "nameless session still holds membership");
    assert!(ghost.received().is_empty());
    assert!(alice.received().is_empty(), "no announcement for a nameless join");

    // Name resolves; the join-equivalent runs the full protocol
    ghost.set_name("dana");
    lobby.sync_client(&ghost_ref);

    assert_eq!(ghost.received().first(), Some(&Received::ClearList));
    assert!(alice.received().contains(&Received::Status {
        name: "dana".to_string(),
        is_joining: true,
        message: Some("joined the room lobby".to_string()),
    }));
}

#[test]
fn departure_is_announced_to_the_remainder() {
    let (directory, _, [alice, bob, _]) = lobby_trio(1);
    let lobby = directory.default_room();
    let bob_ref: SessionRef = bob.clone();

    lobby.remove_client(&bob_ref);

    assert!(alice.received().contains(&Received::Status {
        name: "bob".to_string(),
        is_joining: false,
        message: Some("left the room lobby".to_string()),
    }));
    assert!(bob.received().is_empty(), "the departed session hears nothing");
}

#[test]
fn mute_scenario_notifies_persists_and_suppresses_per_viewer() {
    let (_directory, store, [alice, bob, charlie]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let bob_ref: SessionRef = bob.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "/mute bob");

    assert_eq!(bob.chats_from("Mute Daemon"), vec!["You were muted by alice"]);
    assert_eq!(alice.chats_from("Mute Daemon"), vec!["Muted bob"]);
    assert_eq!(store.saved("alice").unwrap(), vec!["bob"]);
    // The command is consumed, not broadcast
    assert!(charlie.received().is_empty());

    // Mute is a per-viewer relation: bob is silenced for alice only
    lobby.send_message(&bob_ref, "hello");
    assert!(alice.chats_from("bob").is_empty());
    assert_eq!(charlie.chats_from("bob"), vec!["hello"]);
    assert_eq!(bob.chats_from("bob"), vec!["hello"]);
}

#[test]
fn unmute_restores_delivery_and_persists() {
    let (_directory, store, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let bob_ref: SessionRef = bob.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "/mute bob");
    lobby.send_message(&alice_ref, "/unmute bob");

    assert_eq!(
        bob.chats_from("Mute Daemon"),
        vec!["You were muted by alice", "You are unmuted by alice"]
    );
    assert_eq!(alice.chats_from("Mute Daemon"), vec!["Muted bob", "Unmuted bob"]);
    assert_eq!(store.saved("alice").unwrap(), Vec::<String>::new());

    lobby.send_message(&bob_ref, "back again");
    assert_eq!(alice.chats_from("bob"), vec!["back again"]);
}

#[test]
fn muting_twice_changes_nothing() {
    let (_directory, store, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "/mute bob");
    lobby.send_message(&alice_ref, "/mute bob");

    // Only one round of notices
    assert_eq!(bob.chats_from("Mute Daemon"), vec!["You were muted by alice"]);
    assert_eq!(store.saved("alice").unwrap(), vec!["bob"]);
}

#[test]
fn mute_target_outside_the_room_is_ignored() {
    let (_directory, store, [alice, _, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "/mute nobody");

    assert!(alice.chats_from("Mute Daemon").is_empty());
    assert!(store.saved("alice").is_none());
}

#[test]
fn pm_reaches_exactly_the_named_recipient() {
    let (_directory, _, [alice, bob, charlie]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "/pm bob meet me in the den");

    assert_eq!(bob.chats_from("alice"), vec!["meet me in the den"]);
    assert!(charlie.received().is_empty());
    assert!(alice.received().is_empty(), "no self-echo on private sends");
}

#[test]
fn private_send_honors_explicit_recipient_list() {
    let (_directory, _, [alice, bob, charlie]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_private_message(
        &alice_ref,
        &["bob".to_string(), "charlie".to_string()],
        "both of you",
    );

    assert_eq!(bob.chats_from("alice"), vec!["both of you"]);
    assert_eq!(charlie.chats_from("alice"), vec!["both of you"]);
    assert!(alice.received().is_empty());
}

#[test]
fn createroom_moves_the_invoker() {
    let (directory, _, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = directory.default_room();

    lobby.send_message(&alice_ref, "/createroom den");

    let den = directory.room("den").expect("room must exist after createroom");
    assert_eq!(directory.room_names(), vec!["den", "lobby"]);
    assert!(den.is_member(SessionId(1)));
    assert!(!lobby.is_member(SessionId(1)));
    // The lobby remainder hears the departure
    assert!(bob.received().contains(&Received::Status {
        name: "alice".to_string(),
        is_joining: false,
        message: Some("left the room lobby".to_string()),
    }));
}

#[test]
fn createroom_with_taken_name_does_not_move_the_invoker() {
    let (directory, _, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let bob_ref: SessionRef = bob.clone();
    let lobby = directory.default_room();

    lobby.send_message(&alice_ref, "/createroom den");
    lobby.send_message(&bob_ref, "/createroom den");

    assert!(!directory.room("den").unwrap().is_member(SessionId(2)));
    assert!(lobby.is_member(SessionId(2)));
}

#[test]
fn joinroom_to_unknown_room_leaves_the_session_in_place() {
    let (directory, _, [alice, _, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = directory.default_room();

    lobby.send_message(&alice_ref, "/joinroom nowhere");

    assert!(lobby.is_member(SessionId(1)));
}

#[test]
fn unrecognized_and_malformed_commands_fall_through_to_broadcast() {
    let (_directory, _, [alice, bob, _]) = lobby_trio(1);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    lobby.send_message(&alice_ref, "/wave everyone");
    lobby.send_message(&alice_ref, "/mute");

    assert_eq!(bob.chats_from("alice"), vec!["/wave everyone", "/mute"]);
}

#[test]
fn roll_stays_in_range_and_covers_every_face() {
    let (_directory, _, [alice, bob, _]) = lobby_trio(42);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    let trials: usize = 500;
    for _ in 0..trials {
        lobby.send_message(&alice_ref, "/roll");
    }

    let mut counts = [0usize; 5];
    for body in bob.chats_from("alice") {
        let digits = body
            .strip_prefix("%You got:")
            .and_then(|rest| rest.strip_suffix('%'))
            .unwrap_or_else(|| panic!("unexpected roll response: {body}"));
        let value: usize = digits.parse().unwrap();
        assert!((1..=5).contains(&value), "roll out of range: {value}");
        counts[value - 1] += 1;
    }

    assert_eq!(counts.iter().sum::<usize>(), trials);
    // Uniform expectation is 100 per face; a deterministic seed keeps this
    // loose band stable.
    for (face, count) in counts.iter().enumerate() {
        assert!(
            (50..=200).contains(count),
            "face {} appeared {} times in {} trials",
            face + 1,
            count,
            trials
        );
    }
}

#[test]
fn flip_yields_both_sides_without_heavy_skew() {
    let (_directory, _, [alice, bob, _]) = lobby_trio(43);
    let alice_ref: SessionRef = alice.clone();
    let lobby = alice.current_room().unwrap();

    let trials: usize = 500;
    for _ in 0..trials {
        lobby.send_message(&alice_ref, "/flip");
    }

    let responses = bob.chats_from("alice");
    assert_eq!(responses.len(), trials);
    let heads = responses.iter().filter(|r| r.as_str() == "*Heads*").count();
    let tails = responses.iter().filter(|r| r.as_str() == "*Tails*").count();
    assert_eq!(heads + tails, trials, "flip must answer exactly *Heads* or *Tails*");
    assert!((150..=350).contains(&heads), "heads came up {heads} times in {trials} trials");
    assert!((150..=350).contains(&tails), "tails came up {tails} times in {trials} trials");
}
