//! In-band command grammar.
//!
//! A message is command-shaped iff it contains the trigger character `/`
//! anywhere. The substring after the *first* trigger is split on literal
//! spaces: token 0 is the case-insensitive command name, the remaining
//! tokens are positional arguments. There is no quoting or escaping.
//!
//! Parsing is a pure function separated from dispatch ([`crate::room`]):
//! unrecognized names and malformed invocations both fall through to plain
//! broadcast, but malformed ones are surfaced to the caller for logging.

/// Character that marks a message as command-shaped.
pub const COMMAND_TRIGGER: char = '/';

/// A recognized, arity-checked command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a room and move the invoker into it.
    CreateRoom {
        /// Name of the room to create.
        room: String,
    },
    /// Move the invoker into an existing room.
    JoinRoom {
        /// Name of the room to join.
        room: String,
    },
    /// Roll a die, broadcasting the result as a room message.
    Roll,
    /// Flip a coin, broadcasting the result as a room message.
    Flip,
    /// Suppress messages from a named peer.
    Mute {
        /// Display name of the peer to mute.
        target: String,
    },
    /// Stop suppressing messages from a named peer.
    Unmute {
        /// Display name of the peer to unmute.
        target: String,
    },
    /// Deliver a message privately to a named peer.
    PrivateMessage {
        /// Display name of the recipient.
        to: String,
        /// Message body, relayed verbatim.
        body: String,
    },
}

/// Outcome of offering a message to the command grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// No trigger, or an unrecognized command name: broadcast as-is.
    NotACommand,
    /// A recognized command ready for dispatch.
    Recognized(Command),
    /// A recognized name with unusable arguments. Logged by the caller and
    /// then treated like plain text; no error reaches the remote party.
    Malformed {
        /// The command name as typed (lowercased).
        command: String,
        /// What was wrong with the invocation.
        reason: &'static str,
    },
}

/// Parses a message against the command grammar.
pub fn parse(message: &str) -> ParsedCommand {
    let Some(idx) = message.find(COMMAND_TRIGGER) else {
        return ParsedCommand::NotACommand;
    };
    let rest = &message[idx + COMMAND_TRIGGER.len_utf8()..];

    let (name_token, args) = match rest.split_once(' ') {
        Some((name, args)) => (name, Some(args)),
        None => (rest, None),
    };
    let name = name_token.to_lowercase();

    match name.as_str() {
        "createroom" => match first_token(args) {
            Some(room) => ParsedCommand::Recognized(Command::CreateRoom { room: room.to_string() }),
            None => malformed(&name, "missing room name"),
        },
        "joinroom" => match first_token(args) {
            Some(room) => ParsedCommand::Recognized(Command::JoinRoom { room: room.to_string() }),
            None => malformed(&name, "missing room name"),
        },
        "roll" => ParsedCommand::Recognized(Command::Roll),
        "flip" => ParsedCommand::Recognized(Command::Flip),
        "mute" => match first_token(args) {
            Some(target) => {
                ParsedCommand::Recognized(Command::Mute { target: target.to_string() })
            },
            None => malformed(&name, "missing target name"),
        },
        "unmute" => match first_token(args) {
            Some(target) => {
                ParsedCommand::Recognized(Command::Unmute { target: target.to_string() })
            },
            None => malformed(&name, "missing target name"),
        },
        "pm" => parse_private_message(&name, args),
        _ => ParsedCommand::NotACommand,
    }
}

/// `pm <recipient> <body...>`: the body is relayed verbatim, spaces and
/// all, so it is split off with `split_once` rather than tokenized.
fn parse_private_message(name: &str, args: Option<&str>) -> ParsedCommand {
    let Some(args) = args else {
        return malformed(name, "missing recipient");
    };
    let Some((to, body)) = args.split_once(' ') else {
        return malformed(name, "missing message body");
    };
    if to.is_empty() {
        return malformed(name, "missing recipient");
    }
    if body.is_empty() {
        return malformed(name, "missing message body");
    }
    ParsedCommand::Recognized(Command::PrivateMessage { to: to.to_string(), body: body.to_string() })
}

/// First positional argument, if present and non-empty.
fn first_token(args: Option<&str>) -> Option<&str> {
    let token = args?.split(' ').next()?;
    if token.is_empty() { None } else { Some(token) }
}

fn malformed(command: &str, reason: &'static str) -> ParsedCommand {
    ParsedCommand::Malformed { command: command.to_string(), reason }
}
