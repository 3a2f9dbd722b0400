/// A classified line received from an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PrivateMessage { target: String, body: String },
    Help,
    Recent,
    Join { room: String },
    Room,
    RoomList,
    UserList,
    Chat { text: String },
}

/// Classify one LF-stripped line of input. Unknown `/`-prefixed tokens fall
/// through to `Chat`, matching the reference behaviour.
pub fn classify(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = after_prefix(line, "/pm") {
        let rest = rest.trim_start();
        return match rest.split_once(char::is_whitespace) {
            Some((target, body)) if !target.is_empty() => Command::PrivateMessage {
                target: target.to_string(),
                body: body.trim_start().to_string(),
            },
            _ => Command::Chat {
                text: line.to_string(),
            },
        };
    }

    if after_prefix(line, "/help").is_some() {
        return Command::Help;
    }

    if after_prefix(line, "/recent").is_some() {
        return Command::Recent;
    }

    if let Some(rest) = after_prefix(line, "/join") {
        return Command::Join {
            room: rest.trim().to_string(),
        };
    }

    if after_prefix(line, "/rooms").is_some() {
        return Command::RoomList;
    }

    if after_prefix(line, "/room").is_some() {
        return Command::Room;
    }

    if after_prefix(line, "/users").is_some() {
        return Command::UserList;
    }

    Command::Chat {
        text: line.to_string(),
    }
}

/// If `line` starts with the literal `prefix` followed by end-of-input or
/// whitespace, return the remainder after the prefix (not yet trimmed).
fn after_prefix<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}
