use teloxide::types::Message;

use crate::router::AppState;

use super::{chat_id, sender_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Stats,
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn known_command(text: &str) -> Option<Command> {
    match parse_command(text).0.as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "stats" => Some(Command::Stats),
        _ => None,
    }
}

/// Returns `false` when the text is not one of our commands, so the caller can
/// still look for links in it.
pub async fn handle_command(msg: &Message, state: &AppState) -> bool {
    let Some(text) = msg.text() else {
        return false;
    };
    let Some(cmd) = known_command(text) else {
        return false;
    };

    let chat = chat_id(msg);
    let res = match cmd {
        Command::Start => state.relay.handle_start(chat).await,
        Command::Help => state.relay.handle_help(chat).await,
        Command::Stats => state.relay.handle_stats(chat, sender_id(msg)).await,
    };
    if let Err(e) = res {
        tracing::warn!(chat_id = chat.0, command = ?cmd, "command failed: {e}");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Stats@reel_bot  30 days"),
            ("stats".to_string(), "30 days".to_string())
        );
        assert_eq!(parse_command("/help"), ("help".to_string(), String::new()));
    }

    #[test]
    fn only_known_commands_are_claimed() {
        assert_eq!(known_command("/start"), Some(Command::Start));
        assert_eq!(known_command("/help@reel_bot"), Some(Command::Help));
        assert_eq!(known_command("/stats"), Some(Command::Stats));
        assert_eq!(known_command("/download https://instagram.com/p/x"), None);
        assert_eq!(known_command("/"), None);
    }
}
