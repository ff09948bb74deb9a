use std::path::PathBuf;

use client_core::QUICK_REACTIONS;
use shared::domain::{ChatId, MessageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Chats,
    Users,
    Select(ChatId),
    Leave,
    Resync,
    Reply(MessageId),
    CancelReply,
    React { message_id: MessageId, emoji: String },
    Unreact(MessageId),
    File { path: PathBuf, caption: String },
    Save { message_id: MessageId, path: PathBuf },
    Direct { username: String },
    Group { name: String, usernames: Vec<String> },
    Say(String),
}

pub const HELP: &str = "\
/chats                      list chats
/users                      list users
/select <chat_id>           open a chat
/leave                      close the active chat
/resync                     re-pull the active chat
/reply <message_id>         reply to a message with the next send
/cancel                     drop the pending reply
/react <message_id> <emoji|1-5>
/unreact <message_id>
/file <path> [caption]      send a file
/save <message_id> <path>   download an attachment
/dm <username>              start a direct chat
/group <name> <user,user>   start a group chat
/quit
anything else is sent as a message";

fn message_id(arg: Option<&str>) -> Result<MessageId, String> {
    arg.ok_or("missing message id")?
        .parse()
        .map(MessageId)
        .map_err(|_| "message id must be a number".to_string())
}

/// Resolves a palette index (1-based) or passes the emoji through.
fn emoji(arg: &str) -> String {
    arg.parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| QUICK_REACTIONS.get(index))
        .map_or_else(|| arg.to_string(), |emoji| emoji.to_string())
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
    let args = args.trim();
    let mut words = args.split_whitespace();
    let command = match name {
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "chats" => Command::Chats,
        "users" => Command::Users,
        "select" => Command::Select(ChatId(
            words
                .next()
                .ok_or("missing chat id")?
                .parse()
                .map_err(|_| "chat id must be a number")?,
        )),
        "leave" => Command::Leave,
        "resync" => Command::Resync,
        "reply" => Command::Reply(message_id(words.next())?),
        "cancel" => Command::CancelReply,
        "react" => {
            let message_id = message_id(words.next())?;
            let emoji = emoji(words.next().ok_or("missing emoji")?);
            Command::React { message_id, emoji }
        }
        "unreact" => Command::Unreact(message_id(words.next())?),
        "file" => {
            let (path, caption) = args.split_once(' ').unwrap_or((args, ""));
            if path.is_empty() {
                return Err("missing file path".into());
            }
            Command::File {
                path: PathBuf::from(path),
                caption: caption.trim().to_string(),
            }
        }
        "save" => {
            let message_id = message_id(words.next())?;
            let path = words.next().ok_or("missing destination path")?;
            Command::Save {
                message_id,
                path: PathBuf::from(path),
            }
        }
        "dm" => Command::Direct {
            username: words.next().ok_or("missing username")?.to_string(),
        },
        "group" => {
            let name = words.next().ok_or("missing group name")?.to_string();
            let usernames = words
                .next()
                .ok_or("missing members")?
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            Command::Group { name, usernames }
        }
        other => return Err(format!("unknown command /{other}; try /help")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse("  hello there "),
            Ok(Some(Command::Say("hello there".into())))
        );
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn reactions_accept_palette_indexes() {
        assert_eq!(
            parse("/react 12 2"),
            Ok(Some(Command::React {
                message_id: MessageId(12),
                emoji: "❤️".into(),
            }))
        );
        assert_eq!(
            parse("/react 12 🎉"),
            Ok(Some(Command::React {
                message_id: MessageId(12),
                emoji: "🎉".into(),
            }))
        );
        assert!(parse("/react twelve 1").is_err());
    }

    #[test]
    fn file_caption_keeps_spaces() {
        assert_eq!(
            parse("/file ./cat.png look at this"),
            Ok(Some(Command::File {
                path: PathBuf::from("./cat.png"),
                caption: "look at this".into(),
            }))
        );
        assert!(parse("/file").is_err());
    }

    #[test]
    fn group_members_are_comma_separated() {
        assert_eq!(
            parse("/group crew bob, carol"),
            Ok(Some(Command::Group {
                name: "crew".into(),
                usernames: vec!["bob".into()],
            }))
        );
        assert_eq!(
            parse("/group crew bob,carol"),
            Ok(Some(Command::Group {
                name: "crew".into(),
                usernames: vec!["bob".into(), "carol".into()],
            }))
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse("/frobnicate").is_err());
    }
}
