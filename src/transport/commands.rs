// src/transport/commands.rs
//! Chat command surface: `/proposals`, `/tweets`, `/spotify`, `/calendar`, `/treasury`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::telegram::TelegramTransport;
use super::{split_message, MessageTransport};
use crate::markdown::escape;
use crate::orchestrator::Orchestrator;
use crate::sources::SourceKind;

/// Minimum similarity for a "did you mean" hint.
const SUGGEST_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Digest(SourceKind),
    Unknown {
        name: String,
        suggestion: Option<&'static str>,
    },
}

/// Parse a chat message. Returns `None` for anything that is not a command.
///
/// Accepts `/cmd`, `/cmd@botname` and trailing arguments (ignored).
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(match SourceKind::from_command(&name) {
        Some(kind) => Command::Digest(kind),
        None => Command::Unknown {
            suggestion: suggest(&name),
            name,
        },
    })
}

/// Closest known command name, if any is similar enough.
pub fn suggest(name: &str) -> Option<&'static str> {
    SourceKind::ALL
        .iter()
        .flat_map(|k| k.commands().iter().copied())
        .map(|c| (c, strsim::normalized_levenshtein(name, c)))
        .filter(|(_, score)| *score >= SUGGEST_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Text to answer a command with.
pub async fn reply_for(orchestrator: &Orchestrator, cmd: &Command) -> String {
    match cmd {
        Command::Digest(kind) => match orchestrator.get_digest(*kind).await {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "transport", source = %kind, error = %e, "command digest failed");
                format!("⚠️ The {} digest is unavailable right now\\.", escape(kind.as_str()))
            }
        },
        Command::Unknown { name, suggestion } => {
            let mut out = format!("🤷 Unknown command /{}\\.", escape(name));
            if let Some(s) = suggestion {
                out.push_str(&format!(" Did you mean /{}\\?", escape(s)));
            }
            out
        }
    }
}

/// Long-poll the bot for commands and answer each in its originating chat.
pub fn spawn_command_loop(
    orchestrator: Arc<Orchestrator>,
    telegram: Arc<TelegramTransport>,
    poll_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut offset: i64 = 0;
        info!(target: "transport", poll_secs, "command loop started");
        loop {
            let updates = match telegram.get_updates(offset, poll_secs).await {
                Ok(u) => u,
                Err(e) => {
                    warn!(target: "transport", error = %e, "getUpdates failed; backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(msg) = update.message else { continue };
                let Some(cmd) = msg.text.as_deref().and_then(parse_command) else {
                    continue;
                };
                debug!(target: "transport", chat = msg.chat.id, ?cmd, "command received");
                let reply = reply_for(&orchestrator, &cmd).await;
                let chat = msg.chat.id.to_string();
                for part in split_message(&reply, telegram.message_limit()) {
                    if let Err(e) = telegram.send_to(&chat, &part).await {
                        warn!(target: "transport", chat = %chat, error = %e, "command reply failed");
                        break;
                    }
                }
            }
        }
    })
}
