//! Chat-style text commands (`!play`, `!skip`, ...).
//!
//! [`CommandRegistry`] owns the name/alias table and turns prefixed text
//! into a [`ParsedCommand`]; [`CommandRegistry::execute`] runs it against a
//! [`CoordinatorHandle`] and renders a human-readable reply.

use serde::Serialize;
use thiserror::Error;

use crate::error::{ErrorCode, PsychosonusError, PsychosonusResult};
use crate::protocol_constants::QUEUE_DISPLAY_LIMIT;
use crate::queue::QueueEntry;
use crate::services::{CatalogSource, CoordinatorHandle, PlaybackState, SearchService};

/// Command identity, independent of arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Join,
    Leave,
    Queue,
    Skip,
    Stop,
    Play,
    Pause,
    Resume,
    Status,
    Help,
}

/// A recognised command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Join { channel: String },
    Leave,
    Queue,
    Skip,
    Stop,
    Play { query: String },
    Pause,
    Resume,
    Status,
    Help,
}

impl ParsedCommand {
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Join { .. } => CommandKind::Join,
            Self::Leave => CommandKind::Leave,
            Self::Queue => CommandKind::Queue,
            Self::Skip => CommandKind::Skip,
            Self::Stop => CommandKind::Stop,
            Self::Play { .. } => CommandKind::Play,
            Self::Pause => CommandKind::Pause,
            Self::Resume => CommandKind::Resume,
            Self::Status => CommandKind::Status,
            Self::Help => CommandKind::Help,
        }
    }
}

/// Text rendered back to whoever issued the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    pub text: String,
}

impl CommandReply {
    fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    fn failure(err: &PsychosonusError) -> Self {
        Self::new(format!("❌ {}", err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    MissingArgument(String),
}

impl ErrorCode for CommandError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "unknown_command",
            Self::MissingArgument(_) => "missing_argument",
        }
    }
}

impl From<CommandError> for PsychosonusError {
    fn from(err: CommandError) -> Self {
        PsychosonusError::InvalidRequest(err.to_string())
    }
}

struct CommandSpec {
    name: &'static str,
    aliases: &'static [&'static str],
    usage: &'static str,
    summary: &'static str,
    kind: CommandKind,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "join",
        aliases: &["j"],
        usage: "join <channel>",
        summary: "Join a voice channel",
        kind: CommandKind::Join,
    },
    CommandSpec {
        name: "leave",
        aliases: &["l", "disconnect"],
        usage: "leave",
        summary: "Leave the voice channel",
        kind: CommandKind::Leave,
    },
    CommandSpec {
        name: "play",
        aliases: &["p"],
        usage: "play <query>",
        summary: "Search YouTube and queue the first result",
        kind: CommandKind::Play,
    },
    CommandSpec {
        name: "queue",
        aliases: &["q"],
        usage: "queue",
        summary: "Show the queue",
        kind: CommandKind::Queue,
    },
    CommandSpec {
        name: "skip",
        aliases: &["s"],
        usage: "skip",
        summary: "Skip the current song",
        kind: CommandKind::Skip,
    },
    CommandSpec {
        name: "stop",
        aliases: &[],
        usage: "stop",
        summary: "Stop playback and clear the queue",
        kind: CommandKind::Stop,
    },
    CommandSpec {
        name: "pause",
        aliases: &[],
        usage: "pause",
        summary: "Pause playback",
        kind: CommandKind::Pause,
    },
    CommandSpec {
        name: "resume",
        aliases: &[],
        usage: "resume",
        summary: "Resume paused playback",
        kind: CommandKind::Resume,
    },
    CommandSpec {
        name: "status",
        aliases: &[],
        usage: "status",
        summary: "Show what is playing",
        kind: CommandKind::Status,
    },
    CommandSpec {
        name: "help",
        aliases: &[],
        usage: "help",
        summary: "List commands",
        kind: CommandKind::Help,
    },
];

/// Name/alias table plus the configured prefix.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    prefix: String,
}

impl CommandRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Looks up a command name or alias (case-insensitive).
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<CommandKind> {
        let name = name.to_ascii_lowercase();
        COMMANDS
            .iter()
            .find(|spec| spec.name == name || spec.aliases.contains(&name.as_str()))
            .map(|spec| spec.kind)
    }

    /// Parses `text` as a command.
    ///
    /// Returns `Ok(None)` for text that does not start with the prefix (or is
    /// only the prefix).
    pub fn parse(&self, text: &str) -> Result<Option<ParsedCommand>, CommandError> {
        let Some(body) = text.trim().strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };
        let body = body.trim();
        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        if head.is_empty() {
            return Ok(None);
        }

        let kind = self
            .lookup(head)
            .ok_or_else(|| CommandError::Unknown(head.to_ascii_lowercase()))?;

        let parsed = match kind {
            CommandKind::Join => ParsedCommand::Join {
                channel: self.required(rest, "join <channel>")?,
            },
            CommandKind::Play => ParsedCommand::Play {
                query: self.required(rest, "play <query>")?,
            },
            CommandKind::Leave => ParsedCommand::Leave,
            CommandKind::Queue => ParsedCommand::Queue,
            CommandKind::Skip => ParsedCommand::Skip,
            CommandKind::Stop => ParsedCommand::Stop,
            CommandKind::Pause => ParsedCommand::Pause,
            CommandKind::Resume => ParsedCommand::Resume,
            CommandKind::Status => ParsedCommand::Status,
            CommandKind::Help => ParsedCommand::Help,
        };
        Ok(Some(parsed))
    }

    fn required(&self, rest: &str, usage: &str) -> Result<String, CommandError> {
        if rest.is_empty() {
            return Err(CommandError::MissingArgument(format!(
                "{}{}",
                self.prefix, usage
            )));
        }
        Ok(rest.to_string())
    }

    /// Parses and runs `text`. Parse failures are errors; command failures
    /// become `❌` replies.
    pub async fn dispatch(
        &self,
        text: &str,
        handle: &CoordinatorHandle,
        search: &SearchService,
    ) -> PsychosonusResult<Option<CommandReply>> {
        match self.parse(text)? {
            Some(command) => Ok(Some(self.execute(command, handle, search).await)),
            None => Ok(None),
        }
    }

    /// Runs one parsed command.
    pub async fn execute(
        &self,
        command: ParsedCommand,
        handle: &CoordinatorHandle,
        search: &SearchService,
    ) -> CommandReply {
        log::debug!("[Commands] Executing {:?}", command.kind());
        let result = match command {
            ParsedCommand::Join { channel } => handle.connect(&channel).await.map(|outcome| {
                if outcome.already_connected {
                    CommandReply::new(format!("🎵 Already in **{}**", outcome.channel))
                } else {
                    CommandReply::new(format!("🎵 Joined **{}**", outcome.channel))
                }
            }),
            ParsedCommand::Leave => handle
                .disconnect()
                .await
                .map(|()| CommandReply::new("👋 Left voice channel")),
            ParsedCommand::Queue => Ok(render_queue(&handle.snapshot())),
            ParsedCommand::Skip => handle
                .skip()
                .await
                .map(|track| CommandReply::new(format!("⏭️ Skipped **{}**", track.title()))),
            ParsedCommand::Stop => handle
                .stop()
                .await
                .map(|()| CommandReply::new("⏹️ Stopped and cleared queue")),
            ParsedCommand::Play { query } => play(&query, handle, search).await,
            ParsedCommand::Pause => handle
                .pause()
                .await
                .map(|()| CommandReply::new("⏸️ Paused")),
            ParsedCommand::Resume => handle
                .resume()
                .await
                .map(|()| CommandReply::new("▶️ Resumed")),
            ParsedCommand::Status => Ok(render_status(handle)),
            ParsedCommand::Help => Ok(self.help()),
        };

        result.unwrap_or_else(|e| {
            log::info!("[Commands] Command failed: {}", e);
            CommandReply::failure(&e)
        })
    }

    #[must_use]
    pub fn help(&self) -> CommandReply {
        let lines: Vec<String> = COMMANDS
            .iter()
            .map(|spec| {
                let aliases = if spec.aliases.is_empty() {
                    String::new()
                } else {
                    format!(
                        " ({})",
                        spec.aliases
                            .iter()
                            .map(|a| format!("{}{}", self.prefix, a))
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                };
                format!("`{}{}`{} - {}", self.prefix, spec.usage, aliases, spec.summary)
            })
            .collect();
        CommandReply::new(format!("🎵 **Commands:**\n{}", lines.join("\n")))
    }
}

async fn play(
    query: &str,
    handle: &CoordinatorHandle,
    search: &SearchService,
) -> PsychosonusResult<CommandReply> {
    let tracks = search.search(query, Some(1), CatalogSource::Youtube).await?;
    let Some(track) = tracks.into_iter().next() else {
        return Ok(CommandReply::new("❌ No results found"));
    };

    let label = format!("**{}** - {}", track.title(), track.artist());
    let outcome = handle.enqueue(track).await?;
    let text = if outcome.playback_started {
        format!("✅ Playing: {}", label)
    } else if handle.status().connected {
        format!(
            "✅ Added to queue: {} (position {})",
            label,
            outcome.position + 1
        )
    } else {
        format!("✅ Added to queue: {} (not connected to a voice channel)", label)
    };
    Ok(CommandReply::new(text))
}

fn render_queue(entries: &[QueueEntry]) -> CommandReply {
    if entries.is_empty() {
        return CommandReply::new("📭 Queue is empty");
    }

    let mut lines = vec!["🎼 **Queue:**".to_string()];
    let mut number = 0;
    for entry in entries.iter().take(QUEUE_DISPLAY_LIMIT) {
        let song = &entry.song;
        let prefix = if entry.current {
            "▶ ".to_string()
        } else {
            number += 1;
            format!("{}. ", number)
        };
        lines.push(format!(
            "{}**{}** - {} `{}`",
            prefix,
            song.title(),
            song.artist(),
            song.duration()
        ));
    }

    let remaining = entries.len().saturating_sub(QUEUE_DISPLAY_LIMIT);
    if remaining > 0 {
        lines.push(format!("... and {} more songs", remaining));
    }
    CommandReply::new(lines.join("\n"))
}

fn render_status(handle: &CoordinatorHandle) -> CommandReply {
    let status = handle.status();
    let Some(channel) = status.channel.as_deref() else {
        return CommandReply::new(format!(
            "🔌 Not connected ({} queued)",
            status.queue_size
        ));
    };

    let text = match (&status.current_track, status.state) {
        (Some(track), PlaybackState::Playing) if status.paused => {
            format!("⏸️ Paused in **{}**: **{}**", channel, track)
        }
        (Some(track), PlaybackState::Playing) => {
            format!("🎵 Now playing in **{}**: **{}**", channel, track)
        }
        (_, PlaybackState::Resolving) => format!("🔍 Finding a source in **{}**", channel),
        (_, PlaybackState::Advancing) => format!("⏭️ Advancing in **{}**", channel),
        _ => format!("💤 Idle in **{}**", channel),
    };
    CommandReply::new(format!("{} ({} queued)", text, status.queue_size))
}
