//! Shell commands.
//!
//! One command per input line. Playlist positions are 1-based here and
//! converted to indices before reaching the coordinator.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;
use tubeloop_core::config::Preferences;
use tubeloop_core::player::{PlayerErrorCode, PlayerState};
use tubeloop_core::transfer;
use tubeloop_core::{
    AppConfig, KeyValueStore, PlayMode, PlaybackCoordinator, PlayerEvent, SessionEvent,
};

use crate::headless::{HeadlessPlayerFactory, PlayerControls};

/// Help text, one line per command.
pub const HELP: &[&str] = &[
    "add <url|id>          add a video",
    "remove <n>            remove entry n",
    "clear                 remove every entry",
    "play <n>              play entry n",
    "play-all              play from the start of the list",
    "next | prev           skip forward or back",
    "stop                  stop playback",
    "mode [name]           show or set sequential | shuffle | single-loop",
    "rate [value]          show or set playback rate (0.5-2.0)",
    "skip on|off           auto-skip videos that refuse embedding",
    "open-ext [on|off]     open restricted videos externally now, or at end of list",
    "import <path>         import a text file, one URL per line",
    "export [dir]          export the list to a dated text file",
    "list                  show the playlist",
    "ready                 player callback: ready",
    "error <code>          player callback: error",
    "state <name|code> [s] player callback: state change, optional duration",
    "quit                  exit",
];

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a video.
    Add(String),
    /// Remove the entry at an index.
    Remove(usize),
    /// Empty the list.
    Clear,
    /// Play the entry at an index.
    Play(usize),
    /// Play from the start of a cycle.
    PlayAll,
    /// Skip forward.
    Next,
    /// Skip back.
    Previous,
    /// Stop playback.
    Stop,
    /// Show or set the play mode.
    Mode(Option<PlayMode>),
    /// Show or set the playback rate.
    Rate(Option<f64>),
    /// Toggle auto-skip of embed-restricted videos.
    AutoSkip(bool),
    /// Open restricted videos now, or toggle doing so at end of list.
    OpenExternally(Option<bool>),
    /// Import a text file.
    Import(PathBuf),
    /// Export to a dated text file.
    Export(Option<PathBuf>),
    /// Show the playlist.
    List,
    /// Simulated player ready callback.
    Ready,
    /// Simulated player error callback.
    PlayerError(i32),
    /// Simulated player state change.
    PlayerState {
        /// New state.
        state: PlayerState,
        /// Duration the player should report.
        duration: Option<f64>,
    },
    /// Show help.
    Help,
    /// Leave the shell.
    Quit,
}

/// Errors from parsing or running a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Unrecognized command name.
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),

    /// A required argument is missing.
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// An argument couldn't be parsed.
    #[error("Invalid {name}: {value}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// What was given.
        value: String,
    },

    /// The operation itself failed.
    #[error(transparent)]
    Core(#[from] tubeloop_core::Error),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, rest)| (name, rest.trim()));

        let command = match name.to_ascii_lowercase().as_str() {
            "add" => Self::Add(required(rest, "url or id")?.to_string()),
            "remove" | "rm" => Self::Remove(parse_position(rest)?),
            "clear" => Self::Clear,
            "play" => Self::Play(parse_position(rest)?),
            "play-all" => Self::PlayAll,
            "next" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "stop" => Self::Stop,
            "mode" => Self::Mode(optional(rest).map(str::parse).transpose()?),
            "rate" => Self::Rate(optional(rest).map(|v| parse_number(v, "rate")).transpose()?),
            "skip" => Self::AutoSkip(parse_switch(required(rest, "on|off")?)?),
            "open-ext" => Self::OpenExternally(optional(rest).map(parse_switch).transpose()?),
            "import" => Self::Import(PathBuf::from(required(rest, "path")?)),
            "export" => Self::Export(optional(rest).map(PathBuf::from)),
            "list" | "ls" => Self::List,
            "ready" => Self::Ready,
            "error" => {
                let code = required(rest, "error code")?;
                Self::PlayerError(parse_number(code, "error code")?)
            }
            "state" => {
                let mut args = rest.split_whitespace();
                let state = args.next().ok_or(CommandError::MissingArgument("state"))?;
                let state = PlayerState::parse(state);
                let duration = args.next().map(|v| parse_number(v, "duration")).transpose()?;
                Self::PlayerState { state, duration }
            }
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn optional(rest: &str) -> Option<&str> {
    Some(rest).filter(|r| !r.is_empty())
}

fn required<'a>(rest: &'a str, name: &'static str) -> Result<&'a str, CommandError> {
    optional(rest).ok_or(CommandError::MissingArgument(name))
}

fn parse_number<T: FromStr>(value: &str, name: &'static str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidArgument {
        name,
        value: value.to_string(),
    })
}

fn parse_position(rest: &str) -> Result<usize, CommandError> {
    let value = required(rest, "position")?;
    match parse_number::<usize>(value, "position")? {
        0 => Err(CommandError::InvalidArgument {
            name: "position",
            value: value.to_string(),
        }),
        position => Ok(position - 1),
    }
}

fn parse_switch(value: &str) -> Result<bool, CommandError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(CommandError::InvalidArgument {
            name: "switch",
            value: value.to_string(),
        }),
    }
}

/// An interactive session over a headless player.
#[derive(Debug)]
pub struct Shell {
    coordinator: PlaybackCoordinator,
    controls: PlayerControls,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    export_directory: PathBuf,
}

impl Shell {
    /// Restore a session from `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>, config: &AppConfig) -> Self {
        let controls = PlayerControls::new();
        let factory = HeadlessPlayerFactory::new(controls.clone());
        let (sender, events) = mpsc::unbounded_channel();

        let coordinator = PlaybackCoordinator::restore(storage, Box::new(factory))
            .with_player_settings(config.player.clone())
            .with_event_sender(sender);

        Self {
            coordinator,
            controls,
            events,
            export_directory: config.export_directory.clone(),
        }
    }

    /// The coordinator driving this session.
    pub const fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    /// Run one command and return the lines to print.
    pub async fn execute(&mut self, command: Command) -> Result<Vec<String>, CommandError> {
        debug!("Executing {:?}", command);
        let coordinator = &mut self.coordinator;

        let output = match command {
            Command::Add(text) => {
                let index = coordinator.add(&text)?;
                vec![format!("Added at position {}", index + 1)]
            }
            Command::Remove(index) => match coordinator.remove(index) {
                Some(_) => Vec::new(),
                None => vec![no_entry(index)],
            },
            Command::Clear => {
                if !coordinator.clear() {
                    return Ok(vec!["Playlist is already empty".to_string()]);
                }
                Vec::new()
            }
            Command::Play(index) => {
                if coordinator.play_at(index)? {
                    Vec::new()
                } else {
                    vec![no_entry(index)]
                }
            }
            Command::PlayAll => none_if_empty(coordinator.play_all()?),
            Command::Next => none_if_empty(coordinator.next()?),
            Command::Previous => none_if_empty(coordinator.previous()?),
            Command::Stop => {
                coordinator.stop();
                Vec::new()
            }
            Command::Mode(Some(mode)) => {
                coordinator.set_mode(mode);
                Vec::new()
            }
            Command::Mode(None) => vec![format!("Mode: {}", coordinator.mode())],
            Command::Rate(Some(rate)) => {
                coordinator.set_playback_rate(rate)?;
                Vec::new()
            }
            Command::Rate(None) => vec![format!("Rate: {}", coordinator.playback_rate())],
            Command::AutoSkip(enabled) => {
                coordinator.set_preferences(Preferences {
                    auto_skip_embed_restricted: enabled,
                    ..coordinator.preferences()
                });
                vec![format!("Auto-skip {}", on_off(enabled))]
            }
            Command::OpenExternally(Some(enabled)) => {
                coordinator.set_preferences(Preferences {
                    open_disabled_externally: enabled,
                    ..coordinator.preferences()
                });
                vec![format!("Open restricted videos at end of list {}", on_off(enabled))]
            }
            Command::OpenExternally(None) => {
                if coordinator.open_disabled_externally().is_none() {
                    vec!["No restricted videos".to_string()]
                } else {
                    Vec::new()
                }
            }
            Command::Import(path) => {
                let text = transfer::read_import_file(&path).await?;
                coordinator.import_text(&text);
                Vec::new()
            }
            Command::Export(directory) => {
                let lines = coordinator.export_lines();
                if lines.is_empty() {
                    return Ok(vec!["Playlist is empty".to_string()]);
                }
                let directory = directory.unwrap_or_else(|| self.export_directory.clone());
                let path = transfer::write_export_file(&directory, &lines).await?;
                vec![format!("Exported {} entries to {}", lines.len(), path.display())]
            }
            Command::List => self.list(),
            Command::Ready => {
                coordinator.handle_player_event(PlayerEvent::Ready)?;
                Vec::new()
            }
            Command::PlayerError(code) => {
                let code = PlayerErrorCode::from_code(code);
                coordinator.handle_player_event(PlayerEvent::Error(code))?;
                Vec::new()
            }
            Command::PlayerState { state, duration } => {
                if let Some(secs) = duration {
                    self.controls.set_duration(secs);
                }
                coordinator.handle_player_event(PlayerEvent::StateChanged(state))?;
                Vec::new()
            }
            Command::Help => HELP.iter().map(ToString::to_string).collect(),
            Command::Quit => Vec::new(),
        };

        let mut output = output;
        output.extend(self.drain_events());
        Ok(output)
    }

    /// Describe every event published since the last call.
    pub fn drain_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            lines.push(describe(&event));
        }
        lines
    }

    fn list(&self) -> Vec<String> {
        let coordinator = &self.coordinator;
        let mut lines = vec![format!(
            "{} entries, mode {}, rate {}",
            coordinator.playlist().len(),
            coordinator.mode(),
            coordinator.playback_rate()
        )];

        for (index, entry) in coordinator.playlist().entries().iter().enumerate() {
            let marker = if coordinator.current_index() == Some(index) {
                '>'
            } else {
                ' '
            };
            let duration = entry.formatted_duration().unwrap_or_else(|| "--:--".to_string());
            let restricted = if entry.embed_disabled {
                "  [external only]"
            } else {
                ""
            };
            lines.push(format!(
                "{marker}{:>3}. {} {:>8}  {}{restricted}",
                index + 1,
                entry.id,
                duration,
                entry.source_text
            ));
        }

        if let Some(entry) = coordinator.current_entry() {
            lines.push(format!("Watch on YouTube: {}", entry.watch_url()));
        }
        lines
    }
}

fn no_entry(index: usize) -> String {
    format!("No entry at position {}", index + 1)
}

fn none_if_empty(played: Option<usize>) -> Vec<String> {
    match played {
        Some(_) => Vec::new(),
        None => vec!["Playlist is empty".to_string()],
    }
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// One-line description of a session event.
pub fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::EntryAdded { index, id } => format!("+ {} {id}", index + 1),
        SessionEvent::EntryRemoved { index, id } => format!("- {} {id}", index + 1),
        SessionEvent::Cleared => "Playlist cleared".to_string(),
        SessionEvent::Imported { added, skipped } => {
            format!("Imported {added}, skipped {skipped}")
        }
        SessionEvent::NowPlaying { index, id } => format!("Now playing {}: {id}", index + 1),
        SessionEvent::Stopped => "Stopped".to_string(),
        SessionEvent::DurationLearned { index, secs } => format!(
            "Duration of {}: {}",
            index + 1,
            tubeloop_core::youtube::format_duration(*secs).unwrap_or_default()
        ),
        SessionEvent::EmbedRestricted { index, id } => {
            format!("{id} (position {}) can only be watched on YouTube", index + 1)
        }
        SessionEvent::OpenExternally { url } => format!("Open in browser: {url}"),
        SessionEvent::ModeChanged { mode } => format!("Mode: {mode}"),
        SessionEvent::RateChanged { rate } => format!("Rate: {rate}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tubeloop_core::MemoryStore;

    fn shell(export_directory: PathBuf) -> Shell {
        let config = AppConfig {
            data_directory: PathBuf::from("unused"),
            export_directory,
            player: tubeloop_core::config::PlayerSettings::default(),
        };
        Shell::new(Arc::new(MemoryStore::new()), &config)
    }

    async fn run(shell: &mut Shell, line: &str) -> Vec<String> {
        let command: Command = line.parse().expect("Should parse");
        shell.execute(command).await.expect("Should execute")
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "add https://youtu.be/dQw4w9WgXcQ".parse::<Command>().unwrap(),
            Command::Add("https://youtu.be/dQw4w9WgXcQ".to_string())
        );
        assert_eq!("play 3".parse::<Command>().unwrap(), Command::Play(2));
        assert_eq!("  NEXT ".parse::<Command>().unwrap(), Command::Next);
        assert_eq!(
            "mode shuffle".parse::<Command>().unwrap(),
            Command::Mode(Some(PlayMode::Shuffle))
        );
        assert_eq!("mode".parse::<Command>().unwrap(), Command::Mode(None));
        assert_eq!("rate 1.5".parse::<Command>().unwrap(), Command::Rate(Some(1.5)));
        assert_eq!("skip off".parse::<Command>().unwrap(), Command::AutoSkip(false));
        assert_eq!(
            "open-ext".parse::<Command>().unwrap(),
            Command::OpenExternally(None)
        );
        assert_eq!(
            "export".parse::<Command>().unwrap(),
            Command::Export(None)
        );
        assert_eq!("error 150".parse::<Command>().unwrap(), Command::PlayerError(150));
        assert_eq!(
            "state playing 212".parse::<Command>().unwrap(),
            Command::PlayerState {
                state: PlayerState::Playing,
                duration: Some(212.0)
            }
        );
        assert_eq!(
            "state 0".parse::<Command>().unwrap(),
            Command::PlayerState {
                state: PlayerState::Ended,
                duration: None
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "bogus".parse::<Command>(),
            Err(CommandError::Unknown(_))
        ));
        assert!(matches!(
            "add".parse::<Command>(),
            Err(CommandError::MissingArgument(_))
        ));
        assert!(matches!(
            "play 0".parse::<Command>(),
            Err(CommandError::InvalidArgument { .. })
        ));
        assert!(matches!(
            "play x".parse::<Command>(),
            Err(CommandError::InvalidArgument { .. })
        ));
        assert!(matches!(
            "mode loop".parse::<Command>(),
            Err(CommandError::Core(tubeloop_core::Error::InvalidPlayMode(_)))
        ));
        assert!(matches!(
            "skip maybe".parse::<Command>(),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_play_and_end_of_list() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let mut shell = shell(temp_dir.path().to_path_buf());

        assert_eq!(
            run(&mut shell, "add dQw4w9WgXcQ").await,
            vec!["Added at position 1", "+ 1 dQw4w9WgXcQ"]
        );
        run(&mut shell, "add https://youtu.be/9bZkp7q19f0").await;

        assert_eq!(run(&mut shell, "play 2").await, vec!["Now playing 2: 9bZkp7q19f0"]);
        run(&mut shell, "ready").await;
        assert_eq!(
            run(&mut shell, "state playing 95").await,
            vec!["Duration of 2: 1:35"]
        );
        assert_eq!(
            run(&mut shell, "state ended").await,
            vec!["Now playing 1: dQw4w9WgXcQ"]
        );

        let listing = run(&mut shell, "list").await;
        assert_eq!(listing[0], "2 entries, mode sequential, rate 1");
        assert!(listing[1].starts_with(">  1. dQw4w9WgXcQ"));
        assert!(listing[2].contains("1:35"));
        assert_eq!(
            listing.last().unwrap(),
            "Watch on YouTube: https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[tokio::test]
    async fn test_duplicate_is_reported() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let mut shell = shell(temp_dir.path().to_path_buf());
        run(&mut shell, "add dQw4w9WgXcQ").await;

        let err = shell
            .execute(Command::Add("https://www.youtube.com/embed/dQw4w9WgXcQ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Core(tubeloop_core::Error::DuplicateEntry(_))
        ));
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let mut source = shell(temp_dir.path().to_path_buf());
        assert_eq!(run(&mut source, "export").await, vec!["Playlist is empty"]);

        run(&mut source, "add dQw4w9WgXcQ").await;
        run(&mut source, "add 9bZkp7q19f0").await;
        let output = run(&mut source, "export").await;
        assert!(output[0].starts_with("Exported 2 entries to "));

        let exported = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();

        let mut target = shell(temp_dir.path().to_path_buf());
        run(&mut target, "add 9bZkp7q19f0").await;
        assert_eq!(
            run(&mut target, &format!("import {}", exported.display())).await,
            vec!["Imported 1, skipped 1"]
        );
        assert_eq!(target.coordinator().playlist().len(), 2);
    }

    #[tokio::test]
    async fn test_restricted_videos_opened_externally() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let mut shell = shell(temp_dir.path().to_path_buf());
        run(&mut shell, "add dQw4w9WgXcQ").await;
        run(&mut shell, "add 9bZkp7q19f0").await;
        assert_eq!(run(&mut shell, "open-ext").await, vec!["No restricted videos"]);

        run(&mut shell, "play 1").await;
        run(&mut shell, "ready").await;
        let output = run(&mut shell, "error 150").await;
        assert_eq!(
            output,
            vec![
                "dQw4w9WgXcQ (position 1) can only be watched on YouTube",
                "Now playing 2: 9bZkp7q19f0"
            ]
        );
        assert_eq!(
            run(&mut shell, "open-ext").await,
            vec!["Open in browser: https://www.youtube.com/watch_videos?video_ids=dQw4w9WgXcQ"]
        );
    }
}
