//! Audio player discovery and playback.
//!
//! Streaming players read the mp3 from stdin. When none is installed, the
//! platform's stock player (`afplay` on macOS, `cmd /c start` on Windows)
//! plays a buffered temp file instead.

use std::fmt::Display;
use std::path::PathBuf;
use std::process::Stdio;

use aivis_core::SpeechError;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Players tried in order on this platform.
pub const fn player_candidates() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["ffplay", "mpv"]
    } else if cfg!(target_os = "windows") {
        &["ffplay.exe", "mpv.exe"]
    } else {
        &["ffplay", "mpv", "mplayer", "play"]
    }
}

/// Arguments that make `player` read an mp3 stream from stdin.
fn stdin_args(player: &str) -> &'static [&'static str] {
    match player.trim_end_matches(".exe") {
        "ffplay" => &[
            "-f", "mp3", "-nodisp", "-autoexit", "-loglevel", "quiet", "-volume", "100", "-i", "-",
        ],
        "mpv" => &[
            "--no-video",
            "--really-quiet",
            "--demuxer-lavf-o=fflags=+nobuffer",
            "--audio-buffer=1",
            "--cache=yes",
            "--cache-secs=1",
            "--demuxer-readahead-secs=1",
            "-",
        ],
        _ => &["-"],
    }
}

/// How the player receives audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerInput {
    /// mp3 piped to stdin as it arrives.
    Stdin,
    /// Whole response written to a temp `.mp3` whose path is appended to `args`.
    File,
}

/// A resolved player binary and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub input: PlayerInput,
}

impl PlayerCommand {
    pub fn new(name: &str, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            program: program.into(),
            args: stdin_args(name).iter().map(ToString::to_string).collect(),
            input: PlayerInput::Stdin,
        }
    }

    /// A player that takes a file path as its last argument.
    pub fn file(name: &str, program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
            input: PlayerInput::File,
        }
    }

    /// Feed `audio` to the player and wait for it to exit.
    ///
    /// Returns the number of bytes delivered. The player is killed if this
    /// future is dropped before completion.
    pub async fn play<S, B, E>(&self, audio: S) -> Result<u64, SpeechError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        match self.input {
            PlayerInput::Stdin => self.play_stdin(audio).await,
            PlayerInput::File => self.play_file(audio).await,
        }
    }

    async fn play_file<S, B, E>(&self, mut audio: S) -> Result<u64, SpeechError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        let temp = tempfile::Builder::new()
            .prefix("aivis-speech-")
            .suffix(".mp3")
            .tempfile()?;
        let mut file = tokio::fs::File::from_std(temp.reopen()?);

        let mut written: u64 = 0;
        while let Some(chunk) = audio.next().await {
            let chunk = chunk.map_err(|e| SpeechError::Transport(e.to_string()))?;
            let bytes = chunk.as_ref();
            file.write_all(bytes).await?;
            written += bytes.len() as u64;
        }
        file.flush().await?;
        drop(file);

        // `temp` stays alive until the player exits.
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(temp.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| SpeechError::Player(format!("failed to start {}: {e}", self.name)))?;

        debug!(player = %self.name, written, %status, "Player exited");
        if status.success() {
            Ok(written)
        } else {
            Err(SpeechError::Player(format!("{} exited with {status}", self.name)))
        }
    }

    async fn play_stdin<S, B, E>(&self, mut audio: S) -> Result<u64, SpeechError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Player(format!("failed to start {}: {e}", self.name)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpeechError::Player("player stdin unavailable".to_string()))?;

        let mut written: u64 = 0;
        while let Some(chunk) = audio.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(SpeechError::Transport(e.to_string()));
                }
            };
            let bytes = chunk.as_ref();
            match stdin.write_all(bytes).await {
                Ok(()) => written += bytes.len() as u64,
                // The player quit early (e.g. closed its input); let its
                // exit status decide.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => break,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(SpeechError::Io(e));
                }
            }
        }
        drop(stdin);

        let status = child.wait().await?;
        debug!(player = %self.name, written, %status, "Player exited");
        if status.success() {
            Ok(written)
        } else {
            Err(SpeechError::Player(format!("{} exited with {status}", self.name)))
        }
    }
}

/// The stock file player for `os`, if it has one.
pub fn fallback_player(os: &str) -> Option<PlayerCommand> {
    match os {
        "macos" => Some(PlayerCommand::file("afplay", "afplay", &[])),
        // `/wait` keeps the temp file alive until the default app returns.
        "windows" => Some(PlayerCommand::file("cmd", "cmd", &["/c", "start", "", "/wait"])),
        _ => None,
    }
}

fn installed_fallback() -> Option<PlayerCommand> {
    let mut player = fallback_player(std::env::consts::OS)?;
    player.program = which::which(&player.program).ok()?;
    Some(player)
}

/// First available streaming player on `PATH`, else the stock file player.
pub fn find_player() -> Result<PlayerCommand, SpeechError> {
    player_candidates()
        .iter()
        .find_map(|name| which::which(name).ok().map(|path| PlayerCommand::new(name, path)))
        .or_else(installed_fallback)
        .ok_or_else(|| {
            let mut tried: Vec<String> = player_candidates().iter().map(ToString::to_string).collect();
            tried.extend(fallback_player(std::env::consts::OS).map(|player| player.name));
            SpeechError::PlayerNotFound {
                tried: tried.join(", "),
            }
        })
}

/// Every player found on `PATH`, in preference order.
pub fn available_players() -> Vec<String> {
    player_candidates()
        .iter()
        .filter(|name| which::which(name).is_ok())
        .map(ToString::to_string)
        .chain(installed_fallback().map(|player| player.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn ffplay_and_mpv_read_stdin() {
        let ffplay = PlayerCommand::new("ffplay", "/usr/bin/ffplay");
        assert_eq!(ffplay.args.first().map(String::as_str), Some("-f"));
        assert_eq!(ffplay.args.last().map(String::as_str), Some("-"));

        let mpv = PlayerCommand::new("mpv.exe", "mpv.exe");
        assert!(mpv.args.iter().any(|a| a == "--no-video"));

        let other = PlayerCommand::new("play", "/usr/bin/play");
        assert_eq!(other.args, ["-"]);
    }

    #[test]
    fn candidates_are_platform_specific() {
        assert!(!player_candidates().is_empty());
        assert!(player_candidates()[0].starts_with("ffplay"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_into_a_stdin_consumer() {
        // `cat` with no args copies stdin to (our null) stdout and exits 0.
        let player = PlayerCommand {
            name: "cat".to_string(),
            program: PathBuf::from("cat"),
            args: Vec::new(),
            input: PlayerInput::Stdin,
        };
        let chunks: Vec<Result<&[u8], std::io::Error>> = vec![Ok(&b"abc"[..]), Ok(&b"de"[..])];

        let written = player.play(stream::iter(chunks)).await.unwrap();
        assert_eq!(written, 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_player_is_reported() {
        let player = PlayerCommand {
            name: "false".to_string(),
            program: PathBuf::from("false"),
            args: Vec::new(),
            input: PlayerInput::Stdin,
        };
        let chunks: Vec<Result<&[u8], std::io::Error>> = Vec::new();

        let err = player.play(stream::iter(chunks)).await.unwrap_err();
        assert!(matches!(err, SpeechError::Player(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_player_error() {
        let player = PlayerCommand::new("ffplay", "/nonexistent/aivis-test-player");
        let chunks: Vec<Result<&[u8], std::io::Error>> = Vec::new();

        let err = player.play(stream::iter(chunks)).await.unwrap_err();
        assert!(matches!(err, SpeechError::Player(_)));
    }

    #[test]
    fn stock_players_take_a_file() {
        let afplay = fallback_player("macos").unwrap();
        assert_eq!(afplay.name, "afplay");
        assert_eq!(afplay.input, PlayerInput::File);
        assert!(afplay.args.is_empty());

        let start = fallback_player("windows").unwrap();
        assert_eq!(start.program, PathBuf::from("cmd"));
        assert_eq!(start.args, ["/c", "start", "", "/wait"]);

        assert!(fallback_player("linux").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_player_gets_the_buffered_audio() {
        // `test -s <path>` succeeds only when the temp file is non-empty.
        let player = PlayerCommand::file("test", "test", &["-s"]);
        let chunks: Vec<Result<&[u8], std::io::Error>> = vec![Ok(&b"ID3"[..]), Ok(&b"\xff\xfb"[..])];

        let written = player.play(stream::iter(chunks)).await.unwrap();
        assert_eq!(written, 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_player_sees_an_empty_file_without_audio() {
        let player = PlayerCommand::file("test", "test", &["-s"]);
        let chunks: Vec<Result<&[u8], std::io::Error>> = Vec::new();

        let err = player.play(stream::iter(chunks)).await.unwrap_err();
        assert!(matches!(err, SpeechError::Player(_)));
    }
}
