//! Subcommands.

use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Queue text for playback
    Speak(SpeakArgs),

    /// Show store, worker, queue and player status
    Health,

    /// Stop our processes, clear all coordination keys and start a fresh worker
    Reset,

    /// Check external dependencies
    Doctor,

    /// Save the API key and default model to the settings file
    Init,

    /// Show the settings, log and lock file locations
    Paths,

    /// Run the MCP server on stdio (default)
    Mcp,

    /// Run the queue worker
    #[command(hide = true)]
    Worker,
}

#[derive(Debug, Args)]
pub struct SpeakArgs {
    /// Text to speak; multiple words are joined with spaces
    #[arg(required = true)]
    pub text: Vec<String>,

    /// Voice model UUID
    #[arg(long)]
    pub model: Option<String>,

    /// Delay before synthesis, in milliseconds (0-60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub wait: Option<u64>,

    /// Wait until playback has finished
    #[arg(long)]
    pub sync: bool,

    /// Seconds to wait with --sync
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    #[command(flatten)]
    pub prosody: ProsodyArgs,
}

impl SpeakArgs {
    pub fn joined_text(&self) -> String {
        self.text.join(" ")
    }
}

/// Voice shaping; each falls back to its `AIVIS_*` variable.
#[derive(Debug, Default, Args)]
pub struct ProsodyArgs {
    /// Style ID (0-31)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=31))]
    pub style_id: Option<u32>,

    /// Style name
    #[arg(long)]
    pub style_name: Option<String>,

    /// Speaking rate (0.5-2.0)
    #[arg(long)]
    pub speaking_rate: Option<f64>,

    /// Emotional intensity (0.0-2.0)
    #[arg(long)]
    pub emotional_intensity: Option<f64>,

    /// Tempo dynamics (0.0-2.0)
    #[arg(long)]
    pub tempo_dynamics: Option<f64>,

    /// Pitch (-1.0-1.0)
    #[arg(long, allow_negative_numbers = true)]
    pub pitch: Option<f64>,

    /// Volume (0.0-2.0)
    #[arg(long)]
    pub volume: Option<f64>,

    /// Silence before the speech, in seconds
    #[arg(long)]
    pub leading_silence: Option<f64>,

    /// Silence after the speech, in seconds
    #[arg(long)]
    pub trailing_silence: Option<f64>,

    /// Silence at line breaks, in seconds
    #[arg(long)]
    pub line_break_silence: Option<f64>,
}

#[cfg(test)]
mod tests {
    use crate::parser::Cli;
    use clap::Parser;

    use super::*;

    fn speak(args: &[&str]) -> SpeakArgs {
        let argv = ["aivis-mcp", "speak"].into_iter().chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Speak(speak)) => speak,
            other => panic!("expected speak, got {other:?}"),
        }
    }

    #[test]
    fn words_are_joined() {
        let args = speak(&["hello", "there"]);
        assert_eq!(args.joined_text(), "hello there");
        assert!(!args.sync);
        assert_eq!(args.timeout, 60);
    }

    #[test]
    fn negative_pitch_is_a_value() {
        let args = speak(&["hi", "--pitch", "-0.5"]);
        assert_eq!(args.prosody.pitch, Some(-0.5));
    }

    #[test]
    fn wait_is_range_checked() {
        assert_eq!(speak(&["hi", "--wait", "500"]).wait, Some(500));
        assert!(Cli::try_parse_from(["aivis-mcp", "speak", "hi", "--wait", "60001"]).is_err());
        assert!(Cli::try_parse_from(["aivis-mcp", "speak", "hi", "--style-id", "32"]).is_err());
    }

    #[test]
    fn text_is_required() {
        assert!(Cli::try_parse_from(["aivis-mcp", "speak"]).is_err());
    }

    #[test]
    fn sync_with_timeout() {
        let args = speak(&["hi", "--sync", "--timeout", "5"]);
        assert!(args.sync);
        assert_eq!(args.timeout, 5);
    }

    #[test]
    fn worker_is_hidden_but_parses() {
        let cli = Cli::try_parse_from(["aivis-mcp", "worker"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Worker)));
    }
}
