//! Top-level parser and global options.

use clap::Parser;

use aivis_core::ConfigOverrides;

use crate::commands::{Commands, SpeakArgs};

/// Aivis Cloud text-to-speech for MCP clients.
///
/// Without a subcommand the MCP server runs on stdio.
#[derive(Debug, Parser)]
#[command(name = "aivis-mcp")]
#[command(version)]
#[command(about = "Aivis Cloud text-to-speech MCP server and CLI")]
pub struct Cli {
    /// Verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Aivis Cloud API key (overrides AIVIS_API_KEY and the settings file)
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,

    /// Aivis Cloud API base URL
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Redis URL of the coordination store
    #[arg(long = "redis-url", global = true)]
    pub redis_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Configuration overrides from the global flags and, for `speak`, the
    /// prosody flags.
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
            redis_url: self.redis_url.clone(),
            debug: self.debug,
            ..ConfigOverrides::default()
        };
        if let Some(Commands::Speak(args)) = &self.command {
            apply_speak_overrides(&mut overrides, args);
        }
        overrides
    }
}

fn apply_speak_overrides(overrides: &mut ConfigOverrides, args: &SpeakArgs) {
    let prosody = &args.prosody;
    overrides.model_uuid.clone_from(&args.model);
    overrides.style_id = prosody.style_id;
    overrides.style_name.clone_from(&prosody.style_name);
    overrides.speaking_rate = prosody.speaking_rate;
    overrides.emotional_intensity = prosody.emotional_intensity;
    overrides.tempo_dynamics = prosody.tempo_dynamics;
    overrides.pitch = prosody.pitch;
    overrides.volume = prosody.volume;
    overrides.leading_silence_seconds = prosody.leading_silence;
    overrides.trailing_silence_seconds = prosody.trailing_silence;
    overrides.line_break_silence_seconds = prosody.line_break_silence;
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_is_accepted() {
        let cli = Cli::parse_from(["aivis-mcp"]);
        assert!(cli.command.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn global_flags_become_overrides() {
        let cli = Cli::parse_from([
            "aivis-mcp",
            "health",
            "--debug",
            "--redis-url",
            "redis://example:6380",
            "--api-key",
            "k",
        ]);
        let overrides = cli.overrides();
        assert!(overrides.debug);
        assert_eq!(overrides.redis_url.as_deref(), Some("redis://example:6380"));
        assert_eq!(overrides.api_key.as_deref(), Some("k"));
        assert!(overrides.pitch.is_none());
    }

    #[test]
    fn speak_flags_become_overrides() {
        let cli = Cli::parse_from([
            "aivis-mcp",
            "speak",
            "hello",
            "--model",
            "m-1",
            "--pitch",
            "0.3",
            "--speaking-rate",
            "1.5",
            "--style-id",
            "2",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.model_uuid.as_deref(), Some("m-1"));
        assert_eq!(overrides.pitch, Some(0.3));
        assert_eq!(overrides.speaking_rate, Some(1.5));
        assert_eq!(overrides.style_id, Some(2));
    }
}
