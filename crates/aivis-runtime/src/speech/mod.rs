//! Synthesis pipeline: cloud TTS call streamed into a local audio player.

mod client;
mod pipeline;
pub mod player;

pub use client::{BREAK_PREFIX, OUTPUT_FORMAT, SynthesisClient};
pub use pipeline::CloudSpeechPipeline;
pub use player::{PlayerCommand, available_players, find_player, player_candidates};
