//! Main CLI parser and top-level argument handling.
//!
//! Connection and synthesis options are global so every subcommand accepts
//! them. Each also reads from a `PARLEY_*` environment variable; an explicit
//! flag wins over the environment.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Voice front end for an agent gateway.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Talk to an agent gateway")]
#[command(version)]
pub struct Cli {
    /// JSON settings file applied before environment and flags
    #[arg(long = "config", global = true, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Gateway host
    #[arg(long = "host", global = true, env = "PARLEY_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Gateway port
    #[arg(long = "port", global = true, env = "PARLEY_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Bearer token for the gateway handshake
    #[arg(
        long = "token",
        global = true,
        env = "PARLEY_GATEWAY_TOKEN",
        hide_env_values = true
    )]
    pub token: Option<String>,

    /// Agent session to address
    #[arg(long = "session-key", global = true, env = "PARLEY_SESSION_KEY")]
    pub session_key: Option<String>,

    /// Speech synthesis API key
    #[arg(
        long = "tts-api-key",
        global = true,
        env = "PARLEY_TTS_API_KEY",
        hide_env_values = true
    )]
    pub tts_api_key: Option<String>,

    /// Speech synthesis group id
    #[arg(long = "tts-group-id", global = true, env = "PARLEY_TTS_GROUP_ID")]
    pub tts_group_id: Option<String>,

    /// Speech synthesis model
    #[arg(long = "tts-model", global = true, env = "PARLEY_TTS_MODEL")]
    pub tts_model: Option<String>,

    /// Speech synthesis voice
    #[arg(long = "voice", global = true, env = "PARLEY_TTS_VOICE")]
    pub voice: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
