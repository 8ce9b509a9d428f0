//! Settings resolution for the binary.
//!
//! Layers, later wins: built-in defaults, the optional JSON settings file,
//! then `PARLEY_*` environment variables and command-line flags (merged by
//! clap). The result is validated before anything is built from it.

use std::path::Path;

use parley_core::{Settings, validate_settings};

use crate::error::CliError;
use crate::parser::Cli;

/// Resolve and validate the settings for this invocation.
pub fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = match &cli.config {
        Some(path) => read_settings_file(path)?,
        None => Settings::default(),
    };
    apply_overrides(&mut settings, cli);
    validate_settings(&settings)?;
    Ok(settings)
}

pub fn read_settings_file(path: &Path) -> Result<Settings, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse_settings(&raw)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))
}

/// Parse a (possibly partial) JSON settings document.
pub fn parse_settings(raw: &str) -> Result<Settings, serde_json::Error> {
    serde_json::from_str(raw)
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    let gateway = &mut settings.gateway;
    if let Some(host) = &cli.host {
        gateway.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        gateway.port = port;
    }
    if let Some(token) = &cli.token {
        gateway.token.clone_from(token);
    }
    if let Some(session_key) = &cli.session_key {
        gateway.session_key.clone_from(session_key);
    }

    let synthesis = &mut settings.synthesis;
    if let Some(api_key) = &cli.tts_api_key {
        synthesis.api_key.clone_from(api_key);
    }
    if let Some(group_id) = &cli.tts_group_id {
        synthesis.group_id.clone_from(group_id);
    }
    if let Some(model) = &cli.tts_model {
        synthesis.model.clone_from(model);
    }
    if let Some(voice) = &cli.voice {
        synthesis.voice.clone_from(voice);
    }
}
