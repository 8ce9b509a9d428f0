//! MiniMax hosted TTS backend.
//!
//! One sentence per request: the reply carries the whole clip hex-encoded in
//! `data.audio`, so there is no streaming to manage.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use parley_core::{SpeechSynthesizer, SynthesisError, SynthesisSettings, truncate_for_log};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    model: &'a str,
    text: &'a str,
    stream: bool,
    voice_setting: VoiceSetting<'a>,
    audio_setting: AudioSetting,
    language_boost: &'a str,
}

#[derive(Debug, Serialize)]
struct VoiceSetting<'a> {
    voice_id: &'a str,
    speed: f32,
    vol: f32,
    pitch: i32,
}

#[derive(Debug, Serialize)]
struct AudioSetting {
    sample_rate: u32,
    format: &'static str,
    bitrate: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    data: Option<AudioData>,
    #[serde(default)]
    base_resp: Option<BaseResp>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioData {
    #[serde(default)]
    audio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BaseResp {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

// ── Backend ────────────────────────────────────────────────────────

/// [`SpeechSynthesizer`] backed by the MiniMax `t2a_v2` endpoint.
pub struct MiniMaxSynthesizer {
    client: reqwest::Client,
    settings: SynthesisSettings,
    voice: Mutex<String>,
}

impl MiniMaxSynthesizer {
    pub fn new(settings: SynthesisSettings) -> Self {
        let voice = Mutex::new(settings.voice.clone());
        Self {
            client: reqwest::Client::new(),
            settings,
            voice,
        }
    }

    /// Endpoint URL including the group query parameter.
    fn url(&self) -> String {
        format!("{}?GroupId={}", self.settings.endpoint, self.settings.group_id)
    }

    fn request_body<'a>(&'a self, text: &'a str, voice_id: &'a str) -> SynthesisRequest<'a> {
        SynthesisRequest {
            model: &self.settings.model,
            text,
            stream: false,
            voice_setting: VoiceSetting {
                voice_id,
                speed: self.settings.speed,
                vol: 1.0,
                pitch: 0,
            },
            audio_setting: AudioSetting {
                sample_rate: self.settings.sample_rate,
                format: "mp3",
                bitrate: 128_000,
            },
            language_boost: &self.settings.language_boost,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MiniMaxSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        if !self.settings.is_configured() {
            return Err(SynthesisError::NotConfigured(
                "API key and group id are required".to_string(),
            ));
        }

        let voice_id = self.voice();
        tracing::debug!(voice = %voice_id, text = %truncate_for_log(text, 30), "Requesting synthesis");

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.settings.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&self.request_body(text, &voice_id))
            .send()
            .await
            .map_err(|e| SynthesisError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SynthesisError::Backend(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(SynthesisError::Backend(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&body, 200)
            )));
        }

        let audio = decode_response(&body, self.settings.min_audio_bytes)?;
        tracing::debug!(bytes = audio.len(), "Synthesis complete");
        Ok(audio)
    }

    fn set_voice(&self, voice_id: &str) {
        *self.voice.lock() = voice_id.to_string();
    }

    fn voice(&self) -> String {
        self.voice.lock().clone()
    }
}

/// Extract the audio clip from a successful HTTP body.
fn decode_response(body: &str, min_audio_bytes: usize) -> Result<Vec<u8>, SynthesisError> {
    let parsed: SynthesisResponse = serde_json::from_str(body)
        .map_err(|e| SynthesisError::Backend(format!("invalid response: {e}")))?;

    if let Some(base) = parsed.base_resp {
        if base.status_code != 0 {
            return Err(SynthesisError::Backend(base.status_msg));
        }
    }

    let hex_audio = parsed
        .data
        .and_then(|data| data.audio)
        .ok_or_else(|| SynthesisError::Backend("response contained no audio".to_string()))?;
    let audio = hex::decode(hex_audio.trim())
        .map_err(|e| SynthesisError::Backend(format!("audio is not valid hex: {e}")))?;

    if audio.len() < min_audio_bytes {
        return Err(SynthesisError::Backend(format!(
            "audio too short ({} bytes)",
            audio.len()
        )));
    }
    Ok(audio)
}
