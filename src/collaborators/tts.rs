//! Google Cloud Text-to-Speech adapter.
//!
//! Requests `LINEAR16` output so every segment comes back as a 16-bit PCM
//! WAV file that the assembler can concatenate sample-exactly. Synthesis is
//! not retried here: a failed segment is fatal to the audio stage and the
//! caller decides whether to try again.

use crate::collaborators::{SpeechSynthesizer, SynthesisRequest};
use crate::error::{CollaboratorError, NarratorError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Public REST endpoint for `text:synthesize`.
pub const GOOGLE_TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

const COLLABORATOR: &str = "speech synthesizer";

/// Largest `input.text` the endpoint accepts, in UTF-8 bytes.
pub const MAX_REQUEST_BYTES: usize = 5000;

/// HTTP client for Google Cloud Text-to-Speech.
pub struct GoogleTtsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for GoogleTtsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTtsClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GoogleTtsClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, NarratorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NarratorError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: GOOGLE_TTS_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    /// Read the key from `GOOGLE_TTS_API_KEY`, falling back to `GOOGLE_API_KEY`.
    pub fn from_env(timeout_secs: u64) -> Result<Self, NarratorError> {
        let key = ["GOOGLE_TTS_API_KEY", "GOOGLE_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty())
            .ok_or_else(|| NarratorError::ProviderNotConfigured {
                provider: "google-tts".to_string(),
                hint: "Set GOOGLE_TTS_API_KEY (or GOOGLE_API_KEY) to a key with the \
Cloud Text-to-Speech API enabled."
                    .to_string(),
            })?;
        Self::new(key, timeout_secs)
    }

    /// Point the client at another endpoint (proxies, regional hosts).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

fn request_body(request: &SynthesisRequest) -> SynthesizeBody<'_> {
    SynthesizeBody {
        input: TextInput {
            text: &request.text,
        },
        voice: VoiceSelection {
            language_code: &request.voice.language_code,
            ssml_gender: request.voice.gender.as_str(),
        },
        audio_config: AudioConfig {
            audio_encoding: "LINEAR16",
        },
    }
}

/// Decode a `text:synthesize` response body into audio bytes.
fn decode_audio_content(body: &str) -> Result<Vec<u8>, CollaboratorError> {
    let parsed: SynthesizeResponse =
        serde_json::from_str(body).map_err(|e| CollaboratorError::Decode {
            collaborator: COLLABORATOR,
            detail: e.to_string(),
        })?;
    if parsed.audio_content.is_empty() {
        return Err(CollaboratorError::EmptyResponse {
            collaborator: COLLABORATOR,
        });
    }
    STANDARD
        .decode(parsed.audio_content.as_bytes())
        .map_err(|e| CollaboratorError::Decode {
            collaborator: COLLABORATOR,
            detail: format!("audioContent is not base64: {e}"),
        })
}

/// Reject text the endpoint would refuse, before spending a request on it.
fn check_request_size(text: &str) -> Result<(), CollaboratorError> {
    if text.len() > MAX_REQUEST_BYTES {
        return Err(CollaboratorError::RequestFailed {
            collaborator: COLLABORATOR,
            retries: 0,
            detail: format!(
                "segment is {} bytes ({} chars), over the {} byte request limit; lower max_chunk_chars",
                text.len(),
                text.chars().count(),
                MAX_REQUEST_BYTES
            ),
        });
    }
    Ok(())
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, CollaboratorError> {
        check_request_size(&request.text)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout {
                        collaborator: COLLABORATOR,
                        secs: self.timeout_secs,
                    }
                } else {
                    CollaboratorError::RequestFailed {
                        collaborator: COLLABORATOR,
                        retries: 0,
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::RequestFailed {
                collaborator: COLLABORATOR,
                retries: 0,
                detail: e.to_string(),
            })?;

        if !status.is_success() {
            let snippet: String = body.chars().take(300).collect();
            return Err(CollaboratorError::RequestFailed {
                collaborator: COLLABORATOR,
                retries: 0,
                detail: format!("HTTP {status}: {snippet}"),
            });
        }

        let audio = decode_audio_content(&body)?;
        debug!(
            "Synthesised {} chars → {} bytes",
            request.text.chars().count(),
            audio.len()
        );
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VoiceGender, VoiceParams};

    #[test]
    fn body_uses_camel_case_wire_names() {
        let req = SynthesisRequest {
            text: "Hello there.".into(),
            voice: VoiceParams::new(VoiceGender::Female, "en-GB"),
        };
        let json = serde_json::to_value(request_body(&req)).unwrap();
        assert_eq!(json["input"]["text"], "Hello there.");
        assert_eq!(json["voice"]["languageCode"], "en-GB");
        assert_eq!(json["voice"]["ssmlGender"], "FEMALE");
        assert_eq!(json["audioConfig"]["audioEncoding"], "LINEAR16");
    }

    #[test]
    fn request_size_counts_bytes() {
        assert!(check_request_size(&"a".repeat(MAX_REQUEST_BYTES)).is_ok());
        // 2 000 characters, 6 000 bytes.
        let cjk = "語".repeat(2000);
        match check_request_size(&cjk) {
            Err(CollaboratorError::RequestFailed { detail, .. }) => {
                assert!(detail.contains("6000 bytes (2000 chars)"), "{detail}");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[test]
    fn oversized_segment_fails_without_network() {
        let client = GoogleTtsClient::new("k", 5).unwrap();
        let req = SynthesisRequest {
            text: "é".repeat(MAX_REQUEST_BYTES),
            voice: VoiceParams::new(VoiceGender::Male, "fr-FR"),
        };
        let err = tokio_test::block_on(client.synthesize(&req)).unwrap_err();
        assert!(matches!(err, CollaboratorError::RequestFailed { retries: 0, .. }));
    }

    #[test]
    fn decodes_audio_content() {
        let body = format!(r#"{{"audioContent":"{}"}}"#, STANDARD.encode(b"RIFFdata"));
        assert_eq!(decode_audio_content(&body).unwrap(), b"RIFFdata");
    }

    #[test]
    fn missing_audio_is_empty_response() {
        assert!(matches!(
            decode_audio_content("{}"),
            Err(CollaboratorError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            decode_audio_content(r#"{"audioContent":"@@@"}"#),
            Err(CollaboratorError::Decode { .. })
        ));
        assert!(matches!(
            decode_audio_content("not json"),
            Err(CollaboratorError::Decode { .. })
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let client = GoogleTtsClient::new("secret-key", 5).unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
    }
}
