//! Transform request/response protocol.
//!
//! A request moves through `Received → Validating → Computing → Responding`.
//! Every outcome, including invalid input, is a [`TransformResponse`] tagged
//! with the originating request id; nothing is thrown back at the caller.
//!
//! Wire format (JSON, camelCase):
//!
//! ```text
//! → {"type":"generate","audioData":[...],"width":800,"height":200,
//!    "sampleRate":44100,"requestId":"r1","kind":"both"}
//! ← {"type":"success","requestId":"r1","waveformData":[...],"spectrogramData":[[...]]}
//! ← {"type":"error","requestId":"r1","error":"width must be positive"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::fft::{FrequencyTransform, DEFAULT_FFT_SIZE};
use crate::spectrum;
use crate::waveform;

/// What a transform request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Waveform,
    Spectrogram,
    Both,
}

impl TransformKind {
    fn wants_waveform(self) -> bool {
        matches!(self, TransformKind::Waveform | TransformKind::Both)
    }

    fn wants_spectrogram(self) -> bool {
        matches!(self, TransformKind::Spectrogram | TransformKind::Both)
    }
}

/// Incoming wire message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestMessage {
    #[serde(rename_all = "camelCase")]
    Generate {
        #[serde(default)]
        request_id: String,
        #[serde(default)]
        audio_data: Vec<f32>,
        #[serde(default)]
        width: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<i64>,
        #[serde(default)]
        sample_rate: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<TransformKind>,
    },
}

/// A single transform request. Immutable once issued.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    /// Correlation id echoed in the response
    pub request_id: String,
    /// Requested output; `None` means the waveform, plus the spectrogram when
    /// a height is given
    pub kind: Option<TransformKind>,
    /// Mono samples
    pub samples: Vec<f32>,
    /// Output width (columns)
    pub width: i64,
    /// Output height (spectrogram rows)
    pub height: Option<i64>,
    /// Sample rate in Hz
    pub sample_rate: f64,
}

impl TransformRequest {
    /// Waveform-only request.
    pub fn waveform(
        request_id: impl Into<String>,
        samples: Vec<f32>,
        width: i64,
        sample_rate: f64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            kind: Some(TransformKind::Waveform),
            samples,
            width,
            height: None,
            sample_rate,
        }
    }

    /// Spectrogram-only request.
    pub fn spectrogram(
        request_id: impl Into<String>,
        samples: Vec<f32>,
        width: i64,
        height: i64,
        sample_rate: f64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            kind: Some(TransformKind::Spectrogram),
            samples,
            width,
            height: Some(height),
            sample_rate,
        }
    }

    /// The effective kind after applying the default rule.
    pub fn effective_kind(&self) -> TransformKind {
        match (self.kind, self.height) {
            (Some(kind), _) => kind,
            (None, Some(_)) => TransformKind::Both,
            (None, None) => TransformKind::Waveform,
        }
    }
}

impl From<RequestMessage> for TransformRequest {
    fn from(message: RequestMessage) -> Self {
        match message {
            RequestMessage::Generate {
                request_id,
                audio_data,
                width,
                height,
                sample_rate,
                kind,
            } => Self {
                request_id,
                kind,
                samples: audio_data,
                width,
                height,
                sample_rate,
            },
        }
    }
}

impl From<TransformRequest> for RequestMessage {
    fn from(request: TransformRequest) -> Self {
        RequestMessage::Generate {
            request_id: request.request_id,
            audio_data: request.samples,
            width: request.width,
            height: request.height,
            sample_rate: request.sample_rate,
            kind: request.kind,
        }
    }
}

/// Outgoing wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformResponse {
    #[serde(rename_all = "camelCase")]
    Success {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        waveform_data: Option<Vec<f32>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spectrogram_data: Option<Vec<Vec<f32>>>,
    },
    #[serde(rename_all = "camelCase")]
    Error { request_id: String, error: String },
}

impl TransformResponse {
    /// Correlation id of the request this answers.
    pub fn request_id(&self) -> &str {
        match self {
            TransformResponse::Success { request_id, .. } => request_id,
            TransformResponse::Error { request_id, .. } => request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransformResponse::Success { .. })
    }

    fn error(request_id: &str, error: impl Into<String>) -> Self {
        TransformResponse::Error {
            request_id: request_id.to_string(),
            error: error.into(),
        }
    }
}

/// Processing stage of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Computing,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validating => "validating",
            Stage::Computing => "computing",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// Validated dimensions of a request.
struct Plan {
    kind: TransformKind,
    width: usize,
    height: usize,
    sample_rate: f32,
}

/// Stateless request processor. Cheap to clone; one per worker lane.
#[derive(Debug, Clone)]
pub struct TransformProcessor {
    fft_size: usize,
}

impl Default for TransformProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_FFT_SIZE)
    }
}

impl TransformProcessor {
    pub fn new(fft_size: usize) -> Self {
        Self { fft_size }
    }

    /// Run one request to completion.
    pub fn process(&self, request: &TransformRequest) -> TransformResponse {
        let id = request.request_id.as_str();
        debug!(request_id = id, stage = %Stage::Received, samples = request.samples.len());

        debug!(request_id = id, stage = %Stage::Validating);
        let plan = match validate(request) {
            Ok(plan) => plan,
            Err(reason) => {
                warn!(request_id = id, reason, "Rejected transform request");
                debug!(request_id = id, stage = %Stage::Responding, success = false);
                return TransformResponse::error(id, reason);
            }
        };

        debug!(request_id = id, stage = %Stage::Computing, kind = ?plan.kind, width = plan.width, height = plan.height);
        let waveform_data = plan
            .kind
            .wants_waveform()
            .then(|| waveform::waveform(&request.samples, plan.width));

        let spectrogram_data = plan.kind.wants_spectrogram().then(|| {
            let transform = FrequencyTransform::new(self.fft_size);
            spectrum::spectrogram(
                &request.samples,
                plan.sample_rate,
                plan.width,
                plan.height,
                &transform,
            )
        });

        debug!(request_id = id, stage = %Stage::Responding, success = true);
        TransformResponse::Success {
            request_id: request.request_id.clone(),
            waveform_data,
            spectrogram_data,
        }
    }

    /// Handle one JSON wire message and return the JSON response.
    pub fn handle_message(&self, message: &str) -> String {
        let response = match decode_request(message) {
            Ok(request) => self.process(&request),
            Err(rejection) => rejection,
        };
        encode_response(&response)
    }
}

/// Parse a JSON wire message.
///
/// A message that cannot be parsed becomes an error response carrying
/// whatever `requestId` could be recovered from it.
pub fn decode_request(message: &str) -> Result<TransformRequest, TransformResponse> {
    serde_json::from_str::<RequestMessage>(message)
        .map(TransformRequest::from)
        .map_err(|e| {
            warn!(error = %e, "Malformed transform message");
            TransformResponse::error(
                &recover_request_id(message),
                format!("malformed request: {}", e),
            )
        })
}

/// Serialize a response for the wire.
pub fn encode_response(response: &TransformResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        format!(
            r#"{{"type":"error","requestId":{},"error":"failed to encode response"}}"#,
            serde_json::Value::String(response.request_id().to_string())
        )
    })
}

/// Best-effort extraction of `requestId` from a message that failed to parse.
fn recover_request_id(message: &str) -> String {
    serde_json::from_str::<serde_json::Value>(message)
        .ok()
        .and_then(|v| v.get("requestId").and_then(|id| id.as_str()).map(str::to_string))
        .unwrap_or_default()
}

fn validate(request: &TransformRequest) -> Result<Plan, &'static str> {
    if request.samples.is_empty() {
        return Err("audio data is empty");
    }
    if request.width <= 0 {
        return Err("width must be positive");
    }
    if !request.sample_rate.is_finite() || request.sample_rate <= 0.0 {
        return Err("sample rate must be positive");
    }

    let kind = request.effective_kind();
    let height = match request.height {
        Some(h) if h <= 0 => return Err("height must be positive"),
        Some(h) => h as usize,
        None if kind.wants_spectrogram() => return Err("height must be positive"),
        None => 0,
    };

    Ok(Plan {
        kind,
        width: request.width as usize,
        height,
        sample_rate: request.sample_rate as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect()
    }

    fn error_of(response: &TransformResponse) -> &str {
        match response {
            TransformResponse::Error { error, .. } => error,
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_input() {
        let processor = TransformProcessor::default();

        let empty = TransformRequest::waveform("a", Vec::new(), 10, 44100.0);
        assert_eq!(error_of(&processor.process(&empty)), "audio data is empty");

        let zero_width = TransformRequest::waveform("b", sine(100), 0, 44100.0);
        assert_eq!(error_of(&processor.process(&zero_width)), "width must be positive");

        let bad_rate = TransformRequest::waveform("c", sine(100), 10, -1.0);
        assert_eq!(error_of(&processor.process(&bad_rate)), "sample rate must be positive");

        let bad_height = TransformRequest::spectrogram("d", sine(100), 10, 0, 44100.0);
        let response = processor.process(&bad_height);
        assert_eq!(error_of(&response), "height must be positive");
        assert_eq!(response.request_id(), "d");
    }

    #[test]
    fn test_non_positive_height_rejected_for_waveform_only() {
        let processor = TransformProcessor::default();
        for height in [0, -5] {
            let request = TransformRequest {
                height: Some(height),
                ..TransformRequest::waveform("h", sine(1000), 10, 44100.0)
            };
            assert_eq!(request.effective_kind(), TransformKind::Waveform);
            let response = processor.process(&request);
            assert_eq!(error_of(&response), "height must be positive");
            assert_eq!(response.request_id(), "h");
        }
    }

    #[test]
    fn test_default_kind_rule() {
        let mut request = TransformRequest::waveform("x", sine(10), 4, 44100.0);
        request.kind = None;
        assert_eq!(request.effective_kind(), TransformKind::Waveform);
        request.height = Some(8);
        assert_eq!(request.effective_kind(), TransformKind::Both);
    }

    #[test]
    fn test_wire_waveform_request() {
        let processor = TransformProcessor::default();
        let message = serde_json::json!({
            "type": "generate",
            "audioData": sine(44100),
            "width": 800,
            "sampleRate": 44100,
            "requestId": "r1",
        });

        let raw = processor.handle_message(&message.to_string());
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "success");
        assert_eq!(value["requestId"], "r1");
        assert!(value.get("spectrogramData").is_none());

        let data = value["waveformData"].as_array().unwrap();
        assert_eq!(data.len(), 800);
        let values: Vec<f64> = data.iter().map(|v| v.as_f64().unwrap()).collect();
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(values.iter().cloned().fold(0.0, f64::max), 1.0);
    }

    #[test]
    fn test_wire_both_kinds_when_height_given() {
        let processor = TransformProcessor::new(256);
        let message = serde_json::json!({
            "type": "generate",
            "audioData": sine(4000),
            "width": 16,
            "height": 12,
            "sampleRate": 44100.0,
            "requestId": "r2",
        });

        let response: TransformResponse =
            serde_json::from_str(&processor.handle_message(&message.to_string())).unwrap();
        match response {
            TransformResponse::Success {
                waveform_data: Some(waveform),
                spectrogram_data: Some(matrix),
                ..
            } => {
                assert_eq!(waveform.len(), 16);
                assert_eq!(matrix.len(), 16);
                assert!(matrix.iter().all(|c| c.len() == 12));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_message_keeps_request_id() {
        let processor = TransformProcessor::default();
        let raw = processor.handle_message(r#"{"type":"explode","requestId":"r9"}"#);
        let response: TransformResponse = serde_json::from_str(&raw).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.request_id(), "r9");

        let raw = processor.handle_message("not json");
        let response: TransformResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(response.request_id(), "");
    }

    #[test]
    fn test_missing_audio_is_rejected_not_malformed() {
        let processor = TransformProcessor::default();
        let raw = processor.handle_message(
            r#"{"type":"generate","width":10,"sampleRate":8000,"requestId":"r3"}"#,
        );
        let response: TransformResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(error_of(&response), "audio data is empty");
    }
}
