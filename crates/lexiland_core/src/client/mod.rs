//! Annotation service client.
//!
//! # Responsibility
//! - Call the external LLM-backed annotation endpoints.
//! - Normalize every outcome into a `{success, data?, error?, usage?}` envelope.
//!
//! # Invariants
//! - Client calls never panic and never return `Err`; callers branch on
//!   `success`.
//! - A success envelope always carries data that passed validation (word
//!   annotations need a non-empty example, phrase annotations a translation).

mod http;

pub use http::{ClientError, HttpAnnotationClient};

use crate::model::word::{Level, WordAnnotation};
use serde::{Deserialize, Serialize};

pub const ANNOTATE_WORD_PATH: &str = "/api/annotate";
pub const ANNOTATE_PHRASE_PATH: &str = "/api/annotate-phrase";

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Response envelope shared by all annotation endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T, usage: Option<Usage>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            usage,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            usage: None,
        }
    }

    /// Converts the envelope into a `Result`, keeping the usage figures.
    pub fn into_result(self) -> Result<(T, Option<Usage>), String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok((data, self.usage)),
            _ => Err(self
                .error
                .unwrap_or_else(|| "annotation service returned no data".to_string())),
        }
    }
}

pub type AnnotateResponse = ServiceResponse<WordAnnotation>;
pub type PhraseAnnotateResponse = ServiceResponse<PhraseAnnotation>;

/// Body of `POST /api/annotate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateRequest {
    pub word: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AnnotateRequest {
    pub fn new(word: impl Into<String>, level: Level, context: Option<String>) -> Self {
        Self {
            word: word.into(),
            level,
            context,
        }
    }
}

/// Body of `POST /api/annotate-phrase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseRequest {
    pub phrase: String,
    pub sentence_context: String,
    pub level: Level,
}

/// Translation of a multi-word selection in its sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseAnnotation {
    pub phrase: String,
    #[serde(default)]
    pub chinese: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub sentence_context: String,
}

/// Seam between the reader and the annotation backend.
///
/// Implementations must be shareable across batch workers.
pub trait AnnotationService: Sync {
    fn annotate_word(&self, request: &AnnotateRequest) -> AnnotateResponse;
    fn annotate_phrase(&self, request: &PhraseRequest) -> PhraseAnnotateResponse;
}

/// Applies reader-side validation to a decoded word response.
pub fn validate_word_response(response: AnnotateResponse) -> AnnotateResponse {
    if !response.success {
        let error = response
            .error
            .unwrap_or_else(|| "annotation service reported failure".to_string());
        return AnnotateResponse::failure(error);
    }

    match response.data {
        None => AnnotateResponse::failure("annotation response is missing data"),
        Some(data) => match data.validate() {
            Ok(()) => AnnotateResponse::ok(data, response.usage),
            Err(err) => AnnotateResponse::failure(err.to_string()),
        },
    }
}

/// Applies reader-side validation to a decoded phrase response.
pub fn validate_phrase_response(response: PhraseAnnotateResponse) -> PhraseAnnotateResponse {
    if !response.success {
        let error = response
            .error
            .unwrap_or_else(|| "annotation service reported failure".to_string());
        return PhraseAnnotateResponse::failure(error);
    }

    match response.data {
        Some(data) if !data.chinese.trim().is_empty() => {
            PhraseAnnotateResponse::ok(data, response.usage)
        }
        Some(data) => PhraseAnnotateResponse::failure(format!(
            "phrase annotation for `{}` has no translation",
            data.phrase
        )),
        None => PhraseAnnotateResponse::failure("phrase annotation response is missing data"),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_word_response, AnnotateRequest, AnnotateResponse};
    use crate::model::word::Level;

    #[test]
    fn request_serializes_level_and_omits_missing_context() {
        let body = serde_json::to_value(AnnotateRequest::new("dawn", Level::B2, None)).unwrap();
        assert_eq!(body, serde_json::json!({"word": "dawn", "level": "B2"}));
    }

    #[test]
    fn empty_example_is_normalized_to_failure() {
        let raw: AnnotateResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": {"word": "dawn", "ipa": "/dɔːn/", "chinese": "黎明", "definition": "first light",
                     "example": "", "level": "B1", "partOfSpeech": "noun"}
        }))
        .unwrap();
        let checked = validate_word_response(raw);
        assert!(!checked.success);
        assert!(checked.error.unwrap().contains("example"));
    }

    #[test]
    fn service_failure_keeps_its_message() {
        let raw: AnnotateResponse =
            serde_json::from_value(serde_json::json!({"success": false, "error": "quota"}))
                .unwrap();
        assert!(raw.data.is_none());
        assert_eq!(validate_word_response(raw).error.as_deref(), Some("quota"));
    }

    #[test]
    fn success_keeps_usage() {
        let raw: AnnotateResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": {"word": "dawn", "ipa": "", "chinese": "黎明", "definition": "",
                     "example": "We left at dawn.", "level": "B1", "partOfSpeech": "noun"},
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
        }))
        .unwrap();
        let (data, usage) = validate_word_response(raw).into_result().unwrap();
        assert_eq!(data.word, "dawn");
        assert_eq!(usage.unwrap().total_tokens, 30);
    }
}
