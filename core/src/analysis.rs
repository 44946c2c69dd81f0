use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{FoodEntry, Macros};

pub const TEXT_SYSTEM_PROMPT: &str = "You are a nutrition expert. Analyse the meal. Return ONLY valid JSON \
without extra text or markdown. Shape: { \"calories\": number, \"protein\": number, \"fat\": number, \
\"carbs\": number, \"name\": string, \"micronutrients\": string[], \"notes\": string }. Estimate \
conservatively. If the input is not food, return null.";

pub const IMAGE_SYSTEM_PROMPT: &str = "You are a nutrition expert. Identify the dish in the photo. Return ONLY \
valid JSON without markdown. Shape: { \"calories\": number, \"protein\": number, \"fat\": number, \
\"carbs\": number, \"name\": string, \"micronutrients\": string[], \"notes\": string }. If the photo \
shows no food, return null.";

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

pub const DEFAULT_IMAGE_PROMPT: &str = "Estimate calories and macros for this dish.";

pub const UNKNOWN_DISH: &str = "Unknown dish";
pub const UNKNOWN_DISH_PHOTO: &str = "Unknown dish (photo)";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("nothing to analyse: provide a description or a photo")]
    EmptyRequest,
    #[error("analysis service unreachable: {0}")]
    Transport(String),
    #[error("analysis service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("analysis service returned no content")]
    EmptyResponse,
    #[error("input was not recognised as food")]
    NotFood,
    #[error("could not parse analysis result: {0}")]
    Parse(String),
}

/// Text and/or photo to analyse. With a photo, `text` is the optional caption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub text: Option<String>,
    /// Base64 image payload, without any `data:` URL prefix.
    pub image_base64: Option<String>,
    /// Media type of the image. `None` is sent as JPEG.
    pub image_mime: Option<String>,
}

impl AnalysisRequest {
    #[must_use]
    pub fn text(description: &str) -> Self {
        Self {
            text: Some(description.to_string()),
            ..Self::default()
        }
    }

    /// Accepts a bare base64 payload or a full `data:` URL, whose media type is kept.
    #[must_use]
    pub fn image(image_base64: &str, caption: Option<&str>) -> Self {
        Self {
            text: caption.map(str::to_string),
            image_base64: Some(strip_data_url_prefix(image_base64).to_string()),
            image_mime: data_url_mime(image_base64).map(str::to_string),
        }
    }

    #[must_use]
    pub fn with_image_mime(mut self, mime: &str) -> Self {
        self.image_mime = Some(mime.to_string());
        self
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        self.image_mime.as_deref().unwrap_or(DEFAULT_IMAGE_MIME)
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image_base64.as_deref().is_some_and(|b| !b.is_empty())
    }

    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.has_image() || self.caption().is_some() {
            Ok(())
        } else {
            Err(AnalysisError::EmptyRequest)
        }
    }

    #[must_use]
    pub fn fallback_name(&self) -> &'static str {
        if self.has_image() {
            UNKNOWN_DISH_PHOTO
        } else {
            UNKNOWN_DISH
        }
    }
}

/// `data:image/png;base64,AAAA` -> `image/png`.
#[must_use]
pub fn data_url_mime(payload: &str) -> Option<&str> {
    let rest = payload.strip_prefix("data:")?;
    let idx = rest.find(";base64,")?;
    Some(&rest[..idx]).filter(|m| !m.is_empty())
}

/// `data:image/png;base64,AAAA` -> `AAAA`. Plain payloads pass through.
#[must_use]
pub fn strip_data_url_prefix(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some(idx) = payload.find(";base64,") {
            return &payload[idx + ";base64,".len()..];
        }
    }
    payload
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub name: String,
    pub macros: Macros,
    pub micronutrients: Vec<String>,
    pub notes: Option<String>,
}

impl AnalysisResult {
    #[must_use]
    pub fn into_entry(self, timestamp: DateTime<Utc>) -> FoodEntry {
        FoodEntry {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            macros: self.macros,
            timestamp,
            micronutrients: self.micronutrients,
            notes: self.notes,
        }
    }
}

/// The external nutrition-analysis collaborator.
#[async_trait]
pub trait FoodAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

// --- Chat completion response shape ---

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    pub fn content(&self) -> Result<&str, AnalysisError> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}

// --- Model output parsing ---

/// Accepts numbers, numeric strings and null; anything unusable becomes 0.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if n.is_finite() && n > 0.0 { n } else { 0.0 })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
    name: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    calories: f64,
    #[serde(deserialize_with = "lenient_number")]
    protein: f64,
    #[serde(deserialize_with = "lenient_number")]
    fat: f64,
    #[serde(deserialize_with = "lenient_number")]
    carbs: f64,
    micronutrients: Option<Vec<String>>,
    notes: Option<String>,
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
#[must_use]
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Turn the model's message content into a result. A JSON `null` means the
/// input was not food.
pub fn parse_analysis_content(
    content: &str,
    fallback_name: &str,
) -> Result<AnalysisResult, AnalysisError> {
    let clean = strip_code_fences(content);
    let value: serde_json::Value =
        serde_json::from_str(clean).map_err(|e| AnalysisError::Parse(e.to_string()))?;
    if value.is_null() {
        return Err(AnalysisError::NotFood);
    }
    if !value.is_object() {
        return Err(AnalysisError::Parse(
            "expected a JSON object".to_string(),
        ));
    }
    let raw: RawAnalysis =
        serde_json::from_value(value).map_err(|e| AnalysisError::Parse(e.to_string()))?;

    Ok(AnalysisResult {
        name: raw
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string()),
        macros: Macros {
            calories: raw.calories,
            protein: raw.protein,
            fat: raw.fat,
            carbs: raw.carbs,
        },
        micronutrients: raw
            .micronutrients
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect(),
        notes: raw
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    })
}
