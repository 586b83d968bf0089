//! Data models and structures
//!
//! Defines the request-scoped values that flow through the pipeline (uploaded
//! assets, the generation input, model attempt chains, the final result) and the
//! process-wide configuration built once at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

const DEFAULT_API_HOST: &str = "http://jeniya.top";
const DEFAULT_REFINEMENT_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_REFINEMENT_FALLBACKS: &str = "gemini-2.5-flash-image";
const DEFAULT_GENERATION_MODEL: &str = "nano-banana-fast";
const DEFAULT_GENERATION_FALLBACKS: &str = "nano-banana,gemini-2.5-flash-image-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LIGHTING_GUIDANCE: &str =
    "Focus lighting to accentuate gemstones, metal sheen, and craftsmanship details.";

/// One of the four required product photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductView {
    #[serde(rename = "productFront")]
    Front,
    #[serde(rename = "productBack")]
    Back,
    #[serde(rename = "productLeft")]
    Left,
    #[serde(rename = "productRight")]
    Right,
}

impl ProductView {
    /// All views in the order they are refined and reported.
    pub const ALL: [ProductView; 4] = [Self::Front, Self::Back, Self::Left, Self::Right];

    /// Upload field name for this view.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Front => "productFront",
            Self::Back => "productBack",
            Self::Left => "productLeft",
            Self::Right => "productRight",
        }
    }
}

impl fmt::Display for ProductView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// A raw upload as handed over by the request boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Everything a single generation run consumes.
#[derive(Debug, Clone, Default)]
pub struct GenerationInput {
    pub product_type: String,
    pub product_views: BTreeMap<ProductView, ImageAsset>,
    pub model_reference: Option<ImageAsset>,
    pub custom_scene: Option<ImageAsset>,
    pub scene_prompt: Option<String>,
    pub pose_notes: Option<String>,
    pub api_key: Option<String>,
}

impl GenerationInput {
    pub fn new(product_type: impl Into<String>) -> Self {
        Self {
            product_type: product_type.into(),
            ..Self::default()
        }
    }

    pub fn with_view(mut self, view: ProductView, asset: ImageAsset) -> Self {
        self.product_views.insert(view, asset);
        self
    }

    pub fn with_model_reference(mut self, asset: ImageAsset) -> Self {
        self.model_reference = Some(asset);
        self
    }

    pub fn with_custom_scene(mut self, asset: ImageAsset) -> Self {
        self.custom_scene = Some(asset);
        self
    }

    pub fn with_scene_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.scene_prompt = Some(prompt.into());
        self
    }

    pub fn with_pose_notes(mut self, notes: impl Into<String>) -> Self {
        self.pose_notes = Some(notes.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Ordered list of interchangeable model ids for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl ModelChain {
    pub fn new(primary: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks,
        }
    }

    /// Primary first, then each fallback once, never repeating the primary.
    pub fn attempts(&self) -> Vec<String> {
        let mut attempts = vec![self.primary.clone()];
        for model in &self.fallbacks {
            if !attempts.contains(model) {
                attempts.push(model.clone());
            }
        }
        attempts
    }
}

/// Which model actually served each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsUsed {
    pub refinement: BTreeMap<ProductView, String>,
    pub composition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub refined_images: BTreeMap<ProductView, String>,
    pub generated_images: Vec<String>,
    pub models_used: ModelsUsed,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub default_api_key: Option<String>,
    pub refinement: ModelChain,
    pub composition: ModelChain,
    pub request_timeout: Duration,
    pub lighting_guidance: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            default_api_key: None,
            refinement: ModelChain::new(
                DEFAULT_REFINEMENT_MODEL,
                parse_model_list(DEFAULT_REFINEMENT_FALLBACKS),
            ),
            composition: ModelChain::new(
                DEFAULT_GENERATION_MODEL,
                parse_model_list(DEFAULT_GENERATION_FALLBACKS),
            ),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            lighting_guidance: Some(DEFAULT_LIGHTING_GUIDANCE.to_string()),
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let api_host = get("NANO_BANANA_HOST")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string())
            .trim_end_matches('/')
            .to_string();

        let refinement = ModelChain::new(
            normalize_model_id(
                &get("NANO_BANANA_REFINEMENT_MODEL")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_REFINEMENT_MODEL.to_string()),
            ),
            parse_model_list(
                &get("NANO_BANANA_REFINEMENT_FALLBACK_MODELS")
                    .unwrap_or_else(|| DEFAULT_REFINEMENT_FALLBACKS.to_string()),
            ),
        );

        let composition = ModelChain::new(
            normalize_model_id(
                &get("NANO_BANANA_GENERATION_MODEL")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            ),
            parse_model_list(
                &get("NANO_BANANA_GENERATION_FALLBACK_MODELS")
                    .unwrap_or_else(|| DEFAULT_GENERATION_FALLBACKS.to_string()),
            ),
        );

        let request_timeout = match get("NANO_BANANA_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                crate::Error::Config(format!(
                    "NANO_BANANA_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        // An explicitly empty value disables the guidance line.
        let lighting_guidance = match get("NANO_BANANA_LIGHTING_GUIDANCE") {
            Some(v) if v.is_empty() => None,
            Some(v) => Some(v),
            None => Some(DEFAULT_LIGHTING_GUIDANCE.to_string()),
        };

        Ok(Self {
            api_host,
            default_api_key: get("NANO_BANANA_API_KEY").filter(|v| !v.is_empty()),
            refinement,
            composition,
            request_timeout,
            lighting_guidance,
        })
    }
}

/// Returns the trimmed value, or `None` when it is absent or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_model_id(model: &str) -> String {
    let model = model.trim();
    model.strip_prefix("models/").unwrap_or(model).to_string()
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_model_id)
        .filter(|m| !m.is_empty())
        .collect()
}
