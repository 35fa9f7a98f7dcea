use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Cost/latency tier of a model deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Expensive,
}

/// Named sampling profile.
///
/// `Precision` is used for repair tasks, `Creative` for original generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SamplingProfile {
    Precision,
    Creative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl SamplingParams {
    pub const fn for_profile(profile: SamplingProfile) -> Self {
        match profile {
            SamplingProfile::Precision => Self {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 20,
                max_output_tokens: 8192,
            },
            SamplingProfile::Creative => Self {
                temperature: 0.7,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 8192,
            },
        }
    }
}

/// A concrete model choice: which deployment and how to sample from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub tier: ModelTier,
    pub profile: SamplingProfile,
    pub sampling: SamplingParams,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>, tier: ModelTier, profile: SamplingProfile) -> Self {
        Self {
            model: model.into(),
            tier,
            profile,
            sampling: SamplingParams::for_profile(profile),
        }
    }
}
