use forge_protocol::models::ModelConfig;
use forge_protocol::models::ModelTier;
use forge_protocol::models::SamplingProfile;

/// Inputs longer than this (in bytes) go to the expensive tier.
pub const LARGE_INPUT_THRESHOLD: usize = 500;
/// Repairs touching more files than this go to the expensive tier.
pub const MANY_FILES_THRESHOLD: usize = 5;

/// Maps request size to a model deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelector {
    pub fast_model: String,
    pub expensive_model: String,
}

impl ModelSelector {
    pub fn new(fast_model: impl Into<String>, expensive_model: impl Into<String>) -> Self {
        Self {
            fast_model: fast_model.into(),
            expensive_model: expensive_model.into(),
        }
    }

    /// Model for a repair request, always with the precision profile.
    pub fn select(&self, error_text_len: usize, file_count: usize) -> ModelConfig {
        let tier = if error_text_len > LARGE_INPUT_THRESHOLD || file_count > MANY_FILES_THRESHOLD {
            ModelTier::Expensive
        } else {
            ModelTier::Fast
        };
        self.config(tier, SamplingProfile::Precision)
    }

    /// Model for original generation, always with the creative profile.
    pub fn select_for_generation(&self, prompt_len: usize) -> ModelConfig {
        let tier = if prompt_len > LARGE_INPUT_THRESHOLD {
            ModelTier::Expensive
        } else {
            ModelTier::Fast
        };
        self.config(tier, SamplingProfile::Creative)
    }

    fn config(&self, tier: ModelTier, profile: SamplingProfile) -> ModelConfig {
        let model = match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Expensive => &self.expensive_model,
        };
        ModelConfig::new(model.clone(), tier, profile)
    }
}
