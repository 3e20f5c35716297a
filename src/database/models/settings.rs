// Database models - Settings
use serde::{Deserialize, Serialize};

/// Default generation model when nothing is configured
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Default model used for story evaluation
pub const DEFAULT_EVALUATION_MODEL: &str = "deepseek/deepseek-chat:free";

/// The user configuration record, loaded at startup and replaced wholesale on save
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub api_key: String,
    pub site_url: String,
    pub site_name: String,
    pub model: String,
    pub default_evaluation_model: String,
    pub style_guide: String,
    pub google_api_key: String,
    pub google_client_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            site_url: String::new(),
            site_name: String::new(),
            model: DEFAULT_MODEL.to_string(),
            default_evaluation_model: DEFAULT_EVALUATION_MODEL.to_string(),
            style_guide: String::new(),
            google_api_key: String::new(),
            google_client_id: String::new(),
        }
    }
}

impl Settings {
    /// The evaluation model to use, falling back to the documented default
    pub fn evaluation_model(&self) -> &str {
        if self.default_evaluation_model.trim().is_empty() {
            DEFAULT_EVALUATION_MODEL
        } else {
            &self.default_evaluation_model
        }
    }
}
