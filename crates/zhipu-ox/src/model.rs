use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Chat models offered by Zhipu AI
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
pub enum Model {
    #[default]
    #[serde(rename = "glm-4")]
    #[strum(serialize = "glm-4")]
    Glm4,

    #[serde(rename = "glm-4-plus")]
    #[strum(serialize = "glm-4-plus")]
    Glm4Plus,

    #[serde(rename = "glm-4-air")]
    #[strum(serialize = "glm-4-air")]
    Glm4Air,

    #[serde(rename = "glm-4-flash")]
    #[strum(serialize = "glm-4-flash")]
    Glm4Flash,

    #[serde(rename = "glm-4-long")]
    #[strum(serialize = "glm-4-long")]
    Glm4Long,

    /// Custom model (for models not in this enum, or other OpenAI-compatible endpoints)
    #[serde(untagged)]
    #[strum(default)]
    Custom(String),
}

impl Model {
    /// Get the string representation of the model
    pub fn as_str(&self) -> &str {
        match self {
            Model::Glm4 => "glm-4",
            Model::Glm4Plus => "glm-4-plus",
            Model::Glm4Air => "glm-4-air",
            Model::Glm4Flash => "glm-4-flash",
            Model::Glm4Long => "glm-4-long",
            Model::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Model {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Model::Custom(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_string_conversion() {
        let model: Model = "glm-4-flash".parse().unwrap();
        assert_eq!(model, Model::Glm4Flash);
        assert_eq!(model.as_str(), "glm-4-flash");
        assert_eq!(model.to_string(), "glm-4-flash");

        assert_eq!(Model::try_from("glm-4-long").unwrap(), Model::Glm4Long);
        assert_eq!(Model::from("glm-4-air".to_string()), Model::Glm4Air);
        assert_eq!(Model::default(), Model::Glm4);
    }

    #[test]
    fn test_model_custom() {
        let parsed: Model = "deepseek-chat".parse().unwrap();
        assert_eq!(parsed, Model::Custom("deepseek-chat".to_string()));

        let model = Model::from("deepseek-chat".to_string());
        assert!(matches!(model, Model::Custom(ref s) if s == "deepseek-chat"));
        assert_eq!(model.as_str(), "deepseek-chat");
    }

    #[test]
    fn test_model_serde() {
        assert_eq!(serde_json::to_string(&Model::Glm4).unwrap(), "\"glm-4\"");
        let custom: Model = serde_json::from_str("\"my-model\"").unwrap();
        assert_eq!(custom, Model::Custom("my-model".to_string()));
        let known: Model = serde_json::from_str("\"glm-4-air\"").unwrap();
        assert_eq!(known, Model::Glm4Air);
    }
}
