//! Application profiles: named presets binding a default model, a system
//! prompt, and knowledge-base references.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppProfile {
    /// Generated on create when blank.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub model_id: Option<String>,
    /// System prompt applied to conversations started from this app.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Knowledge-base ids. Carried through, never dereferenced.
    #[serde(default)]
    pub knowledge_ids: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_profile_camel_case() {
        let json = r#"{"id":"a1","name":"Tutor","modelId":"m1","knowledgeIds":["k1","k2"]}"#;
        let app: AppProfile = serde_json::from_str(json).unwrap();
        assert_eq!(app.model_id.as_deref(), Some("m1"));
        assert_eq!(app.knowledge_ids, vec!["k1", "k2"]);
        assert!(app.prompt.is_none());
    }
}
