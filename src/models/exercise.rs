use serde::{Deserialize, Deserializer, Serialize};

/// Backend ids show up as either JSON numbers or strings depending on the
/// endpoint; both are normalised to a string.
pub fn deserialize_id_flexible<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        String(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(i) => Ok(i.to_string()),
        IntOrString::String(s) if !s.trim().is_empty() => Ok(s),
        IntOrString::String(_) => Err(serde::de::Error::custom("Empty identifier")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(deserialize_with = "deserialize_id_flexible")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Only populated by the candidate exercise catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub challenges: Vec<Challenge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(deserialize_with = "deserialize_id_flexible")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(deserialize_with = "deserialize_id_flexible")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exercise_accepts_numeric_and_string_ids() {
        let numeric: Exercise = serde_json::from_value(json!({
            "id": 42,
            "title": "Linked lists",
            "difficulty": "advanced",
            "challenges": [{ "id": "c-1", "title": "Reverse", "steps": [{ "id": 7 }] }]
        }))
        .unwrap();
        assert_eq!(numeric.id, "42");
        assert_eq!(numeric.difficulty, Difficulty::Advanced);
        assert_eq!(numeric.challenges[0].id, "c-1");
        assert_eq!(numeric.challenges[0].steps[0].id, "7");

        let stringy: Exercise =
            serde_json::from_value(json!({ "id": "ex-9", "title": "Trees" })).unwrap();
        assert_eq!(stringy.id, "ex-9");
        assert_eq!(stringy.difficulty, Difficulty::Beginner);
        assert!(stringy.challenges.is_empty());
    }

    #[test]
    fn blank_identifier_is_rejected() {
        let parsed = serde_json::from_value::<Step>(json!({ "id": "  " }));
        assert!(parsed.is_err());
    }
}
