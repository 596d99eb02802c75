// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored score record. Field order matches the persisted JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: u64,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub edge: Value,
    #[serde(default)]
    pub edge_type: Value,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub language: Value,
    #[serde(default)]
    pub time: Value,
}

impl Score {
    #[must_use]
    pub fn new(id: u64, user: impl Into<String>, draft: ScoreDraft) -> Self {
        Self {
            id,
            user: user.into(),
            score: draft.score,
            edge: draft.edge,
            edge_type: draft.edge_type,
            description: draft.description,
            language: draft.language,
            time: draft.time,
        }
    }

    /// The score value as a float, when the stored value is a JSON number.
    #[must_use]
    pub fn numeric_score(&self) -> Option<f64> {
        self.score.as_f64()
    }

    /// Public form of the record: `id` replaced by its lookup URI.
    #[must_use]
    pub fn to_public(&self, uri: String) -> PublicScore {
        PublicScore {
            uri,
            user: self.user.clone(),
            score: self.score.clone(),
            edge: self.edge.clone(),
            edge_type: self.edge_type.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            time: self.time.clone(),
        }
    }
}

/// Caller-supplied fields of a new score. Absent optional fields become `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDraft {
    pub score: Value,
    #[serde(default)]
    pub edge: Value,
    #[serde(default)]
    pub edge_type: Value,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub language: Value,
    #[serde(default)]
    pub time: Value,
}

impl ScoreDraft {
    /// Builds a draft from a request body. The body must be a JSON object with
    /// a `score` key; its value is taken as-is, `null` included. Unknown keys
    /// are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ValidationError("request body must be a JSON object".to_string()))?;
        let score = obj
            .get("score")
            .cloned()
            .ok_or_else(|| ValidationError("missing required field: score".to_string()))?;
        Ok(Self {
            score,
            edge: field(obj, "edge"),
            edge_type: field(obj, "edge_type"),
            description: field(obj, "description"),
            language: field(obj, "language"),
            time: field(obj, "time"),
        })
    }
}

fn field(obj: &Map<String, Value>, name: &str) -> Value {
    obj.get(name).cloned().unwrap_or(Value::Null)
}

/// Response shape of a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicScore {
    pub uri: String,
    pub user: String,
    pub score: Value,
    pub edge: Value,
    pub edge_type: Value,
    pub description: Value,
    pub language: Value,
    pub time: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_requires_score_key_but_accepts_null() {
        assert!(ScoreDraft::from_json(&json!({"edge": 1})).is_err());
        assert!(ScoreDraft::from_json(&json!([1, 2])).is_err());
        let draft = ScoreDraft::from_json(&json!({"score": null})).expect("null score");
        assert_eq!(draft.score, Value::Null);
    }

    #[test]
    fn draft_fills_missing_fields_with_null_and_ignores_extras() {
        let draft = ScoreDraft::from_json(&json!({
            "score": 0.75,
            "language": "en",
            "unexpected": true
        }))
        .expect("draft");
        assert_eq!(draft.score, json!(0.75));
        assert_eq!(draft.language, json!("en"));
        assert_eq!(draft.edge, Value::Null);
        assert_eq!(draft.time, Value::Null);
    }

    #[test]
    fn persisted_layout_keeps_every_field() {
        let score = Score::new(
            3,
            "alice",
            ScoreDraft {
                score: json!(12),
                time: json!("2020-01-01T00:00:00"),
                ..ScoreDraft::default()
            },
        );
        let value = serde_json::to_value(&score).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": 3,
                "user": "alice",
                "score": 12,
                "edge": null,
                "edge_type": null,
                "description": null,
                "language": null,
                "time": "2020-01-01T00:00:00"
            })
        );
    }

    #[test]
    fn public_form_swaps_id_for_uri() {
        let score = Score::new(0, "bob", ScoreDraft::default());
        let public = score.to_public("http://h/compute/api/scores/a/b/0".to_string());
        let value = serde_json::to_value(&public).expect("serialize");
        assert!(value.get("id").is_none());
        assert_eq!(value["uri"], json!("http://h/compute/api/scores/a/b/0"));
        assert_eq!(value["user"], json!("bob"));
    }

    #[test]
    fn numeric_score_ignores_non_numbers() {
        let mut score = Score::new(0, "u", ScoreDraft::default());
        assert_eq!(score.numeric_score(), None);
        score.score = json!("high");
        assert_eq!(score.numeric_score(), None);
        score.score = json!(4);
        assert_eq!(score.numeric_score(), Some(4.0));
    }
}
