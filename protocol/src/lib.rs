//! JSON bodies exchanged with the web client.

use chrono::{DateTime, Utc};
use consult_core::{ConversationTurn, SourceCitation};
use serde::{Deserialize, Serialize};

/// A request to analyze the latest user utterance
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Prior conversation as `[role, text]` pairs, oldest first
    pub messages: Vec<ConversationTurn>,
    /// The utterance to answer
    pub user_input: String,
}

/// The answer to an [`AnalysisRequest`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    /// Identifier of the stored discussion record
    #[serde(rename = "_id")]
    pub id: String,
    pub response: String,
    /// The request's messages followed by the model's turn
    pub full_history: Vec<ConversationTurn>,
    /// Tag of the report template that produced the answer
    pub template: String,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body for every failed request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// Signup and login body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub message: String,
    pub user_id: String,
    /// Bearer token for subsequent requests
    pub token: String,
}

/// Identity carried by a valid bearer token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: String,
}

/// Progress of a plan on the board
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlanCreate {
    pub title: String,
    pub description: String,
    pub status: PlanStatus,
}

/// Partial update; absent fields are left unchanged
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
}

impl PlanUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Query string of the transcript download
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DownloadParams {
    #[serde(default = "default_download_format")]
    pub format: String,
    /// Discussion to export; the most recent one when absent
    #[serde(default)]
    pub id: Option<String>,
}

fn default_download_format() -> String {
    "txt".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_request_from_client_json() {
        let body = json!({
            "messages": [["system", "Start"], ["human", "Hello"]],
            "user_input": "How are you?"
        });
        let request: AnalysisRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1], ConversationTurn::new("human", "Hello"));
        assert_eq!(request.user_input, "How are you?");
    }

    #[test]
    fn test_analysis_request_rejects_bad_messages() {
        let body = json!({"messages": "not a list of tuples", "user_input": "Test"});
        assert!(serde_json::from_value::<AnalysisRequest>(body).is_err());
    }

    #[test]
    fn test_analysis_response_shape() {
        let response = AnalysisResponse {
            id: "abc".to_string(),
            response: "Hi".to_string(),
            full_history: vec![ConversationTurn::new("ai", "Hi")],
            template: "general".to_string(),
            sources: vec![],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["_id"], "abc");
        assert_eq!(value["full_history"], json!([["ai", "Hi"]]));
    }

    #[test]
    fn test_plan_status_tags() {
        let update: PlanUpdate = serde_json::from_value(json!({"status": "inprogress"})).unwrap();
        assert_eq!(update.status, Some(PlanStatus::InProgress));
        assert!(!update.is_empty());

        assert!(serde_json::from_value::<PlanCreate>(
            json!({"title": "t", "description": "d", "status": "blocked"})
        )
        .is_err());
        assert!(PlanUpdate::default().is_empty());
    }

    #[test]
    fn test_download_format_defaults_to_text() {
        let params: DownloadParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.format, "txt");
        assert_eq!(params.id, None);
    }
}
