use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default speaker tag for turns produced by the model
pub const AI_ROLE: &str = "ai";

/// One `(role, text)` entry of a conversation.
///
/// On the wire a turn is a two element array, `["human", "What is a SWOT?"]`,
/// which is what the web client sends and expects back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct ConversationTurn {
    pub role: String,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

impl From<(String, String)> for ConversationTurn {
    fn from((role, text): (String, String)) -> Self {
        Self { role, text }
    }
}

impl From<ConversationTurn> for (String, String) {
    fn from(turn: ConversationTurn) -> Self {
        (turn.role, turn.text)
    }
}

/// The history of a conversation plus the utterance being answered
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub history: Vec<ConversationTurn>,
    pub input: String,
}

impl ConversationState {
    pub fn new(history: Vec<ConversationTurn>, input: impl Into<String>) -> Self {
        Self {
            history,
            input: input.into(),
        }
    }

    /// Text of the most recent prior turn, if there is one
    pub fn last_turn_text(&self) -> Option<&str> {
        self.history.last().map(|turn| turn.text.as_str())
    }

    /// Consume the state and return it with exactly one more turn appended.
    pub fn extended(mut self, turn: ConversationTurn) -> Self {
        self.history.push(turn);
        self
    }
}

/// A single web search hit in its canonical shape
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Snippet of page content, only ever used as prompt reference material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SearchItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Normalize one provider result into the canonical shape.
    ///
    /// Returns `None` for anything that is not an object or that carries neither
    /// a url nor a title. Blank strings and non-string values count as missing.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let url = field("url");
        let title = field("title");
        if url.is_none() && title.is_none() {
            return None;
        }

        Some(Self {
            url,
            title,
            content: field("content"),
        })
    }
}

/// A numbered, deduplicated source shown under the "Sources" heading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub index: usize,
    pub title: String,
    pub url: String,
}
