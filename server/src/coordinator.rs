use crate::storage::{DiscussionRecord, DiscussionStore, StoreError};
use consult_analysis::{AnalysisPipeline, PipelineError};
use consult_core::{ConversationState, ConversationTurn};
use consult_protocol::{AnalysisRequest, AnalysisResponse};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

#[derive(Error, Debug)]
pub enum TurnError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Analysis did not finish within {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to store discussion: {0}")]
    Store(#[from] StoreError),
}

/// Answer one analysis request and record the finished turn.
///
/// Nothing is stored when the turn fails or runs past `deadline`.
#[instrument(skip_all, fields(history_len = request.messages.len()))]
pub async fn process_turn(
    pipeline: &AnalysisPipeline,
    store: &dyn DiscussionStore,
    deadline: Duration,
    request: AnalysisRequest,
) -> Result<AnalysisResponse, TurnError> {
    let state = ConversationState::new(request.messages.clone(), request.user_input.clone());

    let outcome = match tokio::time::timeout(deadline, pipeline.run(state)).await {
        Ok(result) => result?,
        Err(_) => {
            error!(deadline_secs = deadline.as_secs(), "Analysis turn timed out");
            return Err(TurnError::Timeout(deadline));
        }
    };

    let record = DiscussionRecord::new(
        request.messages,
        request.user_input,
        outcome.response.clone(),
        outcome.state.history.clone(),
        outcome.template.name(),
    );
    let id = store.insert(record).await?;
    info!(id = %id, template = %outcome.template, "Analysis turn stored");

    Ok(AnalysisResponse {
        id,
        response: outcome.response,
        full_history: outcome.state.history,
        template: outcome.template.name().to_string(),
        sources: outcome.citations,
    })
}

/// Export format of the discussion transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    Text,
    Markdown,
}

impl TranscriptFormat {
    pub fn parse(format: &str) -> Option<Self> {
        match format.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Text => "text/plain; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

fn render_turn(turn: &ConversationTurn, format: TranscriptFormat) -> String {
    match format {
        TranscriptFormat::Text => format!("{}: {}", turn.role, turn.text),
        TranscriptFormat::Markdown => format!("## {}\n\n{}", turn.role, turn.text),
    }
}

/// Render a stored discussion as a downloadable document.
pub fn render_transcript(record: &DiscussionRecord, format: TranscriptFormat) -> String {
    let turns: Vec<String> = record
        .full_history
        .iter()
        .map(|turn| render_turn(turn, format))
        .collect();

    match format {
        TranscriptFormat::Text => turns.join("\n"),
        TranscriptFormat::Markdown => format!(
            "# Analysis report ({})\n\n{}\n",
            record.template,
            turns.join("\n\n")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use consult_analysis::{PipelineSettings, Providers};
    use consult_core::{ConsultError, ConsultResult, LLMClient};
    use std::sync::Arc;

    struct Replying(&'static str);

    #[async_trait]
    impl LLMClient for Replying {
        async fn generate(&self, _prompt: &str) -> ConsultResult<String> {
            Ok(self.0.to_string())
        }
        fn provider_name(&self) -> &'static str {
            "fake"
        }
        fn model_name(&self) -> String {
            "fake-model".to_string()
        }
    }

    struct Failing;

    #[async_trait]
    impl LLMClient for Failing {
        async fn generate(&self, _prompt: &str) -> ConsultResult<String> {
            Err(ConsultError::ApiError("quota exceeded".to_string()))
        }
        fn provider_name(&self) -> &'static str {
            "fake"
        }
        fn model_name(&self) -> String {
            "fake-model".to_string()
        }
    }

    struct Slow;

    #[async_trait]
    impl LLMClient for Slow {
        async fn generate(&self, _prompt: &str) -> ConsultResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
        fn provider_name(&self) -> &'static str {
            "fake"
        }
        fn model_name(&self) -> String {
            "fake-model".to_string()
        }
    }

    fn pipeline(generator: Arc<dyn LLMClient>) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Providers { generator, search: None },
            PipelineSettings::default(),
        )
    }

    fn request(input: &str) -> AnalysisRequest {
        AnalysisRequest {
            messages: vec![ConversationTurn::new("human", input)],
            user_input: input.to_string(),
        }
    }

    #[tokio::test]
    async fn test_turn_is_stored() {
        let store = InMemoryStore::new();
        let pipeline = pipeline(Arc::new(Replying("# SWOT\nBody")));

        let response = process_turn(&pipeline, &store, Duration::from_secs(5), request("swot of Acme"))
            .await
            .unwrap();
        assert_eq!(response.template, "swot");
        assert_eq!(response.response, "# SWOT\nBody");
        assert_eq!(response.full_history.len(), 2);
        assert_eq!(response.full_history[1], ConversationTurn::new("ai", "# SWOT\nBody"));

        let stored = store.latest().await.unwrap().unwrap();
        assert_eq!(stored.id, response.id);
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.full_history, response.full_history);
    }

    #[tokio::test]
    async fn test_failed_turn_stores_nothing() {
        let store = InMemoryStore::new();
        let pipeline = pipeline(Arc::new(Failing));

        let result = process_turn(&pipeline, &store, Duration::from_secs(5), request("hello")).await;
        assert!(matches!(result, Err(TurnError::Pipeline(_))));
        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deadline_enforced() {
        let store = InMemoryStore::new();
        let pipeline = pipeline(Arc::new(Slow));

        let result =
            process_turn(&pipeline, &store, Duration::from_millis(50), request("hello")).await;
        assert!(matches!(result, Err(TurnError::Timeout(_))));
        assert!(store.latest().await.unwrap().is_none());
    }

    #[test]
    fn test_transcript_formats() {
        let record = DiscussionRecord::new(
            vec![ConversationTurn::new("human", "swot of Acme")],
            "swot of Acme".to_string(),
            "# SWOT".to_string(),
            vec![
                ConversationTurn::new("human", "swot of Acme"),
                ConversationTurn::new("ai", "# SWOT"),
            ],
            "swot",
        );

        assert_eq!(
            render_transcript(&record, TranscriptFormat::Text),
            "human: swot of Acme\nai: # SWOT"
        );
        assert_eq!(
            render_transcript(&record, TranscriptFormat::Markdown),
            "# Analysis report (swot)\n\n## human\n\nswot of Acme\n\n## ai\n\n# SWOT\n"
        );
    }

    #[test]
    fn test_transcript_format_parsing() {
        assert_eq!(TranscriptFormat::parse("TXT"), Some(TranscriptFormat::Text));
        assert_eq!(TranscriptFormat::parse("md"), Some(TranscriptFormat::Markdown));
        assert_eq!(TranscriptFormat::parse("pdf"), None);
        assert_eq!(TranscriptFormat::Markdown.extension(), "md");
    }
}
