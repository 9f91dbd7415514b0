use crate::composer;
use crate::finalizer;
use crate::router;
use crate::template::AnalysisTemplate;
use consult_core::{
    AnalysisConfig, ConsultError, ConversationState, ConversationTurn, LLMClient, SearchClient,
    SearchItem, SourceCitation,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Failures that abort a turn. Everything else is absorbed inside the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Generation failed: {0}")]
    Generation(#[source] ConsultError),
}

/// Stages a turn passes through, strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Routed,
    Searched,
    Prompted,
    Generated,
    Sanitized,
    Cited,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Routed => "routed",
            Stage::Searched => "searched",
            Stage::Prompted => "prompted",
            Stage::Generated => "generated",
            Stage::Sanitized => "sanitized",
            Stage::Cited => "cited",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// External services the pipeline talks to
#[derive(Clone)]
pub struct Providers {
    pub generator: Arc<dyn LLMClient>,
    /// Without a search client every turn uses the empty-results marker
    pub search: Option<Arc<dyn SearchClient>>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Role tag of the turn appended for the model's reply
    pub ai_role: String,
    pub search_year: u16,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for PipelineSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            ai_role: config.ai_role.clone(),
            search_year: config.search_year,
        }
    }
}

/// Result of one completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub template: AnalysisTemplate,
    /// Sanitized reply with the Sources section appended
    pub response: String,
    pub citations: Vec<SourceCitation>,
    /// Input state with the reply appended as one new turn
    pub state: ConversationState,
}

/// classify, search, prompt, generate, sanitize, cite
pub struct AnalysisPipeline {
    providers: Providers,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    pub fn new(providers: Providers, settings: PipelineSettings) -> Self {
        Self { providers, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the search, recovering from any failure with an empty result set.
    async fn gather_results(&self, query: &str) -> Vec<SearchItem> {
        let Some(search) = &self.providers.search else {
            debug!("No search client configured, skipping web search");
            return Vec::new();
        };

        match search.search(query).await {
            Ok(results) => {
                info!(provider = search.provider_name(), count = results.len(), "Web search completed");
                results
            }
            Err(e) => {
                warn!(
                    error = %e,
                    transport = e.is_transport(),
                    "Web search failed, continuing without results"
                );
                Vec::new()
            }
        }
    }

    /// Answer one user turn.
    ///
    /// Consumes the incoming state and returns it extended by exactly one turn.
    /// Only a generation failure is an error; no partial state is returned then.
    #[instrument(skip_all, fields(template = tracing::field::Empty))]
    pub async fn run(&self, state: ConversationState) -> Result<TurnOutcome, PipelineError> {
        debug!(stage = %Stage::Start, history_len = state.history.len(), "Starting turn");

        let template = router::route(&state.input);
        tracing::Span::current().record("template", template.name());
        debug!(stage = %Stage::Routed, template = %template, "Routed request");

        let topic = composer::topic_for(template, &state);
        let query = composer::search_query(template, topic, self.settings.search_year);
        let results = self.gather_results(&query).await;
        debug!(stage = %Stage::Searched, query = %query, "Search stage finished");

        let prompt = composer::compose(template, topic, &state, &results);
        debug!(stage = %Stage::Prompted, prompt_len = prompt.len(), "Prompt composed");

        let raw = self
            .providers
            .generator
            .generate(&prompt)
            .await
            .map_err(PipelineError::Generation)?;
        debug!(
            stage = %Stage::Generated,
            provider = self.providers.generator.provider_name(),
            model = %self.providers.generator.model_name(),
            raw_len = raw.len(),
            "Model replied"
        );

        let sanitized = finalizer::sanitize(&raw);
        debug!(stage = %Stage::Sanitized, "Reply sanitized");

        let citations = finalizer::collect_citations(&results);
        let mut response = sanitized;
        response.push_str(&finalizer::render_sources(&citations));
        debug!(stage = %Stage::Cited, sources = citations.len(), "Sources appended");

        let state = state.extended(ConversationTurn::new(
            self.settings.ai_role.clone(),
            response.clone(),
        ));
        info!(stage = %Stage::Done, template = %template, "Turn completed");

        Ok(TurnOutcome {
            template,
            response,
            citations,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consult_core::ConsultResult;
    use std::sync::Mutex;

    /// Returns canned results and remembers the queries it saw
    struct FakeSearch {
        results: Vec<SearchItem>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeSearch {
        fn new(results: Vec<SearchItem>) -> Arc<Self> {
            Arc::new(Self {
                results,
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for FakeSearch {
        async fn search(&self, query: &str) -> ConsultResult<Vec<SearchItem>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.results.clone())
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchClient for BrokenSearch {
        async fn search(&self, _query: &str) -> ConsultResult<Vec<SearchItem>> {
            Err(ConsultError::RequestError("connection refused".to_string()))
        }

        fn provider_name(&self) -> &'static str {
            "broken"
        }
    }

    /// Replies with a fixed text and remembers the prompts it saw
    struct FakeGenerator {
        reply: ConsultResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(ConsultError::HttpError {
                    status_code: 429,
                    message: "quota exceeded".to_string(),
                }),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LLMClient for FakeGenerator {
        async fn generate(&self, prompt: &str) -> ConsultResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(ConsultError::ApiError(e.to_string())),
            }
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }

        fn model_name(&self) -> String {
            "fake-model".to_string()
        }
    }

    fn pipeline(generator: Arc<FakeGenerator>, search: Option<Arc<dyn SearchClient>>) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Providers { generator, search },
            PipelineSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_swot_end_to_end() {
        let search = FakeSearch::new(vec![SearchItem::new("http://x", "Acme news")]);
        let generator = FakeGenerator::replying("# SWOT\nStrength: leadership [1]");
        let pipeline = pipeline(generator.clone(), Some(search.clone()));

        let state = ConversationState::new(vec![], "Give me a SWOT analysis of Acme Corp");
        let outcome = pipeline.run(state).await.unwrap();

        assert_eq!(outcome.template, AnalysisTemplate::Swot);
        assert_eq!(
            outcome.response,
            "# SWOT\nStrength: leadership [1]\n\n### Sources\n1. [Acme news](http://x)"
        );
        assert_eq!(outcome.citations.len(), 1);
        assert_eq!(
            search.queries(),
            vec!["SWOT analysis of Give me a SWOT analysis of Acme Corp 2025"]
        );
        assert!(generator.last_prompt().contains("[1] Acme news"));
    }

    #[tokio::test]
    async fn test_history_gains_exactly_one_turn() {
        let generator = FakeGenerator::replying("Hi there!");
        let pipeline = pipeline(generator, None);

        let state = ConversationState::new(vec![ConversationTurn::new("system", "hi")], "hello");
        let outcome = pipeline.run(state).await.unwrap();

        assert_eq!(outcome.template, AnalysisTemplate::General);
        assert_eq!(outcome.state.history.len(), 2);
        assert_eq!(outcome.state.history[0], ConversationTurn::new("system", "hi"));
        let last = outcome.state.history.last().unwrap();
        assert_eq!(last.role, pipeline.settings().ai_role);
        assert_eq!(last.text, "Hi there!");
    }

    #[tokio::test]
    async fn test_custom_ai_role() {
        let pipeline = AnalysisPipeline::new(
            Providers {
                generator: FakeGenerator::replying("ok"),
                search: None,
            },
            PipelineSettings {
                ai_role: "assistant".to_string(),
                search_year: 2025,
            },
        );
        let outcome = pipeline.run(ConversationState::new(vec![], "hello")).await.unwrap();
        assert_eq!(outcome.state.history[0].role, "assistant");
    }

    #[tokio::test]
    async fn test_swot_searches_previous_turn() {
        let search = FakeSearch::new(vec![]);
        let pipeline = pipeline(FakeGenerator::replying("report"), Some(search.clone()));

        let state = ConversationState::new(
            vec![ConversationTurn::new("human", "Tesla")],
            "do a swot on that",
        );
        pipeline.run(state).await.unwrap();
        assert_eq!(search.queries(), vec!["SWOT analysis of Tesla 2025"]);
    }

    #[tokio::test]
    async fn test_porter_and_general_search_current_input() {
        let search = FakeSearch::new(vec![]);
        let pipeline = pipeline(FakeGenerator::replying("report"), Some(search.clone()));
        let history = vec![ConversationTurn::new("human", "Tesla")];

        pipeline
            .run(ConversationState::new(history.clone(), "porter for airlines"))
            .await
            .unwrap();
        pipeline
            .run(ConversationState::new(history, "what about pricing?"))
            .await
            .unwrap();

        assert_eq!(
            search.queries(),
            vec![
                "Porter's Five Forces analysis of porter for airlines 2025",
                "what about pricing?",
            ]
        );
    }

    #[tokio::test]
    async fn test_search_failure_is_absorbed() {
        let generator = FakeGenerator::replying("```markdown\n# PESTLE\nBody\n```");
        let pipeline = pipeline(generator.clone(), Some(Arc::new(BrokenSearch)));

        let outcome = pipeline
            .run(ConversationState::new(vec![], "pestle of the EU"))
            .await
            .unwrap();
        assert_eq!(outcome.response, "# PESTLE\nBody");
        assert!(outcome.citations.is_empty());
        assert!(generator.last_prompt().contains(composer::EMPTY_RESULTS_MARKER));
    }

    #[tokio::test]
    async fn test_generation_failure_is_fatal() {
        let search = FakeSearch::new(vec![SearchItem::new("http://x", "X")]);
        let pipeline = pipeline(FakeGenerator::failing(), Some(search));

        let result = pipeline
            .run(ConversationState::new(vec![], "swot of Acme"))
            .await;
        assert!(matches!(result, Err(PipelineError::Generation(_))));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Start.to_string(), "start");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
