// Shared building blocks for the consulting analysis service:
// - Conversation and search data model
// - Configuration loading
// - Shared error types
// - Generative text and web search clients

// Export types module - conversation state, search items, citations
pub mod types;
pub use types::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

// Export provider clients
pub mod llm;
pub use llm::{create_llm_client, GeminiClient, LLMClient, OllamaClient};

pub mod search;
pub use search::{create_search_client, SearchClient, TavilyClient};
