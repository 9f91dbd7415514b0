//! Routing of business questions to report templates, prompt construction,
//! and post-processing of the model's markdown reply.
//!
//! One call to [`AnalysisPipeline::run`] answers one user turn:
//! classify, search, prompt, generate, sanitize, cite.

pub mod composer;
pub mod finalizer;
pub mod pipeline;
pub mod router;
pub mod template;

pub use finalizer::{collect_citations, finalize, sanitize};
pub use pipeline::{AnalysisPipeline, PipelineError, PipelineSettings, Providers, Stage, TurnOutcome};
pub use router::route;
pub use template::{AnalysisTemplate, OutlineSection, TopicSource};
