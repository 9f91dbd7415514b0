//! The closed set of report templates a request can be routed to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An analytical report type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisTemplate {
    Swot,
    Pestle,
    Tows,
    Porter,
    Canvas,
    General,
}

/// Where a template takes the subject of its web search from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicSource {
    /// Text of the most recent prior turn
    PreviousTurn,
    /// The utterance currently being answered
    CurrentInput,
}

/// One named section of a fixed report outline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineSection {
    pub title: &'static str,
    pub guidance: &'static str,
}

const fn section(title: &'static str, guidance: &'static str) -> OutlineSection {
    OutlineSection { title, guidance }
}

const PORTER_OUTLINE: &[OutlineSection] = &[
    section("Introduction", "Briefly describe the company or industry and the market it competes in."),
    section("Competitive Rivalry", "Number and strength of competitors, market growth, differentiation. Rate: High/Medium/Low."),
    section("Threat of New Entrants", "Barriers to entry such as capital needs, regulation, brand loyalty and scale. Rate: High/Medium/Low."),
    section("Bargaining Power of Suppliers", "Supplier concentration, switching costs and input uniqueness. Rate: High/Medium/Low."),
    section("Bargaining Power of Buyers", "Buyer concentration, price sensitivity and switching costs. Rate: High/Medium/Low."),
    section("Threat of Substitutes", "Alternative products or services that meet the same need. Rate: High/Medium/Low."),
    section("Overall Assessment", "Summarize industry attractiveness given the five forces, with a summary table of ratings."),
    section("Strategic Recommendations", "Concrete actions to strengthen the competitive position against the strongest forces."),
];

const CANVAS_OUTLINE: &[OutlineSection] = &[
    section("Introduction", "Briefly describe the business and what it offers."),
    section("Customer Segments", "The groups of people or organizations the business serves."),
    section("Value Propositions", "The problems solved and needs satisfied for each segment."),
    section("Channels", "How the business reaches and delivers value to its customers."),
    section("Customer Relationships", "The type of relationship established with each segment."),
    section("Revenue Streams", "How and how much each segment pays, and the pricing mechanisms."),
    section("Key Resources", "The physical, intellectual, human and financial assets required."),
    section("Key Activities", "The most important things the business must do to operate."),
    section("Key Partnerships", "Suppliers and partners, and what they contribute. Rate dependency: High/Medium/Low."),
    section("Cost Structure", "The most significant costs and whether the model is cost or value driven."),
    section("Recommendations", "Opportunities to strengthen or evolve the business model."),
];

impl AnalysisTemplate {
    /// Every template, in declaration order
    pub const ALL: [AnalysisTemplate; 6] = [
        AnalysisTemplate::Swot,
        AnalysisTemplate::Pestle,
        AnalysisTemplate::Tows,
        AnalysisTemplate::Porter,
        AnalysisTemplate::Canvas,
        AnalysisTemplate::General,
    ];

    /// Lowercase tag, which is also the routing keyword
    pub fn name(self) -> &'static str {
        match self {
            AnalysisTemplate::Swot => "swot",
            AnalysisTemplate::Pestle => "pestle",
            AnalysisTemplate::Tows => "tows",
            AnalysisTemplate::Porter => "porter",
            AnalysisTemplate::Canvas => "canvas",
            AnalysisTemplate::General => "general",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AnalysisTemplate::Swot => "SWOT analysis",
            AnalysisTemplate::Pestle => "PESTLE analysis",
            AnalysisTemplate::Tows => "TOWS matrix analysis",
            AnalysisTemplate::Porter => "Porter's Five Forces analysis",
            AnalysisTemplate::Canvas => "Business Model Canvas",
            AnalysisTemplate::General => "general business consultation",
        }
    }

    /// Label used to qualify the web search query
    pub fn search_label(self) -> &'static str {
        match self {
            AnalysisTemplate::Swot => "SWOT",
            AnalysisTemplate::Pestle => "PESTLE",
            AnalysisTemplate::Tows => "TOWS matrix",
            AnalysisTemplate::Porter => "Porter's Five Forces",
            AnalysisTemplate::Canvas => "Business Model Canvas",
            AnalysisTemplate::General => "general",
        }
    }

    /// Whether the prompt asks for numbered `[N]` in-text citations
    pub fn supports_citations(self) -> bool {
        !matches!(self, AnalysisTemplate::General)
    }

    pub fn topic_source(self) -> TopicSource {
        match self {
            AnalysisTemplate::Swot | AnalysisTemplate::Pestle | AnalysisTemplate::Tows => {
                TopicSource::PreviousTurn
            }
            AnalysisTemplate::Porter | AnalysisTemplate::Canvas | AnalysisTemplate::General => {
                TopicSource::CurrentInput
            }
        }
    }

    /// Fixed section outline, for the templates that have one
    pub fn outline(self) -> Option<&'static [OutlineSection]> {
        match self {
            AnalysisTemplate::Porter => Some(PORTER_OUTLINE),
            AnalysisTemplate::Canvas => Some(CANVAS_OUTLINE),
            _ => None,
        }
    }

    /// One line describing what the report must cover
    pub(crate) fn scope(self) -> &'static str {
        match self {
            AnalysisTemplate::Swot => "Cover Strengths, Weaknesses, Opportunities and Threats, each as its own section.",
            AnalysisTemplate::Pestle => "Cover Political, Economic, Social, Technological, Legal and Environmental factors, each as its own section.",
            AnalysisTemplate::Tows => "Build the TOWS matrix: SO, WO, ST and WT strategies derived from the internal and external factors.",
            AnalysisTemplate::Porter => "Assess each of the five competitive forces shaping the industry.",
            AnalysisTemplate::Canvas => "Describe all nine building blocks of the business model.",
            AnalysisTemplate::General => "Answer the latest message directly, drawing on the conversation so far.",
        }
    }
}

impl fmt::Display for AnalysisTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
