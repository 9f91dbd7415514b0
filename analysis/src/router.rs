use crate::template::AnalysisTemplate;

/// Keywords tested in this order; the first one found anywhere in the input wins.
const ROUTES: [(&str, AnalysisTemplate); 5] = [
    ("swot", AnalysisTemplate::Swot),
    ("pestle", AnalysisTemplate::Pestle),
    ("tows", AnalysisTemplate::Tows),
    ("porter", AnalysisTemplate::Porter),
    ("canvas", AnalysisTemplate::Canvas),
];

/// Pick the report template for a user utterance.
///
/// Matching is a case-insensitive substring test against the keyword table.
/// When several keywords occur, table order decides, not position in the text.
/// Anything unmatched, including empty input, is `General`.
pub fn route(input: &str) -> AnalysisTemplate {
    let lowered = input.to_lowercase();
    ROUTES
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, template)| *template)
        .unwrap_or(AnalysisTemplate::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keyword_is_general() {
        assert_eq!(route(""), AnalysisTemplate::General);
        assert_eq!(route("How are you?"), AnalysisTemplate::General);
        assert_eq!(route("Tell me about Acme's market strategy"), AnalysisTemplate::General);
    }

    #[test]
    fn test_single_keyword_any_case() {
        assert_eq!(route("Give me a SWOT analysis"), AnalysisTemplate::Swot);
        assert_eq!(route("swot please"), AnalysisTemplate::Swot);
        assert_eq!(route("PESTLE for the UK energy sector"), AnalysisTemplate::Pestle);
        assert_eq!(route("build a Tows matrix"), AnalysisTemplate::Tows);
        assert_eq!(route("Porter's five forces of airlines"), AnalysisTemplate::Porter);
        assert_eq!(route("business model CANVAS for Spotify"), AnalysisTemplate::Canvas);
    }

    #[test]
    fn test_keyword_inside_words() {
        assert_eq!(route("the reporter asked"), AnalysisTemplate::Porter);
        assert_eq!(route("towsend industries"), AnalysisTemplate::Tows);
    }

    #[test]
    fn test_declaration_order_beats_text_position() {
        assert_eq!(route("pestle and swot"), AnalysisTemplate::Swot);
        assert_eq!(route("canvas then tows"), AnalysisTemplate::Tows);
        assert_eq!(route("porter, canvas, pestle"), AnalysisTemplate::Pestle);
    }

    #[test]
    fn test_no_synonyms() {
        assert_eq!(route("strengths and weaknesses"), AnalysisTemplate::General);
        assert_eq!(route("five forces"), AnalysisTemplate::General);
    }
}
