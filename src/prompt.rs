//! Prompt assembly.
//!
//! Rendering is a pure function of the retrieved chunks and the query: the
//! same inputs always produce byte-identical prompts.

use std::fmt::Write as _;

use crate::chunker::Chunk;

/// Default cap on recommendations per answer.
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 3;

/// Grounded recommendation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    max_recommendations: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
        }
    }
}

impl PromptTemplate {
    /// Template capping answers at `max_recommendations` (at least one).
    pub fn new(max_recommendations: usize) -> Self {
        Self {
            max_recommendations: max_recommendations.max(1),
        }
    }

    /// Recommendation cap.
    pub fn max_recommendations(&self) -> usize {
        self.max_recommendations
    }

    /// Renders the prompt. Chunks appear in the order given, separated by a
    /// blank line; the query is inserted verbatim.
    pub fn render(&self, chunks: &[Chunk], query: &str) -> String {
        let max = self.max_recommendations;
        let mut prompt = String::new();
        prompt.push_str(
            "You are a friendly and knowledgeable anime recommender. \
             Help the user discover anime they'll love.\n\n",
        );

        prompt.push_str("## Rules\n");
        prompt.push_str(
            "- Recommend ONLY anime that appear in the provided context. \
             Never invent or reference anime outside it.\n",
        );
        let _ = writeln!(
            prompt,
            "- If fewer than {max} anime in the context are a good fit, recommend only the ones \
             that genuinely match. Quality beats quantity."
        );
        prompt.push_str(
            "- Rank recommendations by how closely they match the user's preferences \
             (best match first).\n",
        );
        prompt.push_str(
            "- Do NOT mention, discuss, or explain why you excluded any anime. \
             Only talk about the ones you are recommending.\n",
        );
        prompt.push_str(
            "- Never reveal that you are working from a provided context or list. \
             Respond as if you naturally know these recommendations.\n",
        );
        prompt.push_str(
            "- If the user's message is not about anime (e.g. greetings, off-topic), \
             respond warmly and guide them toward sharing their anime preferences.\n\n",
        );

        prompt.push_str("## Context\n");
        prompt.push_str("Each entry below contains a Title, Genres, and Synopsis.\n\n");
        prompt.push_str(&render_context(chunks));
        prompt.push_str("\n\n");

        prompt.push_str("## User's Request\n");
        prompt.push_str(query);
        prompt.push_str("\n\n");

        prompt.push_str("## Response Format\n");
        let _ = writeln!(
            prompt,
            "Return up to {max} recommendations as a numbered list. \
             For each, use exactly this format:\n"
        );
        prompt.push_str("1. **Title**\n");
        prompt.push_str("   - **Genres:** the genres listed in the context\n");
        prompt.push_str(
            "   - **Synopsis:** a concise 1-2 sentence plot summary based on the context\n",
        );
        prompt.push_str(
            "   - **Why you'll love it:** a short, personalized explanation connecting \
             this anime to what the user asked for\n\n",
        );
        prompt.push_str(
            "If nothing in the context is a good match, say so honestly and suggest the user \
             try rephrasing or describing their preferences differently.",
        );
        prompt
    }
}

/// Renders with the default template.
pub fn render(chunks: &[Chunk], query: &str) -> String {
    PromptTemplate::default().render(chunks, query)
}

/// Chunk texts in retrieval order, separated by a blank line.
pub fn render_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkMetadata;

    fn chunk(text: &str, row: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: "clean.csv".into(),
                row,
            },
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let chunks = vec![chunk("Title: Naruto", 0), chunk("Title: Bleach", 1)];
        assert_eq!(render(&chunks, "ninja"), render(&chunks, "ninja"));
    }

    #[test]
    fn context_keeps_retrieval_order_and_query_is_verbatim() {
        let chunks = vec![chunk("Title: Monster", 0), chunk("Title: Mushishi", 1)];
        let query = "something *dark*  \n with mystery";
        let prompt = render(&chunks, query);

        let context = prompt.find("## Context").unwrap();
        let monster = prompt.find("Title: Monster").unwrap();
        let mushishi = prompt.find("Title: Mushishi").unwrap();
        let request = prompt.find("## User's Request").unwrap();
        assert!(context < monster && monster < mushishi && mushishi < request);
        assert!(prompt.contains(&format!("## User's Request\n{query}\n\n")));
    }

    #[test]
    fn caps_recommendations() {
        let prompt = render(&[], "hello");
        assert!(prompt.contains("Return up to 3 recommendations"));
        assert!(PromptTemplate::new(5)
            .render(&[], "hello")
            .contains("Return up to 5 recommendations"));
        assert_eq!(PromptTemplate::new(0).max_recommendations(), 1);
    }

    #[test]
    fn states_grounding_rules() {
        let prompt = render(&[], "hello");
        assert!(prompt.contains("Recommend ONLY anime that appear in the provided context"));
        assert!(prompt.contains("Never reveal that you are working from a provided context"));
        assert!(prompt.contains("not about anime"));
        assert!(prompt.contains("**Why you'll love it:**"));
    }
}
