//! Context Builder: assembles the numbered-citation context block handed
//! to the generator, and the parallel `SourceDocument` list returned to the
//! caller (§4.7).

use horei_core::domain::SOURCE_TEXT_DISPLAY_CAP;
use horei_core::{Candidate, ContextBlock, SourceDocument};

pub struct ContextBuilder;

impl ContextBuilder {
    /// Render the ordered candidate list into a single context string,
    /// blocks joined by a blank line, preserving fusion/rerank order as the
    /// citation numbering (§4.7: "citation numbers are positional, assigned
    /// after fusion/rerank ordering is final").
    pub fn build(candidates: &[Candidate]) -> String {
        candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                ContextBlock {
                    index: i + 1,
                    law_title: candidate.law_title.clone(),
                    article_title: candidate.article_title.clone(),
                    text: candidate.display_text().to_string(),
                }
                .render()
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn sources(candidates: &[Candidate]) -> Vec<SourceDocument> {
        candidates.iter().map(SourceDocument::from).collect()
    }
}
