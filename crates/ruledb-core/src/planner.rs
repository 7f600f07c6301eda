//! Expands one user query into the retrieval query variants.

use serde::Serialize;

use crate::keywords::KeywordExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// The user's query verbatim.
    Original,
    /// Extracted keywords joined by spaces.
    Keywords,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryVariant {
    pub text: String,
    pub kind: VariantKind,
}

#[derive(Debug, Clone, Default)]
pub struct QueryPlanner {
    extractor: KeywordExtractor,
}

impl QueryPlanner {
    pub fn new(extractor: KeywordExtractor) -> Self {
        Self { extractor }
    }

    /// Variant 0 is always the original query.
    pub fn plan(&self, query: &str) -> Vec<QueryVariant> {
        let mut variants = vec![QueryVariant { text: query.to_string(), kind: VariantKind::Original }];
        let keywords = self.extractor.extract(query);
        if !keywords.is_empty() {
            variants.push(QueryVariant { text: keywords.join(" "), kind: VariantKind::Keywords });
        }
        variants
    }
}
