//! `finsight-matching` — customer identification from free text, emails
//! and structured documents.

pub mod extract;
pub mod matcher;

pub use extract::{ExtractedData, extract_from_text, normalize_tax_id};
pub use matcher::{
    CustomerMatch, CustomerMatcher, CustomerSuggestion, MatchField, MatchedField, MatcherConfig,
};
