//! Customer identification over the tenant registry.
//!
//! Scoring is layered by signal strength. An exact tax identifier is
//! authoritative and short-circuits everything else; a known email address
//! is almost as strong; name similarity alone is capped well below both so
//! a fuzzy hit can never outrank a hard identifier. Uncertainty is part of
//! the contract: no candidate above the floor is an empty `Ok`, not an
//! error.

use serde::{Deserialize, Serialize};

use finsight_core::{CustomerId, EngineError, EngineResult, TenantId};
use finsight_ledger::{Customer, LedgerReader};

use crate::extract::{ExtractedData, extract_from_text, normalize_email, normalize_tax_id};

const EMAIL_CONFIDENCE: f64 = 0.9;
const SUGGEST_TOKEN_PREFIX_SCORE: f64 = 0.9;
const SUGGEST_FUZZY_WEIGHT: f64 = 0.8;
const SUGGEST_FUZZY_FLOOR: f64 = 0.6;

/// Knobs for scoring and autocomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Score floor applied when the caller does not supply one.
    pub min_confidence: f64,
    /// Ceiling for matches supported by name similarity alone.
    pub fuzzy_name_cap: f64,
    /// Name similarity below this is treated as no signal at all.
    pub name_similarity_floor: f64,
    /// Default cap on autocomplete suggestions.
    pub suggest_limit: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            fuzzy_name_cap: 0.7,
            name_similarity_floor: 0.55,
            suggest_limit: 10,
        }
    }
}

/// Which registry field produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    TaxId,
    Email,
    SenderEmail,
    Name,
}

/// One field-level piece of evidence behind a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedField {
    pub field: MatchField,
    /// The candidate as it was pulled out of the input.
    pub extracted: String,
    /// The registry value it was compared against.
    pub registry_value: String,
    pub score: f64,
}

/// One candidate customer with its evidence.
///
/// `confidence` is the maximum over `matched_fields`, never a sum, so
/// stacking weak signals cannot fabricate certainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerMatch {
    pub customer_id: CustomerId,
    pub display_name: String,
    pub confidence: f64,
    pub matched_fields: Vec<MatchedField>,
}

/// Autocomplete row for customer pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSuggestion {
    pub customer_id: CustomerId,
    pub display_name: String,
    pub score: f64,
}

/// Identifies customers from free text, emails and structured documents.
pub struct CustomerMatcher<L> {
    ledger: L,
    config: MatcherConfig,
}

impl<L: LedgerReader> CustomerMatcher<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_config(ledger, MatcherConfig::default())
    }

    pub fn with_config(ledger: L, config: MatcherConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Scores the tenant's customers against candidates extracted from
    /// free text, best first. An exact tax identifier returns that single
    /// customer at confidence 1.0 and nothing else.
    pub fn match_from_text(
        &self,
        tenant_id: TenantId,
        text: &str,
        min_confidence: Option<f64>,
    ) -> EngineResult<Vec<CustomerMatch>> {
        let floor = self.resolve_floor(min_confidence)?;
        if text.trim().is_empty() {
            return Err(EngineError::validation("text must not be empty"));
        }
        let extracted = extract_from_text(text);
        Ok(self.score_extracted(tenant_id, &extracted, false, floor))
    }

    /// Email variant: a sender address that equals a registry email is as
    /// unambiguous as a tax identifier and short-circuits body scoring.
    pub fn match_from_email(
        &self,
        tenant_id: TenantId,
        text: &str,
        sender_email: &str,
    ) -> EngineResult<Vec<CustomerMatch>> {
        let sender = normalize_email(sender_email);
        if sender.is_empty() && text.trim().is_empty() {
            return Err(EngineError::validation(
                "email matching needs a sender address or body text",
            ));
        }
        if !sender.is_empty() {
            let customers = self.ledger.customers(tenant_id);
            let known = customers
                .iter()
                .find(|c| c.email.as_deref().is_some_and(|e| normalize_email(e) == sender));
            if let Some(customer) = known {
                return Ok(vec![CustomerMatch {
                    customer_id: customer.id,
                    display_name: customer.display_name.clone(),
                    confidence: 1.0,
                    matched_fields: vec![MatchedField {
                        field: MatchField::SenderEmail,
                        extracted: sender,
                        registry_value: customer.email.clone().unwrap_or_default(),
                        score: 1.0,
                    }],
                }]);
            }
        }
        let extracted = extract_from_text(text);
        Ok(self.score_extracted(tenant_id, &extracted, false, self.config.min_confidence))
    }

    /// Document variant: values sitting next to an explicit label are
    /// authoritative, so when any labeled name is present the free-floating
    /// name spans are ignored entirely.
    pub fn match_from_document(
        &self,
        tenant_id: TenantId,
        text: &str,
    ) -> EngineResult<Vec<CustomerMatch>> {
        if text.trim().is_empty() {
            return Err(EngineError::validation("text must not be empty"));
        }
        let extracted = extract_from_text(text);
        Ok(self.score_extracted(tenant_id, &extracted, true, self.config.min_confidence))
    }

    /// Scores a string already known to be a name, skipping extraction.
    ///
    /// For structured sources that label the field themselves, e.g. the
    /// counterparty name on a bank transaction. Single lowercase words
    /// would never survive free-text extraction but are fine here.
    pub fn match_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
        min_confidence: Option<f64>,
    ) -> EngineResult<Vec<CustomerMatch>> {
        let floor = self.resolve_floor(min_confidence)?;
        if name.trim().is_empty() {
            return Err(EngineError::validation("name must not be empty"));
        }
        let extracted = ExtractedData {
            labeled_names: vec![name.trim().to_string()],
            ..ExtractedData::default()
        };
        Ok(self.score_extracted(tenant_id, &extracted, true, floor))
    }

    /// Exact registry lookup by normalized tax identifier. A miss is a
    /// legitimate answer, not an error.
    pub fn find_by_identifier(
        &self,
        tenant_id: TenantId,
        identifier: &str,
    ) -> EngineResult<Option<Customer>> {
        let normalized = normalize_tax_id(identifier);
        if normalized.is_empty() {
            return Err(EngineError::validation("identifier must contain digits"));
        }
        Ok(self
            .ledger
            .customers(tenant_id)
            .into_iter()
            .find(|c| c.tax_id.as_deref().is_some_and(|t| normalize_tax_id(t) == normalized)))
    }

    /// Autocomplete over active customers: whole-name prefix beats token
    /// prefix beats fuzzy similarity, ties break on name.
    pub fn suggest(
        &self,
        tenant_id: TenantId,
        query: &str,
        limit: Option<usize>,
    ) -> Vec<CustomerSuggestion> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let limit = limit.unwrap_or(self.config.suggest_limit);

        let mut suggestions: Vec<CustomerSuggestion> = Vec::new();
        for customer in self.ledger.customers(tenant_id) {
            if !customer.active {
                continue;
            }
            let mut best = 0.0_f64;
            for known in customer.known_names() {
                let name = known.to_lowercase();
                let score = if name.starts_with(&query) {
                    1.0
                } else if name
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|token| !token.is_empty() && token.starts_with(&query))
                {
                    SUGGEST_TOKEN_PREFIX_SCORE
                } else {
                    let similarity = strsim::jaro_winkler(&query, &name);
                    if similarity >= SUGGEST_FUZZY_FLOOR {
                        similarity * SUGGEST_FUZZY_WEIGHT
                    } else {
                        0.0
                    }
                };
                best = best.max(score);
            }
            if best > 0.0 {
                suggestions.push(CustomerSuggestion {
                    customer_id: customer.id,
                    display_name: customer.display_name,
                    score: best,
                });
            }
        }
        suggestions.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        suggestions.truncate(limit);
        suggestions
    }

    fn resolve_floor(&self, min_confidence: Option<f64>) -> EngineResult<f64> {
        match min_confidence {
            None => Ok(self.config.min_confidence),
            Some(floor) if (0.0..=1.0).contains(&floor) => Ok(floor),
            Some(_) => Err(EngineError::validation("min confidence must be within [0, 1]")),
        }
    }

    fn score_extracted(
        &self,
        tenant_id: TenantId,
        extracted: &ExtractedData,
        prefer_labeled: bool,
        floor: f64,
    ) -> Vec<CustomerMatch> {
        let customers = self.ledger.customers(tenant_id);

        // Labeled tax ids come first in extraction order, so documents get
        // their preference here for free.
        for candidate in &extracted.tax_ids {
            let exact = customers.iter().find(|c| {
                c.tax_id.as_deref().is_some_and(|t| normalize_tax_id(t) == *candidate)
            });
            if let Some(customer) = exact {
                return vec![CustomerMatch {
                    customer_id: customer.id,
                    display_name: customer.display_name.clone(),
                    confidence: 1.0,
                    matched_fields: vec![MatchedField {
                        field: MatchField::TaxId,
                        extracted: candidate.clone(),
                        registry_value: customer.tax_id.clone().unwrap_or_default(),
                        score: 1.0,
                    }],
                }];
            }
        }

        let name_candidates: Vec<&str> = if prefer_labeled && !extracted.labeled_names.is_empty() {
            extracted.labeled_names.iter().map(String::as_str).collect()
        } else {
            extracted
                .labeled_names
                .iter()
                .chain(extracted.name_spans.iter())
                .map(String::as_str)
                .collect()
        };

        let mut matches: Vec<CustomerMatch> = Vec::new();
        for customer in &customers {
            let mut fields: Vec<MatchedField> = Vec::new();

            if let Some(email) = &customer.email {
                let registry_email = normalize_email(email);
                if let Some(hit) = extracted.emails.iter().find(|e| **e == registry_email) {
                    fields.push(MatchedField {
                        field: MatchField::Email,
                        extracted: hit.clone(),
                        registry_value: email.clone(),
                        score: EMAIL_CONFIDENCE,
                    });
                }
            }

            if let Some(name_field) = self.best_name_field(customer, &name_candidates) {
                fields.push(name_field);
            }

            let confidence = fields.iter().map(|f| f.score).fold(0.0_f64, f64::max);
            if fields.is_empty() || confidence < floor {
                continue;
            }
            matches.push(CustomerMatch {
                customer_id: customer.id,
                display_name: customer.display_name.clone(),
                confidence,
                matched_fields: fields,
            });
        }

        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        matches
    }

    /// Best similarity of any extracted name candidate against any name the
    /// customer is known under, scaled into the fuzzy band.
    fn best_name_field(&self, customer: &Customer, candidates: &[&str]) -> Option<MatchedField> {
        let mut best: Option<MatchedField> = None;
        for candidate in candidates {
            for known in customer.known_names() {
                let similarity = name_similarity(candidate, known);
                if similarity < self.config.name_similarity_floor {
                    continue;
                }
                let score = similarity * self.config.fuzzy_name_cap;
                if best.as_ref().is_none_or(|f| score > f.score) {
                    best = Some(MatchedField {
                        field: MatchField::Name,
                        extracted: (*candidate).to_string(),
                        registry_value: known.to_string(),
                        score,
                    });
                }
            }
        }
        best
    }
}

/// Similarity in \[0, 1\] between two names, robust to legal-form suffixes
/// and word order via the token overlap component.
fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::jaro_winkler(&a, &b).max(token_overlap(&a, &b))
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let a_tokens = tokens(a);
    let b_tokens = tokens(b);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }
    let shared = a_tokens.intersection(&b_tokens).count() as f64;
    let total = a_tokens.union(&b_tokens).count() as f64;
    shared / total
}

/// Lowercased alphanumeric tokens of at least two characters; drops the
/// single letters of legal forms like "s.r.o.".
fn tokens(value: &str) -> std::collections::HashSet<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}
