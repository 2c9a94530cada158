//! Candidate extraction from unstructured text.
//!
//! Emails, phone numbers, tax identifiers and name-like spans are pulled out
//! with compiled patterns and normalized so the scoring layer can compare
//! them against registry values directly. Extraction is deliberately greedy:
//! every plausible candidate is returned and the scorer decides what counts.

use std::sync::OnceLock;

use regex::Regex;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email pattern")
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Nine-digit local numbers, optionally prefixed with an international
        // dialing code, with or without grouping spaces.
        Regex::new(r"(?:\+\d{1,3}[ ]?)?\b\d{3}[ ]?\d{3}[ ]?\d{3}\b")
            .expect("valid phone pattern")
    })
}

fn tax_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Bare eight-digit company registration numbers.
        Regex::new(r"\b\d{8}\b").expect("valid tax id pattern")
    })
}

fn vat_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // VAT identifiers carry a country prefix before the digits.
        Regex::new(r"\bCZ ?\d{8,10}\b").expect("valid vat id pattern")
    })
}

fn labeled_tax_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:ičo|ico|dič|dic)\s*:?\s*(CZ ?\d{8,10}|\d{8,10})")
            .expect("valid labeled tax id pattern")
    })
}

fn labeled_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:client|customer|zákazník|odběratel)\s*:\s*([^\n\r;,]{2,80})")
            .expect("valid labeled name pattern")
    })
}

fn name_span_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Runs of two or more capitalized words. Single words are too noisy
        // to treat as name candidates.
        Regex::new(r"\b\p{Lu}\p{L}+(?:[ \t]+\p{Lu}\p{L}+)+").expect("valid name span pattern")
    })
}

/// Everything the patterns found in one piece of text.
///
/// Labeled values also appear in the corresponding flat list, so generic
/// scoring never has to consult the labeled variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedData {
    /// Lowercased email addresses.
    pub emails: Vec<String>,
    /// Phone numbers with grouping spaces removed.
    pub phones: Vec<String>,
    /// Digit-only tax identifiers, country prefixes stripped.
    pub tax_ids: Vec<String>,
    /// Tax identifiers that appeared next to an explicit label.
    pub labeled_tax_ids: Vec<String>,
    /// Names captured after a client label, the strongest name signal.
    pub labeled_names: Vec<String>,
    /// Capitalized word runs, the weakest signal.
    pub name_spans: Vec<String>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.phones.is_empty()
            && self.tax_ids.is_empty()
            && self.labeled_names.is_empty()
            && self.name_spans.is_empty()
    }
}

/// Reduces a raw tax identifier to its digits so registry and extracted
/// values compare equal regardless of country prefix or spacing.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Runs every pattern over the text and returns all candidates in document
/// order, deduplicated per list.
pub fn extract_from_text(text: &str) -> ExtractedData {
    let mut data = ExtractedData::default();

    for matched in email_pattern().find_iter(text) {
        push_unique(&mut data.emails, normalize_email(matched.as_str()));
    }
    for matched in phone_pattern().find_iter(text) {
        push_unique(&mut data.phones, normalize_phone(matched.as_str()));
    }
    for captures in labeled_tax_id_pattern().captures_iter(text) {
        if let Some(value) = captures.get(1) {
            let normalized = normalize_tax_id(value.as_str());
            push_unique(&mut data.labeled_tax_ids, normalized.clone());
            push_unique(&mut data.tax_ids, normalized);
        }
    }
    for matched in vat_id_pattern().find_iter(text) {
        push_unique(&mut data.tax_ids, normalize_tax_id(matched.as_str()));
    }
    for matched in tax_id_pattern().find_iter(text) {
        push_unique(&mut data.tax_ids, normalize_tax_id(matched.as_str()));
    }
    for captures in labeled_name_pattern().captures_iter(text) {
        if let Some(value) = captures.get(1) {
            push_unique(&mut data.labeled_names, value.as_str().trim().to_string());
        }
    }
    for matched in name_span_pattern().find_iter(text) {
        push_unique(&mut data.name_spans, matched.as_str().trim().to_string());
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_emails_and_phones() {
        let data = extract_from_text(
            "Kontakt: jan.novak@example.cz, tel. +420 777 123 456 nebo 602555333.",
        );

        assert_eq!(data.emails, vec!["jan.novak@example.cz"]);
        assert_eq!(data.phones, vec!["+420777123456", "602555333"]);
    }

    #[test]
    fn extracts_and_normalizes_tax_ids() {
        let data = extract_from_text("Dodavatel IČO: 12345678, DIČ: CZ12345678, odběratel 87654321.");

        assert_eq!(data.labeled_tax_ids, vec!["12345678"]);
        assert_eq!(data.tax_ids, vec!["12345678", "87654321"]);
    }

    #[test]
    fn vat_prefix_is_stripped_without_a_label() {
        let data = extract_from_text("Reference CZ87654321 na smlouvě.");

        assert_eq!(data.tax_ids, vec!["87654321"]);
    }

    #[test]
    fn captures_labeled_client_names() {
        let data = extract_from_text("Zákazník: Novák Consulting s.r.o.\nIČO: 11122233");

        assert_eq!(data.labeled_names, vec!["Novák Consulting s.r.o."]);
        assert_eq!(data.labeled_tax_ids, vec!["11122233"]);
    }

    #[test]
    fn name_spans_require_two_capitalized_words() {
        let data = extract_from_text("Fakturujeme za Alfa Trading podle objednávky. Platba ihned.");

        assert!(data.name_spans.contains(&"Alfa Trading".to_string()));
        assert!(!data.name_spans.iter().any(|n| n == "Platba"));
    }

    #[test]
    fn nine_digit_numbers_are_not_tax_ids() {
        let data = extract_from_text("Volejte 777123456, IČO 12345678.");

        assert_eq!(data.phones, vec!["777123456"]);
        assert_eq!(data.tax_ids, vec!["12345678"]);
    }

    #[test]
    fn duplicate_candidates_collapse() {
        let data = extract_from_text("info@firma.cz psal, že info@firma.cz potvrdí.");

        assert_eq!(data.emails, vec!["info@firma.cz"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract_from_text("").is_empty());
    }
}
