use serde::{Deserialize, Serialize};

use finsight_core::CustomerId;

/// Ledger snapshot row: customer registry entry.
///
/// Created and maintained by the CRUD layer; read-only to this engine.
/// `tax_id` is stored normalized (digits only, e.g. an 8-digit national
/// business id) so identifier lookups are exact string compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    /// Known name variants (trade names, abbreviations) used for matching.
    pub aliases: Vec<String>,
    pub active: bool,
}

impl Customer {
    /// All names this customer is known under, display name first.
    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_starts_with_display_name() {
        let customer = Customer {
            id: CustomerId::new(),
            display_name: "Novák Consulting s.r.o.".to_string(),
            email: Some("info@novak.cz".to_string()),
            phone: None,
            tax_id: Some("12345678".to_string()),
            aliases: vec!["Novák Consulting".to_string(), "NovákC".to_string()],
            active: true,
        };
        let names: Vec<&str> = customer.known_names().collect();
        assert_eq!(
            names,
            vec!["Novák Consulting s.r.o.", "Novák Consulting", "NovákC"]
        );
    }
}
