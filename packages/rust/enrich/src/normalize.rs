//! Entity-name normalization for enrichment lookups.
//!
//! Raw names arrive with underscores, stray whitespace, and inconsistent
//! casing. Normalization produces the key used both for the shared cache and
//! for the remote lookup query.

/// Common raw spellings mapped to the names the lookup service recognizes.
/// Keys are upper-case; matching is exact first, then longest-prefix.
const ALIASES: &[(&str, &str)] = &[
    ("AUSTRALIA", "Australia"),
    ("BRAZIL", "Brazil"),
    ("CANADA", "Canada"),
    ("CHINA", "China"),
    ("FRANCE", "France"),
    ("GERMANY", "Germany"),
    ("INDIA", "India"),
    ("INDONESIA", "Indonesia"),
    ("ITALY", "Italy"),
    ("JAPAN", "Japan"),
    ("MEXICO", "Mexico"),
    ("PORTUGAL", "Portugal"),
    ("RUSSIA", "Russia"),
    ("SAUDI ARABIA", "Saudi Arabia"),
    ("SOUTH KOREA", "South Korea"),
    ("SPAIN", "Spain"),
    ("TURKEY", "Turkey"),
    ("UNITED STATES", "United States"),
    ("USA", "United States"),
];

/// Normalize a raw entity name into the canonical lookup key.
///
/// Steps: trim, separators → spaces, expand a leading `St.`/`St` abbreviation
/// to `Saint`, then resolve through the alias table (exact match, then
/// longest-prefix match), falling back to title-casing each token.
pub fn normalize(raw: &str) -> String {
    let cleaned = raw.trim().replace('_', " ");
    let cleaned = cleaned.trim();
    let upper = expand_abbreviations(&cleaned.to_uppercase());

    // Exact alias match.
    if let Some((_, canonical)) = ALIASES.iter().find(|(key, _)| *key == upper) {
        return (*canonical).to_string();
    }

    // Longest-prefix partial match: the alias key must be a prefix of the
    // normalized input, or vice versa. Ties go to the longest key.
    let prefix_match = ALIASES
        .iter()
        .filter(|(key, _)| upper.starts_with(key) || key.starts_with(upper.as_str()))
        .max_by_key(|(key, _)| key.len());
    if let Some((_, canonical)) = prefix_match {
        return (*canonical).to_string();
    }

    title_case(&upper)
}

/// Expand a leading abbreviated `St.`/`St` token to `Saint`.
fn expand_abbreviations(upper: &str) -> String {
    if let Some(rest) = upper.strip_prefix("ST. ") {
        format!("SAINT {rest}")
    } else if let Some(rest) = upper.strip_prefix("ST ") {
        format!("SAINT {rest}")
    } else if let Some(rest) = upper.strip_prefix("ST.") {
        format!("SAINT{rest}")
    } else {
        upper.to_string()
    }
}

/// Title-case each whitespace-separated token.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_replaces_separators() {
        assert_eq!(normalize("  SOUTH_KOREA  "), "South Korea");
        assert_eq!(normalize("saudi_arabia"), "Saudi Arabia");
    }

    #[test]
    fn exact_alias_wins() {
        assert_eq!(normalize("USA"), "United States");
        assert_eq!(normalize("india"), "India");
    }

    #[test]
    fn prefix_match_falls_back_to_alias_table() {
        // "UNITED STATES OF AMERICA" is not in the table but shares the
        // "UNITED STATES" prefix.
        assert_eq!(normalize("United States of America"), "United States");
    }

    #[test]
    fn saint_abbreviation_expands() {
        assert_eq!(normalize("St. Lucia"), "Saint Lucia");
        assert_eq!(normalize("St Kitts"), "Saint Kitts");
        assert_eq!(normalize("st.lucia"), "Saintlucia");
    }

    #[test]
    fn unknown_names_are_title_cased() {
        assert_eq!(normalize("NEW ZEALAND"), "New Zealand");
        assert_eq!(normalize("cabo_verde"), "Cabo Verde");
    }

    #[test]
    fn idempotent_on_canonical_input() {
        assert_eq!(normalize("South Korea"), "South Korea");
        assert_eq!(normalize(&normalize("south_korea")), "South Korea");
    }
}
