// Presentation Keys - identifiers used to join ratings to conferences
// Ratings written by the mobile client carry one of these in `presentationId`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder the mobile client uses when a session has no date.
const UNKNOWN_DATE: &str = "unknown";

/// A key that identifies one presentation for rating joins.
///
/// Two shapes exist side by side: the key derived from the conference's
/// mutable fields (what older ratings carry) and the stable key assigned once
/// when the conference is first saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresentationKey(String);

impl PresentationKey {
    /// Derive the key from a conference and its program date.
    ///
    /// `"{title}_{presenter}_{start}_{date}"`, whitespace replaced with `_`,
    /// `:` and `-` removed, lower-cased.
    pub fn derive(title: &str, presenter: &str, start: &str, date: &str) -> Self {
        let date = if date.is_empty() { UNKNOWN_DATE } else { date };
        let raw = format!("{}_{}_{}_{}", title, presenter, start, date);
        Self(normalize(&raw))
    }

    /// Wrap a key read from a document (stable key or stored `presentationId`).
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh stable key for a new conference.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identifier of a conference by position inside its program.
pub fn legacy_conference_id(program_id: &str, index: usize) -> String {
    format!("{}_{}", program_id, index)
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != ':' && *c != '-')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for PresentationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PresentationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for PresentationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl AsRef<str> for PresentationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_matches_mobile_client_format() {
        let key = PresentationKey::derive(
            "Detection of Atherosclerosis",
            "Zahia Guessoum",
            "10:55",
            "2025-12-08",
        );
        assert_eq!(key.as_str(), "detection_of_atherosclerosis_zahia_guessoum_1055_20251208");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = PresentationKey::derive("AI Ethics", "Dr. Amina", "09:00", "2025-12-09");
        let b = PresentationKey::derive("AI Ethics", "Dr. Amina", "09:00", "2025-12-09");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_is_idempotent() {
        let once = PresentationKey::derive("Deep-Learning: Basics", "Sarah  Mekki", "14:30", "2025-12-08");
        let again = normalize(once.as_str());
        assert_eq!(once.as_str(), again);
    }

    #[test]
    fn test_missing_date_uses_placeholder() {
        let key = PresentationKey::derive("Talk", "Someone", "10:00", "");
        assert!(key.as_str().ends_with("_unknown"));
    }

    #[test]
    fn test_tabs_and_newlines_become_underscores() {
        let key = PresentationKey::derive("A\tB", "C\nD", "", "2025-01-01");
        assert_eq!(key.as_str(), "a_b_c_d__20250101");
    }

    #[test]
    fn test_legacy_conference_id() {
        assert_eq!(legacy_conference_id("prog42", 3), "prog42_3");
    }

    #[test]
    fn test_generated_keys_are_unique() {
        assert_ne!(PresentationKey::generate(), PresentationKey::generate());
    }
}
