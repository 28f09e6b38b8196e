// Core types and pure helpers shared by the stores and services

pub mod presentation_key;
pub mod timestamps;

// Re-export commonly used types
pub use presentation_key::{legacy_conference_id, PresentationKey};
pub use timestamps::{format_human, now_rfc3339, parse_timestamp, to_rfc3339, today_iso_date};
