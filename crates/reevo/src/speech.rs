//! Shaping of text before it reaches text-to-speech.
pub mod markdown;
pub mod pronunciation;

pub use markdown::strip_markdown;
pub use pronunciation::Pronunciations;
