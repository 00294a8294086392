//! Application services.

pub mod tagger;
