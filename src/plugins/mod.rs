//! Corpus operations. Each module owns one command's semantics.

pub mod align;
pub mod audit;
pub mod campaign;
pub mod change_history;
pub mod freshness;
pub mod keywords;
pub mod validate;
