//! Shared primitives: the front-matter codec, scanner, phase catalogue,
//! durable writes, and the per-file pass runner every command builds on.

pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod interrupt;
pub mod output;
pub mod pass;
pub mod phase;
pub mod scanner;
pub mod store;
pub mod time;
