//! Output formatters for command results.
//!
//! - [`text`]: human-readable listings with sizes rendered by `bytesize`
//! - [`json`]: machine-readable documents for scripting
//!
//! Both write to any [`std::io::Write`], so tests render into a `Vec<u8>`.

pub mod json;
pub mod text;

pub use json::JsonOutput;
