//! # Core Module
//!
//! Configuration, error taxonomy and reply helpers shared by the dispatcher
//! and the built-in commands.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add error module with the dispatch error taxonomy
//! - 1.0.0: Environment config and reply chunking

pub mod config;
pub mod error;
pub mod response;

pub use config::{validate_prefix, Config, DispatchOptions, MAX_PREFIX_LEN};
pub use error::DispatchError;
pub use response::{chunk_for_message, chunk_text, truncate_chars, MESSAGE_LIMIT};
