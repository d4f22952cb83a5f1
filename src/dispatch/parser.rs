//! Invocation parsing
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use super::prefix::PrefixBinding;

/// A message that looks like a command call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub prefix: String,
    /// May be empty when the message is just the prefix
    pub invoke_name: String,
    pub arguments: Vec<String>,
}

/// Split `text` into invoke name and arguments if it starts with a prefix
///
/// Returns `None` when neither prefix matches. The invoke name is the first
/// whitespace-delimited token with the matched prefix cut off; the remaining
/// tokens are the arguments, in order.
pub fn parse_invocation(
    text: &str,
    binding: &PrefixBinding,
    case_insensitive: bool,
) -> Option<Invocation> {
    let prefix = binding.matched(text)?;

    let mut tokens = text.split_whitespace();
    let first = tokens.next().unwrap_or("");
    let name = first.get(prefix.len()..).unwrap_or("");
    let invoke_name = if case_insensitive {
        name.to_lowercase()
    } else {
        name.to_string()
    };

    Some(Invocation {
        prefix: prefix.to_string(),
        invoke_name,
        arguments: tokens.map(str::to_string).collect(),
    })
}
