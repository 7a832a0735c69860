//! Friendlier wording for well-known backend error messages.
//!
//! The backend stays the authority on what failed; this table only rewrites
//! the text. Messages no pattern matches are shown as received.
use std::sync::LazyLock;

use regex::Regex;

pub const INSUFFICIENT_FUNDS: &str = "This account does not have enough funds for this operation.";
pub const INVALID_CREDENTIALS: &str = "Incorrect email or password.";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
pub const DUPLICATE: &str = "An item with the same name already exists.";
pub const CURRENCY_MISMATCH: &str = "Both sides of this operation must use the same currency.";
pub const ACCOUNT_HAS_TRANSACTIONS: &str =
    "This account still has transactions. Choose an account to move them to first.";
pub const BUDGET_EXCEEDED: &str = "This change would exceed the budget limit.";
pub const UNREACHABLE: &str = "We could not reach the server. Check your connection and try again.";

const PATTERNS: &[(&str, &str)] = &[
    (r"(?i)insufficient (funds|balance)", INSUFFICIENT_FUNDS),
    (r"(?i)invalid (credentials|email or password)", INVALID_CREDENTIALS),
    (
        r"(?i)(jwt|token) (expired|invalid)|session (has )?expired",
        SESSION_EXPIRED,
    ),
    (r"(?i)already exists|duplicate", DUPLICATE),
    (r"(?i)currency mismatch", CURRENCY_MISMATCH),
    (
        r"(?i)account (has|with) (existing )?transactions",
        ACCOUNT_HAS_TRANSACTIONS,
    ),
    (r"(?i)budget (limit )?exceeded", BUDGET_EXCEEDED),
    (
        r"(?i)unable to reach the backend|econnrefused|network error",
        UNREACHABLE,
    ),
];

static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .filter_map(|(pattern, friendly)| match Regex::new(pattern) {
            Ok(regex) => Some((regex, *friendly)),
            Err(err) => {
                tracing::error!("invalid message pattern {pattern}: {err}");
                None
            }
        })
        .collect()
});

/// First matching rule wins.
pub fn translate(message: &str) -> String {
    RULES
        .iter()
        .find(|(regex, _)| regex.is_match(message))
        .map_or_else(|| message.to_string(), |(_, friendly)| friendly.to_string())
}
