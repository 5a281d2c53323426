//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use logic_fabricator::{
    condition::Condition,
    properties::{Consequence, Statement},
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times — subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Parse `"NOT verb term term ..."` shorthand into a statement.
#[allow(dead_code)]
pub fn st(text: &str) -> Statement {
    let negated = text.starts_with("NOT ");
    let text = text.strip_prefix("NOT ").unwrap_or(text);
    let mut parts = text.split_whitespace();
    let verb = parts.next().expect("statement shorthand needs a verb");
    let statement = Statement::new(verb, parts.map(str::to_string).collect());
    if negated {
        statement.negate()
    } else {
        statement
    }
}

/// Parse the same shorthand into a leaf condition.
#[allow(dead_code)]
pub fn leaf(text: &str) -> Condition {
    let negated = text.starts_with("NOT ");
    let text = text.strip_prefix("NOT ").unwrap_or(text);
    let mut parts = text.split_whitespace();
    let verb = parts.next().expect("condition shorthand needs a verb");
    Condition::leaf(verb, parts.map(str::to_string).collect(), negated)
}

/// A statement consequence from the same shorthand.
#[allow(dead_code)]
pub fn derive(text: &str) -> Consequence {
    Consequence::Statement(st(text))
}
