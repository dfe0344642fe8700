mod error;
mod grammar;

pub use error::ParseError;

use crate::Expr;

/// Parse condition text into an unresolved [`Expr`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a well-formed condition.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::parse_condition
        .parse(input)
        .map_err(|e| ParseError::new(e.offset(), e.inner().to_string()))
}
