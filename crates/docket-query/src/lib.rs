mod eval;
mod expression;
mod parse_filter;

pub use eval::{matches, resolve_path};
pub use expression::Expression;
pub use parse_filter::{FilterParseError, parse_filter};
