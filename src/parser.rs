//! Formula text parsing.
//!
//! The grammar accepts the operator spellings below, with parentheses for grouping. Binary
//! operators do not have precedence levels; nested binary operators on the left must be
//! parenthesized.
//!
//! | operator    | spellings                  |
//! | ----------- | -------------------------- |
//! | negation    | `!`, `not`                 |
//! | conjunction | `/\`, `&&`, `and`          |
//! | disjunction | `\/`, `\|\|`, `or`         |
//! | implication | `->`, `implies`            |
//! | next        | `X`, `()`, `next`          |
//! | weak next   | `W`, `weaknext`            |
//! | always      | `[]`, `G`, `always`        |
//! | eventually  | `<>`, `F`, `eventually`    |
//! | until       | `U`, `until`               |
//! | release     | `R`, `release`             |
//! | freeze      | `@ var`                    |
//! | constraint  | `{ var <= 3.0 }`           |
//!
//! `[]` and `<>` accept optional timing bounds written `{lower,upper}`, which are expanded into
//! the freeze/constraint encoding so that bounded operators ride on the same evaluation rules as
//! the rest of the logic. Any other identifier is a reference to a named predicate.

mod common;
mod errors;
mod formula;

pub use errors::ParseError;
pub use formula::parse_formula;
