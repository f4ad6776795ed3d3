//! A small backtracking pattern matcher.
//!
//! Patterns compile into a [`Tree`] of typed nodes, which a [`Matcher`] walks
//! against input, first match wins. Syntax:
//!
//! | Pattern | Meaning |
//! |---|---|
//! | `a` | the letter itself |
//! | `.` | any letter but newline |
//! | `\d \c \s \w \n` | digit, alpha, space, alphanumeric, newline; uppercase negates |
//! | `[abc] [a-z] [^...] [#alpha#]` | character class |
//! | `(...)` `(name:...)` `(name[]:...)` `(:...)` | group, optionally capturing |
//! | `(a\|b)` | alternation |
//! | `(^...)` | negated group |
//! | `{N}` `{N-M}` `{N-}` `{-M}` | repetition, `{%...}` for non-greedy |
//! | `* + ?` | zero or more, one or more, optional; a trailing `%` makes them non-greedy |
//! | `<target>` `<name:target>` `<^target>` | a linked tree, optionally captured or negated |

pub mod ast;
pub mod capture;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod scan;

pub use ast::{Class, Kind, Link, Node, NodeId, Span, Tree, Value};
pub use capture::{Capture, Groups, Match};
pub use error::{Error, Result, SyntaxError};
pub use matcher::{Links, Matcher};
pub use parser::{compile, Parser};

/// Whether `pattern` matches anywhere in `input`.
pub fn is_match(input: &str, pattern: &str) -> Result<bool> {
    let found = Matcher::new(pattern)?.search(input)?;
    Ok(found.is_match())
}
