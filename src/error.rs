use thiserror::Error;

use crate::ast::NodeId;

/// Structural problems in pattern text. Compilation stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("unbalanced brackets: `{opener}` and `{closer}` do not pair up in {text:?}")]
    Unbalanced {
        opener: char,
        closer: char,
        text: String,
    },
    #[error("bad repetition value {0:?}")]
    BadRepetition(String),
    #[error("`{0}` has nothing to repeat")]
    DanglingQuantifier(char),
    #[error("pattern ends inside an escape")]
    TrailingEscape,
    #[error("unknown class name {0:?}")]
    UnknownClass(String),
}

impl SyntaxError {
    pub(crate) fn unbalanced(opener: char, closer: char, text: &[char]) -> Self {
        SyntaxError::Unbalanced {
            opener,
            closer,
            text: text.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("link {0:?} is not in the link table")]
    UnresolvedLink(String),
    /// Never surfaced by compilation: groups with a bad name are left unnamed.
    #[error("invalid capture name {0:?}")]
    InvalidCaptureName(String),
    #[error("a link needs a target name")]
    EmptyLinkTarget,
    #[error("node {0} is not part of the tree")]
    UnknownNode(NodeId),
}

impl Error {
    pub fn is_syntax(&self) -> bool {
        matches!(self, Error::Syntax(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
