use std::fmt;
use std::ops::{Add, Range};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Index of a node inside a [`Tree`]'s arena. It doubles as the node's identity:
/// quantifier clones get a fresh id even though they copy the original.
pub type NodeId = usize;

/// Named character sets usable through escapes and `#name#` class tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Alpha,
    Alphanum,
    Space,
    Breaker,
}

impl Class {
    pub fn contains(self, letter: char) -> bool {
        match self {
            Class::Alpha => letter.is_ascii_alphabetic(),
            Class::Alphanum => letter.is_ascii_alphanumeric(),
            Class::Space => matches!(letter, ' ' | '\t'),
            Class::Breaker => matches!(letter, ' ' | '\n' | '\t'),
        }
    }
}

/// What a value node tests the current letter against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Char(char),
    /// Anything but a newline.
    Any,
    /// Inclusive range of code points, e.g. `a-z`.
    Range(char, char),
    Class(Class),
}

impl Value {
    /// Look up a class keyword as written between `#` signs in a character class.
    pub fn from_keyword(name: &str) -> Option<Value> {
        let value = match name {
            "any" => Value::Any,
            "alpha" => Value::Class(Class::Alpha),
            "alphanum" => Value::Class(Class::Alphanum),
            "space" => Value::Class(Class::Space),
            "breaker" => Value::Class(Class::Breaker),
            _ => return None,
        };
        Some(value)
    }

    fn test(self, letter: char) -> bool {
        match self {
            Value::Char(c) => c == letter,
            Value::Any => letter != '\n',
            Value::Range(lo, hi) => (lo..=hi).contains(&letter),
            Value::Class(class) => class.contains(letter),
        }
    }
}

/// Reference to a tree supplied by the caller at match time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    target: String,
    name: Option<String>,
}

impl Link {
    /// An empty target can never resolve, so it is rejected here rather than
    /// when the link is first walked.
    pub fn new(target: impl Into<String>, name: Option<String>) -> Result<Link> {
        let target = target.into();
        if target.is_empty() {
            return Err(Error::EmptyLinkTarget);
        }
        Ok(Link { target, name })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Value(Value),
    /// Epsilon node: matches the empty string and merges branches.
    Join,
    /// Sub-expression boundary, optionally capturing what `root` consumed.
    Tree { root: NodeId, name: Option<String> },
    Link(Link),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: Kind,
    pub negate: bool,
    pub branches: Vec<NodeId>,
    /// New branches go to the front instead of the back (non-greedy order).
    pub reverse: bool,
    /// Owning node, only meaningful while compiling.
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    pub fn new(kind: Kind) -> Self {
        Node {
            kind,
            negate: false,
            branches: Vec::new(),
            reverse: false,
            parent: None,
        }
    }

    pub fn value(value: Value, negate: bool) -> Self {
        Node {
            negate,
            ..Node::new(Kind::Value(value))
        }
    }

    pub fn join() -> Self {
        Node::new(Kind::Join)
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, Kind::Value(_))
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, Kind::Join)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether `letter` satisfies this node's own value. Joins, trees and links
    /// have no value of their own and always do.
    ///
    /// A negated `any` matches nothing at all.
    pub fn equals(&self, letter: char) -> bool {
        match self.kind {
            Kind::Value(Value::Any) => !self.negate && Value::Any.test(letter),
            Kind::Value(value) => value.test(letter) != self.negate,
            Kind::Join | Kind::Tree { .. } | Kind::Link(_) => true,
        }
    }
}

/// A compiled pattern: an arena of nodes whose root is a [`Kind::Tree`]
/// wrapping the pattern's first `Join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pattern: String,
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub(crate) fn new(pattern: impl Into<String>, nodes: Vec<Node>, root: NodeId) -> Self {
        Tree {
            pattern: pattern.into(),
            nodes,
            root,
        }
    }

    pub fn compile(pattern: &str) -> Result<Tree> {
        crate::parser::compile(pattern)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node a walk over this tree starts from.
    pub fn entry(&self) -> NodeId {
        match self.nodes[self.root].kind {
            Kind::Tree { root, .. } => root,
            _ => self.root,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }
}

impl FromStr for Tree {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Tree> {
        Tree::compile(pattern)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({})", self.pattern)
    }
}

/// Half-open range of character indices found while scanning pattern text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn with_length(start: usize, length: usize) -> Self {
        Span::new(start, start + length)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Offset both bounds.
impl Add<usize> for Span {
    type Output = Span;

    fn add(self, offset: usize) -> Span {
        Span::new(self.start + offset, self.end + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_excludes_newline() {
        let any = Node::value(Value::Any, false);
        assert!(any.equals('x'));
        assert!(any.equals(' '));
        assert!(!any.equals('\n'));
    }

    #[test]
    fn negated_any_matches_nothing() {
        let none = Node::value(Value::Any, true);
        assert!(!none.equals('x'));
        assert!(!none.equals('\n'));
    }

    #[test]
    fn ranges_are_inclusive_and_negatable() {
        let digit = Node::value(Value::Range('0', '9'), false);
        assert!(digit.equals('0'));
        assert!(digit.equals('9'));
        assert!(!digit.equals('a'));

        let not_digit = Node::value(Value::Range('0', '9'), true);
        assert!(not_digit.equals('a'));
        assert!(!not_digit.equals('5'));
    }

    #[test]
    fn class_membership() {
        assert!(Class::Alpha.contains('Q'));
        assert!(!Class::Alpha.contains('4'));
        assert!(Class::Alphanum.contains('4'));
        assert!(!Class::Alphanum.contains('_'));
        assert!(Class::Space.contains('\t'));
        assert!(!Class::Space.contains('\n'));
        assert!(Class::Breaker.contains('\n'));
    }

    #[test]
    fn literal_equality_xors_with_negation() {
        assert!(Node::value(Value::Char('a'), false).equals('a'));
        assert!(!Node::value(Value::Char('a'), true).equals('a'));
        assert!(Node::value(Value::Char('a'), true).equals('b'));
    }

    #[test]
    fn non_value_nodes_always_equal() {
        assert!(Node::join().equals('x'));
        let tree = Node::new(Kind::Tree { root: 0, name: None });
        assert!(tree.equals('x'));
    }

    #[test]
    fn keywords() {
        assert_eq!(Value::from_keyword("any"), Some(Value::Any));
        assert_eq!(Value::from_keyword("breaker"), Some(Value::Class(Class::Breaker)));
        assert_eq!(Value::from_keyword("digits"), None);
    }

    #[test]
    fn empty_link_target_is_rejected() {
        assert_eq!(Link::new("", None), Err(Error::EmptyLinkTarget));
        let link = Link::new("name", Some("who".into())).unwrap();
        assert_eq!(link.target(), "name");
        assert_eq!(link.name(), Some("who"));
    }

    #[test]
    fn span_offsets() {
        let span = Span::with_length(2, 3);
        assert_eq!(span, Span::new(2, 5));
        assert_eq!(span.len(), 3);
        assert_eq!((span + 4).range(), 6..9);
    }
}
