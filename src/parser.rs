use std::mem;

use log::{debug, trace};

use crate::ast::{Class, Kind, Link, Node, NodeId, Tree, Value};
use crate::error::{Error, Result, SyntaxError};
use crate::scan;

/// Upper bound used for open-ended repetitions such as `{2-}`.
pub const OPEN_REPEAT_LIMIT: usize = 1094;

/// Compile `pattern` into a [`Tree`].
pub fn compile(pattern: &str) -> Result<Tree> {
    Parser::new(pattern).parse()
}

/// Parser for patterns.
///
/// The `Parser` builds the node arena and numbers anonymous capture groups.
/// Numbering restarts on every call to [`Parser::parse`].
pub struct Parser<'a> {
    pub pattern: &'a str,
    nodes: Vec<Node>,
    next_group_id: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given pattern.
    pub fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            nodes: Vec::new(),
            next_group_id: 0,
        }
    }

    /// Allocate the name of the next anonymous capture group.
    fn alloc_group_id(&mut self) -> usize {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    /// Entry point: compile the whole pattern.
    ///
    /// The result's root is a `Tree` node around the pattern's first `Join`.
    pub fn parse(&mut self) -> Result<Tree> {
        self.nodes.clear();
        self.next_group_id = 0;
        let expr: Vec<char> = self.pattern.chars().collect();
        let base = self.parse_seq(&expr)?;
        let root = self.push(Node::new(Kind::Tree {
            root: base,
            name: None,
        }));
        debug!("compiled {:?} into {} nodes", self.pattern, self.nodes.len());
        Ok(Tree::new(self.pattern, mem::take(&mut self.nodes), root))
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn join(&mut self) -> NodeId {
        self.push(Node::join())
    }

    /// Attach `child` as a branch of `parent`: at the back, or at the front when
    /// the parent is reversed. `flip` swaps the two ends.
    fn attach(&mut self, parent: NodeId, child: NodeId, flip: bool) {
        if parent != child {
            self.nodes[child].parent = Some(parent);
        }
        let node = &mut self.nodes[parent];
        if node.reverse ^ flip {
            node.branches.insert(0, child);
        } else {
            node.branches.push(child);
        }
    }

    fn add(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, false);
    }

    /// Give `parent` an exit that skips its newest branch.
    fn insert_exit(&mut self, parent: NodeId, exit: NodeId, front: bool) {
        let branches = &mut self.nodes[parent].branches;
        if front {
            branches.insert(0, exit);
        } else {
            branches.push(exit);
        }
    }

    /// The parent of a quantifier's operand. Plain joins have nothing to repeat.
    fn operand_parent(&self, node: NodeId, quantifier: char) -> Result<NodeId> {
        let operand = &self.nodes[node];
        match operand.parent {
            Some(parent) if !operand.is_join() => Ok(parent),
            _ => Err(SyntaxError::DanglingQuantifier(quantifier).into()),
        }
    }

    /// Parse a sequence and return the `Join` it hangs from.
    ///
    /// Example:
    /// - Pattern: `ab`  → Join → 'a' → 'b'
    /// - Pattern: `a*b` → Join → {'a', exit}, 'a' → {'a', exit}, exit → 'b'
    fn parse_seq(&mut self, expr: &[char]) -> Result<NodeId> {
        let base = self.join();
        let mut cursor = base;
        let mut index = 0;
        while index < expr.len() {
            let letter = expr[index];
            match letter {
                '\\' => {
                    let escaped = *expr.get(index + 1).ok_or(SyntaxError::TrailingEscape)?;
                    let (value, negate) = escape(escaped);
                    let leaf = self.push(Node::value(value, negate));
                    self.add(cursor, leaf);
                    cursor = leaf;
                    index += 2;
                }
                '(' | '[' | '<' => {
                    let (node, consumed) = match letter {
                        '(' => self.parse_group(&expr[index..])?,
                        '[' => self.parse_class(&expr[index..])?,
                        _ => self.parse_link(&expr[index..])?,
                    };
                    self.add(cursor, node);
                    cursor = node;
                    index += consumed;
                }
                '{' => {
                    let rest = &expr[index..];
                    let close = scan::find_unescaped('}', rest)
                        .ok_or_else(|| SyntaxError::unbalanced('{', '}', rest))?;
                    cursor = self.parse_repeat(cursor, &rest[1..close.start])?;
                    index += close.end;
                }
                '*' | '+' | '?' => {
                    let lazy = expr.get(index + 1) == Some(&'%');
                    cursor = self.quantify(cursor, letter, lazy)?;
                    index += 1 + usize::from(lazy);
                }
                ')' => {
                    // groups consume their own closer, so this one has no opener
                    return Err(SyntaxError::unbalanced('(', ')', expr).into());
                }
                '.' => {
                    let leaf = self.push(Node::value(Value::Any, false));
                    self.add(cursor, leaf);
                    cursor = leaf;
                    index += 1;
                }
                _ => {
                    let leaf = self.push(Node::value(Value::Char(letter), false));
                    self.add(cursor, leaf);
                    cursor = leaf;
                    index += 1;
                }
            }
        }
        Ok(base)
    }

    /// Parse a group starting at `expr[0] == '('`.
    /// Returns the group's `Tree` node and the number of characters consumed.
    ///
    /// Examples:
    /// - Pattern: `(ab)`      → Tree { name: None }
    /// - Pattern: `(who:ab)`  → Tree { name: "who" }
    /// - Pattern: `(:a|b)`    → Tree { name: "0" }, inner Join → {Join → 'a', Join → 'b'}
    /// - Pattern: `(^ab)`     → negated Tree
    fn parse_group(&mut self, expr: &[char]) -> Result<(NodeId, usize)> {
        let close = scan::find_balanced('(', ')', &expr[1..])?;
        let body = &expr[1..1 + close.start];
        let inner = self.join();
        let (name, rest) = self.capture_prefix(body);
        let (negate, rest) = strip_negation(rest);
        let group = self.push(Node {
            negate,
            ..Node::new(Kind::Tree { root: inner, name })
        });

        if scan::shallow_find('|', '(', ')', rest)?.is_some() {
            for alternative in scan::shallow_split('|', '(', ')', rest)? {
                let branch = self.parse_seq(alternative)?;
                self.add(inner, branch);
            }
        } else {
            let branch = self.parse_seq(rest)?;
            self.add(inner, branch);
        }
        Ok((group, close.end + 1))
    }

    /// Parse a character class starting at `expr[0] == '['`.
    ///
    /// Examples:
    /// - Pattern: `[ab]`      → Tree, inner Join → {'a', 'b'}
    /// - Pattern: `[^a-z\d]`  → negated Tree, inner Join → {a-z, 0-9}
    /// - Pattern: `[#alpha#]` → Tree, inner Join → {alpha}
    fn parse_class(&mut self, expr: &[char]) -> Result<(NodeId, usize)> {
        let negate = expr.get(1) == Some(&'^');
        let start = if negate { 2 } else { 1 };
        let close = scan::find_unescaped(']', &expr[start..])
            .ok_or_else(|| SyntaxError::unbalanced('[', ']', expr))?;
        let inner = self.join();
        let class = self.push(Node {
            negate,
            ..Node::new(Kind::Tree {
                root: inner,
                name: None,
            })
        });
        for (value, negate) in class_items(&expr[start..start + close.start])? {
            let leaf = self.push(Node::value(value, negate));
            self.add(inner, leaf);
        }
        Ok((class, start + close.end))
    }

    /// Parse a link starting at `expr[0] == '<'`.
    ///
    /// Examples:
    /// - Pattern: `<name>`          → Link { target: "name" }
    /// - Pattern: `<who[]:name>`    → Link { target: "name", name: "who[]" }
    /// - Pattern: `<^name>`         → negated Link
    fn parse_link(&mut self, expr: &[char]) -> Result<(NodeId, usize)> {
        let close = scan::find_unescaped('>', expr)
            .ok_or_else(|| SyntaxError::unbalanced('<', '>', expr))?;
        let body = &expr[1..close.start];
        let (name, rest) = self.capture_prefix(body);
        let (negate, rest) = strip_negation(rest);
        let target: String = rest.iter().collect();
        let link = Link::new(target.trim(), name)?;
        let node = self.push(Node {
            negate,
            ..Node::new(Kind::Link(link))
        });
        Ok((node, close.end))
    }

    /// Split a leading `name:` off a group or link body.
    ///
    /// A prefix that is not a valid name is not an error: the body is left as
    /// it was and the group goes uncaptured.
    fn capture_prefix<'b>(&mut self, body: &'b [char]) -> (Option<String>, &'b [char]) {
        let Some(colon) = body.iter().position(|&c| c == ':') else {
            return (None, body);
        };
        let prefix: String = body[..colon].iter().collect();
        match self.capture_name(prefix.trim_start_matches(|c: char| c == ' ' || c == '\t')) {
            Ok(name) => (Some(name), &body[colon + 1..]),
            Err(err) => {
                debug!("{err}, leaving the group uncaptured");
                (None, body)
            }
        }
    }

    fn capture_name(&mut self, prefix: &str) -> Result<String> {
        let (name, array) = match prefix.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (prefix, false),
        };
        let name = if name.is_empty() {
            self.alloc_group_id().to_string()
        } else if is_identifier(name) {
            name.to_string()
        } else {
            return Err(Error::InvalidCaptureName(prefix.to_string()));
        };
        Ok(if array { format!("{name}[]") } else { name })
    }

    /// Apply `*`, `+` or `?` to `node`, returning the exit the pattern continues from.
    ///
    /// Example:
    /// - Pattern: `a*`  → parent → {'a', exit}, 'a' → {'a', exit}
    /// - Pattern: `a*%` → parent → {exit, 'a'}, 'a' → {exit, 'a'}
    /// - Pattern: `a+`  → 'a' → {'a', exit}
    /// - Pattern: `a?`  → parent → {'a', exit}, 'a' → {exit}
    fn quantify(&mut self, node: NodeId, quantifier: char, lazy: bool) -> Result<NodeId> {
        let parent = self.operand_parent(node, quantifier)?;
        let exit = self.join();
        match quantifier {
            '*' | '+' => {
                self.nodes[node].reverse = lazy;
                if quantifier == '*' {
                    self.insert_exit(parent, exit, lazy);
                }
                self.add(node, node);
                self.add(node, exit);
            }
            _ => {
                self.insert_exit(parent, exit, lazy);
                self.add(node, exit);
            }
        }
        trace!("{quantifier} on node {node}, exit {exit}");
        Ok(exit)
    }

    /// Expand `{body}` applied to `node` into a chain of clones.
    ///
    /// Counts below the minimum are chained without an exit; the first
    /// admissible count gets the shared exit, which later clones inherit
    /// through their copied branch lists.
    ///
    /// Example:
    /// - Pattern: `a{2-3}` → 'a' → 'a' → {'a', exit}, last 'a' → {exit}
    fn parse_repeat(&mut self, node: NodeId, body: &[char]) -> Result<NodeId> {
        let (lazy, body) = match body.split_first() {
            Some(('%', rest)) => (true, rest),
            _ => (false, body),
        };
        let body: String = body.iter().collect();
        let (min, max) = repeat_range(&body)?;
        let parent = self.operand_parent(node, '{')?;
        let exit = self.join();
        self.nodes[node].reverse = lazy;

        if max == 0 {
            for branch in self.nodes[parent].branches.iter_mut() {
                if *branch == node {
                    *branch = exit;
                }
            }
            return Ok(exit);
        }
        if min == 0 {
            self.insert_exit(parent, exit, lazy);
        }

        let mut current = node;
        let mut open = false;
        for count in 1..=max {
            if count > 1 {
                let clone = self.clone_node(current);
                self.attach(current, clone, true);
                current = clone;
            }
            if count >= min && !open {
                open = true;
                self.add(current, exit);
            }
        }
        trace!("{{{body}}} on node {node} expanded to {max} copies");
        Ok(exit)
    }

    /// Copy a node under a new id. The branch list is copied; the nodes it
    /// points to are shared with the original.
    fn clone_node(&mut self, id: NodeId) -> NodeId {
        let copy = Node {
            parent: None,
            ..self.nodes[id].clone()
        };
        self.push(copy)
    }
}

/// Map an escaped letter to its value. Uppercase letters with a special
/// meaning negate it.
fn escape(letter: char) -> (Value, bool) {
    let value = match letter.to_ascii_lowercase() {
        'n' => Value::Char('\n'),
        'd' => Value::Range('0', '9'),
        'c' => Value::Class(Class::Alpha),
        's' => Value::Class(Class::Space),
        'w' => Value::Class(Class::Alphanum),
        _ => return (Value::Char(letter), false),
    };
    (value, letter.is_ascii_uppercase())
}

fn strip_negation(body: &[char]) -> (bool, &[char]) {
    match body.split_first() {
        Some(('^', rest)) => (true, rest),
        _ => (false, body),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut letters = name.chars();
    letters.next().is_some_and(char::is_alphabetic) && letters.all(char::is_alphanumeric)
}

/// Break a class body into the values it accepts.
fn class_items(body: &[char]) -> Result<Vec<(Value, bool)>> {
    let mut items = Vec::new();
    let mut index = 0;
    while index < body.len() {
        let rest = &body[index..];
        if rest[0] == '#' {
            if let Some(end) = rest[1..].iter().position(|&c| c == '#') {
                let name: String = rest[1..1 + end].iter().collect();
                let value = Value::from_keyword(&name).ok_or(SyntaxError::UnknownClass(name))?;
                items.push((value, false));
                index += end + 2;
                continue;
            }
        }
        if rest[0] == '\\' && rest.len() > 1 {
            items.push(escape(rest[1]));
            index += 2;
        } else if rest.len() > 2 && rest[1] == '-' {
            items.push((Value::Range(rest[0], rest[2]), false));
            index += 3;
        } else {
            items.push((Value::Char(rest[0]), false));
            index += 1;
        }
    }
    Ok(items)
}

/// Parse the inside of `{...}` into inclusive `(min, max)` repeat counts.
///
/// Examples:
/// - `3`   → (3, 3)
/// - `2-4` → (2, 4)
/// - `2-`  → (2, OPEN_REPEAT_LIMIT)
/// - `-2`  → (0, 2)
fn repeat_range(body: &str) -> Result<(usize, usize), SyntaxError> {
    let body = body.trim();
    let bad = || SyntaxError::BadRepetition(body.to_string());
    let bound = |text: &str, default: usize| {
        let text = text.trim_matches(|c: char| c == ' ' || c == '\t');
        if text.is_empty() {
            Ok(default)
        } else if text.chars().all(|c| c.is_ascii_digit()) {
            text.parse().map_err(|_| bad())
        } else {
            Err(bad())
        }
    };

    if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
        let count = bound(body, 0)?;
        return Ok((count, count));
    }
    let (start, stop) = body.split_once('-').ok_or_else(bad)?;
    let min = bound(start, 0)?;
    let max = bound(stop, OPEN_REPEAT_LIMIT)?;
    if min > max {
        return Err(bad());
    }
    Ok((min, max))
}
