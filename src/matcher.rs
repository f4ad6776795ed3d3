use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::ast::{Kind, Node, NodeId, Tree};
use crate::capture::{Capture, Groups, Match};
use crate::error::{Error, Result};

/// Trees that `<target>` links resolve against, by target name.
pub type Links = HashMap<String, Tree>;

// The tree a walk is currently inside. The main tree's name is empty; linked
// trees go by their target name.
#[derive(Clone, Copy)]
struct Scope<'a> {
    name: &'a str,
    tree: &'a Tree,
}

// A successful walk: where it stopped and what it captured on the way.
struct Walk {
    end: usize,
    groups: Groups,
}

impl Walk {
    fn at(end: usize) -> Self {
        Walk {
            end,
            groups: Groups::new(),
        }
    }

    fn absorb(&mut self, rest: Walk) {
        self.end = rest.end;
        self.groups.merge(rest.groups);
    }
}

// One matching call over one input.
struct Engine<'a> {
    text: &'a [char],
    links: &'a Links,
    // (scope, node, position, negative) entries on the current recursion path.
    active: HashSet<(&'a str, NodeId, usize, bool)>,
}

impl<'a> Engine<'a> {
    fn new(text: &'a [char], links: &'a Links) -> Self {
        Engine {
            text,
            links,
            active: HashSet::new(),
        }
    }

    // Walk `id` from `pos`, giving up on paths that loop back to an active
    // entry without consuming anything.
    fn step(&mut self, scope: Scope<'a>, id: NodeId, pos: usize, negative: bool) -> Result<Option<Walk>> {
        let key = (scope.name, id, pos, negative);
        if !self.active.insert(key) {
            trace!("abandoned cycle at node {id}, position {pos}");
            return Ok(None);
        }
        let walk = if negative {
            self.negative_compare(scope, id, pos)
        } else {
            self.compare(scope, id, pos)
        };
        self.active.remove(&key);
        walk
    }

    fn compare(&mut self, scope: Scope<'a>, id: NodeId, pos: usize) -> Result<Option<Walk>> {
        let node = scope.tree.node(id);
        let Some(mut walk) = self.own_step(scope, node, pos, false)? else {
            return Ok(None);
        };
        if node.branches.is_empty() {
            return Ok(Some(walk));
        }
        for &branch in &node.branches {
            if let Some(rest) = self.step(scope, branch, walk.end, false)? {
                walk.absorb(rest);
                return Ok(Some(walk));
            }
        }
        Ok(None)
    }

    // Succeeds only along a path none of whose values match. Value branches
    // that would accept the next letter block the node outright.
    fn negative_compare(&mut self, scope: Scope<'a>, id: NodeId, pos: usize) -> Result<Option<Walk>> {
        let node = scope.tree.node(id);
        let Some(mut walk) = self.own_step(scope, node, pos, true)? else {
            return Ok(None);
        };
        if node.branches.is_empty() {
            return Ok(Some(walk));
        }
        if let Some(&letter) = self.text.get(walk.end) {
            let blocked = node
                .branches
                .iter()
                .map(|&branch| scope.tree.node(branch))
                .any(|branch| branch.is_value() && branch.equals(letter));
            if blocked {
                return Ok(None);
            }
        }
        for &branch in &node.branches {
            if let Some(rest) = self.step(scope, branch, walk.end, true)? {
                walk.absorb(rest);
                return Ok(Some(walk));
            }
        }
        Ok(None)
    }

    // What the node itself consumes before its branches are tried.
    fn own_step(&mut self, scope: Scope<'a>, node: &'a Node, pos: usize, negative: bool) -> Result<Option<Walk>> {
        match &node.kind {
            Kind::Value(_) => {
                let hit = self
                    .text
                    .get(pos)
                    .is_some_and(|&letter| node.equals(letter) != negative);
                Ok(hit.then(|| Walk::at(pos + 1)))
            }
            Kind::Join => Ok(Some(Walk::at(pos))),
            Kind::Tree { root, name } => {
                let Some(mut inner) = self.step(scope, *root, pos, negative ^ node.negate)? else {
                    return Ok(None);
                };
                if let Some(name) = name {
                    let text = self.slice(pos, inner.end);
                    inner.groups.record(name, Capture::Text(text));
                }
                Ok(Some(inner))
            }
            Kind::Link(link) => {
                let (target, tree) = self
                    .links
                    .get_key_value(link.target())
                    .ok_or_else(|| Error::UnresolvedLink(link.target().to_string()))?;
                let linked = Scope { name: target, tree };
                let Some(inner) = self.step(linked, tree.entry(), pos, negative ^ node.negate)? else {
                    return Ok(None);
                };
                match link.name() {
                    Some(name) => {
                        let mut groups = Groups::new();
                        groups.record(name, Capture::Groups(inner.groups));
                        Ok(Some(Walk { end: inner.end, groups }))
                    }
                    None => Ok(Some(inner)),
                }
            }
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.text[start..end].iter().collect()
    }
}

/// A compiled pattern together with the link table it resolves `<target>`s in.
///
/// Example:
/// ```
/// use pmews::Matcher;
///
/// let matcher = Matcher::new("he(l){2}o world(:\\?)?").unwrap();
/// let found = matcher.matches("hello world?").unwrap();
/// assert!(found == "hello world?");
/// assert!(found.group("0").is_some_and(|g| g == "?"));
/// ```
#[derive(Debug, Clone)]
pub struct Matcher {
    tree: Tree,
    links: Links,
}

impl Matcher {
    pub fn new(pattern: &str) -> Result<Self> {
        Self::with_links(pattern, Links::new())
    }

    pub fn with_links(pattern: &str, links: Links) -> Result<Self> {
        let tree = Tree::compile(pattern)?;
        Ok(Matcher { tree, links })
    }

    pub fn from_tree(tree: Tree) -> Self {
        Matcher {
            tree,
            links: Links::new(),
        }
    }

    pub fn expression(&self) -> &str {
        self.tree.pattern()
    }

    /// Recompile with a new pattern. On error the matcher keeps its old tree.
    pub fn set_expression(&mut self, pattern: &str) -> Result<()> {
        self.tree = Tree::compile(pattern)?;
        Ok(())
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    /// Make `tree` available to `<name>` links, returning the tree it replaces.
    pub fn link(&mut self, name: impl Into<String>, tree: Tree) -> Option<Tree> {
        self.links.insert(name.into(), tree)
    }

    /// Match at the start of `text`. The match need not cover all of it.
    pub fn matches(&self, text: &str) -> Result<Match> {
        let chars: Vec<char> = text.chars().collect();
        let found = self.run(&chars, self.tree.root(), 0, false)?;
        Ok(self.finish(found, &chars, 0).with_source(self.expression(), text))
    }

    /// Match at each offset that leaves at least one character, first hit wins.
    pub fn search(&self, text: &str) -> Result<Match> {
        let chars: Vec<char> = text.chars().collect();
        for start in 0..chars.len() {
            if let Some(walk) = self.run(&chars, self.tree.root(), start, false)? {
                debug!("{:?} found at offset {start}", self.expression());
                return Ok(self.finish(Some(walk), &chars, start).with_source(self.expression(), text));
            }
        }
        Ok(Match::none().with_source(self.expression(), text))
    }

    /// Walk the tree from `node` over `text`.
    pub fn compare(&self, text: &str, node: NodeId) -> Result<Match> {
        self.compare_from(text, node, false)
    }

    /// Walk from `node` requiring every value on the path to not match.
    pub fn negative_compare(&self, text: &str, node: NodeId) -> Result<Match> {
        self.compare_from(text, node, true)
    }

    fn compare_from(&self, text: &str, node: NodeId, negative: bool) -> Result<Match> {
        if self.tree.get(node).is_none() {
            return Err(Error::UnknownNode(node));
        }
        let chars: Vec<char> = text.chars().collect();
        let found = self.run(&chars, node, 0, negative)?;
        Ok(self.finish(found, &chars, 0).with_source(self.expression(), text))
    }

    fn run(&self, chars: &[char], node: NodeId, start: usize, negative: bool) -> Result<Option<Walk>> {
        let scope = Scope {
            name: "",
            tree: &self.tree,
        };
        Engine::new(chars, &self.links).step(scope, node, start, negative)
    }

    fn finish(&self, found: Option<Walk>, chars: &[char], start: usize) -> Match {
        match found {
            Some(walk) => {
                let text: String = chars[start..walk.end].iter().collect();
                Match::new(text, walk.groups)
            }
            None => Match::none(),
        }
    }
}
