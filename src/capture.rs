use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::ops::AddAssign;

/// One captured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Text(String),
    /// Groups captured inside a linked tree, kept under the link's name.
    Groups(Groups),
    /// Contributions to a `[]`-suffixed name, in arrival order.
    List(Vec<Capture>),
}

impl Capture {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Capture::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_groups(&self) -> Option<&Groups> {
        match self {
            Capture::Groups(groups) => Some(groups),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Capture]> {
        match self {
            Capture::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Capture {
    fn from(text: &str) -> Self {
        Capture::Text(text.to_string())
    }
}

impl From<Groups> for Capture {
    fn from(groups: Groups) -> Self {
        Capture::Groups(groups)
    }
}

impl PartialEq<str> for Capture {
    fn eq(&self, other: &str) -> bool {
        self.as_text() == Some(other)
    }
}

impl PartialEq<&str> for Capture {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capture::Text(text) => write!(f, "{text:?}"),
            Capture::Groups(groups) => write!(f, "{groups}"),
            Capture::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Capture groups by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Groups(BTreeMap<String, Capture>);

impl Groups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Capture> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Capture> {
        self.0.iter()
    }

    /// Add one contribution. Names ending in `[]` and list values accumulate
    /// under the bare name; anything else replaces what was there.
    pub fn record(&mut self, key: &str, value: Capture) {
        if let Some(key) = key.strip_suffix("[]") {
            self.append(key, [value]);
            return;
        }
        match value {
            Capture::List(items) => self.append(key, items),
            value => {
                self.0.insert(key.to_string(), value);
            }
        }
    }

    /// Record every entry of `other`, in the way of [`Groups::record`].
    pub fn merge(&mut self, other: Groups) {
        for (key, value) in other.0 {
            self.record(&key, value);
        }
    }

    fn append(&mut self, key: &str, values: impl IntoIterator<Item = Capture>) {
        let mut items = match self.0.remove(key) {
            Some(Capture::List(items)) => items,
            Some(scalar) => vec![scalar],
            None => Vec::new(),
        };
        items.extend(values);
        self.0.insert(key.to_string(), Capture::List(items));
    }
}

impl<'a> IntoIterator for &'a Groups {
    type Item = (&'a String, &'a Capture);
    type IntoIter = btree_map::Iter<'a, String, Capture>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>, V: Into<Capture>> FromIterator<(K, V)> for Groups {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Groups(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for Groups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, capture)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name:?}: {capture}")?;
        }
        write!(f, "}}")
    }
}

/// Outcome of matching a pattern against a string.
///
/// A `Match` without text is falsy ("no match"); a match of the empty string
/// is truthy with empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    matched: Option<String>,
    groups: Groups,
    expression: String,
    string: String,
}

impl Match {
    pub fn new(matched: impl Into<String>, groups: Groups) -> Self {
        Match {
            matched: Some(matched.into()),
            groups,
            ..Match::default()
        }
    }

    /// A failed match.
    pub fn none() -> Self {
        Match::default()
    }

    /// Note which expression and input produced this match.
    pub fn with_source(mut self, expression: &str, string: &str) -> Self {
        self.expression = expression.to_string();
        self.string = string.to_string();
        self
    }

    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    /// Matched text, empty when there is no match.
    pub fn text(&self) -> &str {
        self.matched.as_deref().unwrap_or_default()
    }

    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Capture> {
        self.groups.get(name)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    pub fn update(&mut self, groups: Groups) {
        self.groups.merge(groups);
    }
}

/// Append `other`'s text and merge its groups.
impl AddAssign for Match {
    fn add_assign(&mut self, other: Match) {
        if let Some(text) = other.matched {
            self.matched.get_or_insert_with(String::new).push_str(&text);
        }
        self.update(other.groups);
    }
}

impl PartialEq<str> for Match {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Match {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// `None` stands for "no match".
impl PartialEq<Option<&str>> for Match {
    fn eq(&self, other: &Option<&str>) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Match<{}>({:?}, {:?}, {})",
            self.expression, self.matched, self.string, self.groups
        )
    }
}
