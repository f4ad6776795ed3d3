//! Delimiter scanning over raw pattern text.
//!
//! All helpers work on character slices, and every returned [`Span`] is
//! relative to the slice it was given. A character is escaped when an odd
//! number of backslashes immediately precedes it.

use crate::ast::Span;
use crate::error::SyntaxError;

pub fn is_escaped(text: &[char], index: usize) -> bool {
    text[..index].iter().rev().take_while(|&&c| c == '\\').count() % 2 == 1
}

pub fn count_unescaped(needle: char, haystack: &[char]) -> usize {
    (0..haystack.len())
        .filter(|&i| haystack[i] == needle && !is_escaped(haystack, i))
        .count()
}

pub fn find_unescaped(needle: char, haystack: &[char]) -> Option<Span> {
    (0..haystack.len())
        .find(|&i| haystack[i] == needle && !is_escaped(haystack, i))
        .map(|i| Span::with_length(i, 1))
}

/// Find the closer matching an opener that was consumed just before `text`.
///
/// Example:
/// - `find_balanced('(', ')', "a(b)c)d")` → `Span(5, 6)`
/// - `find_balanced('(', ')', "[)]b)")` → `Span(4, 5)`
pub fn find_balanced(opener: char, closer: char, text: &[char]) -> Result<Span, SyntaxError> {
    let mut depth = 1usize;
    for (i, c) in structural(text) {
        if c == opener {
            depth += 1;
        } else if c == closer {
            depth -= 1;
            if depth == 0 {
                return Ok(Span::with_length(i, 1));
            }
        }
    }
    Err(SyntaxError::unbalanced(opener, closer, text))
}

/// First unescaped `needle` that is not nested inside an opener/closer pair.
pub fn shallow_find(
    needle: char,
    opener: char,
    closer: char,
    text: &[char],
) -> Result<Option<Span>, SyntaxError> {
    check_balance(opener, closer, text)?;
    let mut depth = 0usize;
    for (i, c) in structural(text) {
        if c == opener {
            depth += 1;
        } else if c == closer {
            depth = depth.saturating_sub(1);
        } else if c == needle && depth == 0 {
            return Ok(Some(Span::with_length(i, 1)));
        }
    }
    Ok(None)
}

/// Split `text` on every shallow occurrence of `needle`.
///
/// Example:
/// - `shallow_split('|', '(', ')', "a|(b|c)|[d|e]")` → `["a", "(b|c)", "[d|e]"]`
pub fn shallow_split<'a>(
    needle: char,
    opener: char,
    closer: char,
    text: &'a [char],
) -> Result<Vec<&'a [char]>, SyntaxError> {
    check_balance(opener, closer, text)?;
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in structural(text) {
        if c == opener {
            depth += 1;
        } else if c == closer {
            depth = depth.saturating_sub(1);
        } else if c == needle && depth == 0 {
            pieces.push(&text[start..i]);
            start = i + 1;
        }
    }
    pieces.push(&text[start..]);
    Ok(pieces)
}

fn check_balance(opener: char, closer: char, text: &[char]) -> Result<(), SyntaxError> {
    let (opened, closed) = structural(text).fold((0, 0), |(opened, closed), (_, c)| {
        (opened + usize::from(c == opener), closed + usize::from(c == closer))
    });
    if opened != closed {
        return Err(SyntaxError::unbalanced(opener, closer, text));
    }
    Ok(())
}

// Unescaped letters with their indices, skipping the members of `[...]`
// classes. An unterminated `[` is yielded like any other letter.
fn structural(text: &[char]) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut index = 0;
    std::iter::from_fn(move || {
        while index < text.len() {
            let i = index;
            index += 1;
            if is_escaped(text, i) {
                continue;
            }
            if text[i] == '[' {
                if let Some(close) = find_unescaped(']', &text[i + 1..]) {
                    index = i + 1 + close.end;
                    continue;
                }
            }
            return Some((i, text[i]));
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    fn strings(pieces: Vec<&[char]>) -> Vec<String> {
        pieces.into_iter().map(|piece| piece.iter().collect()).collect()
    }

    #[test]
    fn escapes_pair_up() {
        let text = chars(r"a\(b\\(");
        assert!(is_escaped(&text, 2));
        assert!(!is_escaped(&text, 6));
        assert!(!is_escaped(&text, 0));
    }

    #[test]
    fn counts_skip_escaped() {
        assert_eq!(count_unescaped('(', &chars(r"(a\(b)(")), 2);
        assert_eq!(find_unescaped(']', &chars(r"a\]b]")), Some(Span::new(4, 5)));
        assert_eq!(find_unescaped(']', &chars("abc")), None);
    }

    #[test]
    fn balanced_closer_skips_nesting() {
        assert_eq!(find_balanced('(', ')', &chars("a(b)c)d")), Ok(Span::new(5, 6)));
        assert_eq!(find_balanced('(', ')', &chars(r"a\)b)")), Ok(Span::new(4, 5)));
    }

    #[test]
    fn missing_closer_is_unbalanced() {
        let err = find_balanced('(', ')', &chars("a(b)")).unwrap_err();
        assert!(matches!(err, SyntaxError::Unbalanced { opener: '(', closer: ')', .. }));
    }

    #[test]
    fn shallow_find_ignores_nested_needles() {
        assert_eq!(shallow_find('|', '(', ')', &chars("(a|b)c")), Ok(None));
        assert_eq!(shallow_find('|', '(', ')', &chars("(a|b)|c")), Ok(Some(Span::new(5, 6))));
        assert_eq!(shallow_find('|', '(', ')', &chars(r"a\|b")), Ok(None));
        assert!(shallow_find('|', '(', ')', &chars("(a|b")).is_err());
    }

    #[test]
    fn shallow_split_keeps_groups_whole() {
        let text = chars("a|(b|c)|d");
        let pieces = shallow_split('|', '(', ')', &text).unwrap();
        assert_eq!(strings(pieces), ["a", "(b|c)", "d"]);
    }

    #[test]
    fn class_members_are_not_structure() {
        assert_eq!(find_balanced('(', ')', &chars("[)]b)")), Ok(Span::new(4, 5)));
        assert_eq!(find_balanced('(', ')', &chars(r"[\]()]a)")), Ok(Span::new(7, 8)));
        assert_eq!(shallow_find('|', '(', ')', &chars("[a|b]")), Ok(None));
        assert_eq!(shallow_find('|', '(', ')', &chars("[(]")), Ok(None));
        let text = chars("a|(b|c)|[d|e]");
        let pieces = shallow_split('|', '(', ')', &text).unwrap();
        assert_eq!(strings(pieces), ["a", "(b|c)", "[d|e]"]);
    }

    #[test]
    fn shallow_split_keeps_empty_alternatives() {
        let text = chars("|a|");
        let pieces = shallow_split('|', '(', ')', &text).unwrap();
        assert_eq!(strings(pieces), ["", "a", ""]);
    }
}
