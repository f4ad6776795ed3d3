use pmews::{compile, Matcher};
use quickcheck::{quickcheck, TestResult};

// Letters that never carry meaning in a pattern.
const PLAIN: &[char] = &['a', 'b', 'c', 'x', 'y', 'z', '0', '1', ' '];
// Pieces that combine into well-formed patterns.
const PIECES: &[&str] = &[
    "a", "b", ".", r"\d", r"\W", "[ab]", "[^x]", "(a|b)", "(:c)", "(n[]:a)", "a*", "b+", "c?",
    "a*%", "(ab)?", "x{2}", "y{1-3}", "z{%-2}",
];

fn plain(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| PLAIN[b as usize % PLAIN.len()]).collect()
}

#[test]
fn exact_repeat_equals_concatenation() {
    fn prop(count: u8, extra: u8) -> TestResult {
        let count = (count % 12) as usize;
        if count == 0 {
            return TestResult::discard();
        }
        let text = "a".repeat(count + (extra % 4) as usize);
        let repeated = Matcher::new(&format!("a{{{count}}}")).unwrap().matches(&text).unwrap();
        let spelled = Matcher::new(&"a".repeat(count)).unwrap().matches(&text).unwrap();
        TestResult::from_bool(repeated.as_str() == spelled.as_str() && repeated.text().len() == count)
    }
    quickcheck(prop as fn(u8, u8) -> TestResult);
}

#[test]
fn ranged_repeat_takes_at_most_four() {
    fn prop(length: u8) -> bool {
        let length = (length % 10) as usize;
        let text = "a".repeat(length);
        let found = Matcher::new("a{2-4}").unwrap().matches(&text).unwrap();
        match length {
            0 | 1 => !found.is_match(),
            2..=4 => found == text.as_str(),
            _ => found == "aaaa",
        }
    }
    quickcheck(prop as fn(u8) -> bool);
}

#[test]
fn alternation_accepts_only_its_options() {
    fn prop(letter: char) -> bool {
        let found = Matcher::new("(a|b)").unwrap().matches(&letter.to_string()).unwrap();
        found.is_match() == matches!(letter, 'a' | 'b')
    }
    quickcheck(prop as fn(char) -> bool);
}

#[test]
fn negated_class_accepts_everything_else() {
    fn prop(letter: char) -> bool {
        let text = letter.to_string();
        let found = Matcher::new("[^abc]").unwrap().matches(&text).unwrap();
        if matches!(letter, 'a' | 'b' | 'c') {
            !found.is_match()
        } else {
            found == text.as_str()
        }
    }
    quickcheck(prop as fn(char) -> bool);
}

#[test]
fn compiling_is_deterministic() {
    fn prop(picks: Vec<u8>) -> bool {
        let pattern: String = picks.iter().map(|&p| PIECES[p as usize % PIECES.len()]).collect();
        compile(&pattern) == compile(&pattern)
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}

#[test]
fn plain_text_matches_itself() {
    fn prop(bytes: Vec<u8>, tail: Vec<u8>) -> bool {
        let pattern = plain(&bytes);
        let text = pattern.clone() + &plain(&tail);
        let matcher = Matcher::new(&pattern).unwrap();
        matcher.matches(&text).unwrap() == pattern.as_str()
    }
    quickcheck(prop as fn(Vec<u8>, Vec<u8>) -> bool);
}

#[test]
fn search_finds_the_first_occurrence() {
    fn prop(bytes: Vec<u8>) -> TestResult {
        let haystack = plain(&bytes);
        let Some(offset) = haystack.find('x') else {
            return TestResult::discard();
        };
        let found = Matcher::new("x[^x]*").unwrap().search(&haystack).unwrap();
        let expected: String = haystack[offset..]
            .chars()
            .enumerate()
            .take_while(|&(i, c)| i == 0 || c != 'x')
            .map(|(_, c)| c)
            .collect();
        TestResult::from_bool(found == expected.as_str())
    }
    quickcheck(prop as fn(Vec<u8>) -> TestResult);
}
