use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, bail, Context};
use bytes::{Bytes, BytesMut};
use clap::Parser;
use log::debug;
use pmews::{Links, Matcher, Tree};

/// Print the lines of standard input that match a pattern.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pattern to match each line against
    #[arg(short = 'E', long)]
    pattern: String,
    /// Tree that `<NAME>` links resolve to, as NAME=PATTERN
    #[arg(short, long = "link", value_name = "NAME=PATTERN")]
    links: Vec<String>,
    /// Only match at the start of each line
    #[arg(short, long)]
    anchored: bool,
    /// Print only the matched text and its groups
    #[arg(short, long)]
    only_matching: bool,
}

// Matching recurses once per letter, so long lines need a deep stack.
const MATCH_STACK_SIZE: usize = 256 * 1024 * 1024;

// Usage: echo <input_text> | pmews -E <pattern>
fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match on_match_stack(move || run(&args)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn on_match_stack<T, F>(work: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let worker = thread::Builder::new()
        .name("matcher".to_string())
        .stack_size(MATCH_STACK_SIZE)
        .spawn(work)
        .context("failed to start the matcher thread")?;
    worker
        .join()
        .unwrap_or_else(|_| Err(anyhow!("matcher thread panicked")))
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let links = parse_links(&args.links)?;
    let matcher = Matcher::with_links(&args.pattern, links)
        .with_context(|| format!("invalid pattern {:?}", args.pattern))?;

    let input = read_stdin().context("failed to read standard input")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut any = false;
    for (number, line) in lines(input).enumerate() {
        let line = std::str::from_utf8(&line)
            .with_context(|| format!("line {} is not valid UTF-8", number + 1))?;
        let found = if args.anchored {
            matcher.matches(line)?
        } else {
            matcher.search(line)?
        };
        if !found.is_match() {
            continue;
        }
        any = true;
        debug!("line {}: {found}", number + 1);
        if !args.only_matching {
            writeln!(out, "{line}")?;
        } else if found.groups().is_empty() {
            writeln!(out, "{}", found.text())?;
        } else {
            writeln!(out, "{}\t{}", found.text(), found.groups())?;
        }
    }
    Ok(any)
}

// Each NAME=PATTERN compiles on its own, so its groups number from zero.
fn parse_links(entries: &[String]) -> anyhow::Result<Links> {
    let mut links = Links::new();
    for entry in entries {
        let Some((name, pattern)) = entry.split_once('=') else {
            bail!("link {entry:?} is not of the form NAME=PATTERN");
        };
        let tree = Tree::compile(pattern)
            .with_context(|| format!("invalid pattern for link {name:?}"))?;
        links.insert(name.trim().to_string(), tree);
    }
    Ok(links)
}

fn read_stdin() -> io::Result<BytesMut> {
    let mut buffer = BytesMut::with_capacity(8 * 1024);
    let mut chunk = [0u8; 8 * 1024];
    let mut stdin = io::stdin().lock();
    loop {
        let read = stdin.read(&mut chunk)?;
        if read == 0 {
            return Ok(buffer);
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

// Split off one line at a time, without its line ending.
fn lines(mut buffer: BytesMut) -> impl Iterator<Item = Bytes> {
    std::iter::from_fn(move || {
        if buffer.is_empty() {
            return None;
        }
        let line = match buffer.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let mut line = buffer.split_to(end + 1);
                line.truncate(end);
                line
            }
            None => buffer.split(),
        };
        let mut line = line.freeze();
        if line.ends_with(b"\r") {
            line.truncate(line.len() - 1);
        }
        Some(line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_drop_their_endings() {
        let buffer = BytesMut::from(&b"one\ntwo\r\n\nlast"[..]);
        let collected: Vec<Vec<u8>> = lines(buffer).map(|line| line.to_vec()).collect();
        assert_eq!(collected, [&b"one"[..], b"two", b"", b"last"].map(<[u8]>::to_vec));
    }

    #[test]
    fn long_lines_fit_on_the_match_stack() {
        let matched = on_match_stack(|| {
            let matcher = Matcher::new("a*b")?;
            let line = "a".repeat(50_000) + "b";
            Ok(matcher.matches(&line)?.text().len())
        })
        .unwrap();
        assert_eq!(matched, 50_001);
    }

    #[test]
    fn links_need_a_name_and_pattern() {
        let links = parse_links(&["word=\\c+".to_string()]).unwrap();
        assert!(links.contains_key("word"));
        assert!(parse_links(&["word".to_string()]).is_err());
        assert!(parse_links(&["word=(".to_string()]).is_err());
    }
}
