use regex::Regex;
use std::sync::LazyLock;

const SUMMARY_CHARS: usize = 200;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#{1,6}\s").unwrap());
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_`~]").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

/// Plain-text preview of a Markdown report, at most 200 characters.
///
/// The limit counts `char`s, so a summary never ends inside a multi-byte
/// character.
pub fn summarize(markdown: &str) -> String {
    let text = HEADING.replace_all(markdown, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = NEWLINES.replace_all(&text, " ");
    text.trim().chars().take(SUMMARY_CHARS).collect()
}
