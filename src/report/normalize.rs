//! Clean-up of the Markdown-flavoured control texts before they are laid out
//! as plain PDF text. Every function here is idempotent: rewrites are repeated
//! until the text stops changing.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_LINE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\*{2,}([a-z1-9()]+)\*{2,}").expect("valid regex"));
static NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*{2,}(note:?)\*{2,}").expect("valid regex"));
static HEADING_5: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#{5,}[ ]*([^\n]+)").expect("valid regex"));
static HEADING_4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#{4}[ ]*([^\n]+)").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

// Every rewrite removes `*` or `#` characters or shortens a newline run, so
// the loop terminates.
fn until_stable(text: &str, step: impl Fn(&str) -> String) -> String {
    let mut current = step(text);
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn description_step(text: &str) -> String {
    let text = BOLD_LINE_HEADER.replace_all(text, "\n$1");
    let text = NOTE.replace_all(&text, "$1");
    BLANK_LINES.replace_all(&text, "\n").into_owned()
}

fn implementation_step(text: &str) -> String {
    let text = HEADING_5.replace_all(text, "\n$1\n");
    let text = HEADING_4.replace_all(&text, "\n$1");
    description_step(&text)
}

/// Control description: bold line headers and note markers become plain text,
/// runs of blank lines collapse to a single line break.
pub fn normalize_description(text: &str) -> String {
    until_stable(text, description_step)
}

/// Control implementation text: as [`normalize_description`], with level 4
/// and 5 headings downgraded to plain lines.
pub fn normalize_implementation(text: &str) -> String {
    until_stable(text, implementation_step)
}

/// Control parameters lose every asterisk.
pub fn strip_parameters(text: &str) -> String {
    text.replace('*', "")
}
