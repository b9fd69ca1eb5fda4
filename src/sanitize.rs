use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Doubled markers go before their single forms. Wrapped text must start and
    // end with a non-space, and underscores only count at word boundaries.
    static ref EMPHASIS: [(Regex, &'static str); 4] = [
        (Regex::new(r"\*\*(\S(?:.*?\S)??)\*\*").unwrap(), "${1}"),
        (Regex::new(r"\*(\S(?:.*?\S)??)\*").unwrap(), "${1}"),
        (
            Regex::new(r"(?m)(^|\W)__(\S(?:.*?\S)??)__(\W|$)").unwrap(),
            "${1}${2}${3}",
        ),
        (
            Regex::new(r"(?m)(^|\W)_(\S(?:.*?\S)??)_(\W|$)").unwrap(),
            "${1}${2}${3}",
        ),
    ];
}

fn strip_once(text: &str) -> String {
    let mut out = text.to_string();
    for (re, replacement) in EMPHASIS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}

/// Strips markdown bold/italic wrappers, keeping the wrapped text.
///
/// Matching never crosses a line break and unpaired markers are left as is.
/// Passes repeat until nothing changes; each one that changes the text makes
/// it shorter, so the loop ends and a second call is a no-op.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
