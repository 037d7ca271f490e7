use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern compiles"));

/// Neutralize markup in free text before it is stored.
///
/// Complete tags are removed, stray angle brackets are dropped, control
/// characters other than newline and tab are removed, and surrounding
/// whitespace is trimmed. Ampersands and quotes are kept as typed: the stored
/// value is plain text and escaping happens at render time.
pub fn sanitize(input: &str) -> String {
    let stripped = TAG.replace_all(input, "");
    stripped
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}
