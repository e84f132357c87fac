//! Ticket text preparation.
//!
//! Tracker text arrives with HTML and markdown noise. Before embedding,
//! title and body are cleaned and joined as `"{title}. {body}"`; parts that
//! are empty after cleanup are left out, so a ticket with no usable text
//! composes to an empty string and is rejected by the model.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static pattern"));
static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("static pattern")
});
static MD_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[^`]*```").expect("static pattern"));
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("static pattern"));
static MD_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("static pattern"));
static MD_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("static pattern"));
static MD_INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("static pattern"));
static MD_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s+").expect("static pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Words too common to carry meaning in ticket text.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this",
    "they", "but", "have", "had", "what", "when", "where", "who", "which", "why", "how", "all",
    "each", "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "can", "just", "should", "now", "also",
    "been", "being", "do", "does", "did", "doing", "would", "could", "might", "must", "shall",
    "about", "above", "after", "again", "against", "am", "any", "before", "below", "between",
    "into", "through", "during", "out", "over", "under", "up", "down", "then", "once", "here",
    "there", "if", "else", "while", "because", "until", "we", "you", "your",
];

/// Replace tags with spaces and decode entities.
pub fn clean_html(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, " ");
    HTML_ENTITY
        .replace_all(&without_tags, |caps: &Captures| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    let named = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    };
    if let Some(c) = named {
        return Some(c.to_string());
    }
    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        name.strip_prefix('#')?.parse().ok()?
    };
    char::from_u32(code).map(String::from)
}

/// Strip markdown markup, keeping the visible text.
///
/// Fenced code blocks are dropped entirely; inline code keeps its content.
pub fn clean_markdown(text: &str) -> String {
    let text = MD_CODE_BLOCK.replace_all(text, " ");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = MD_BOLD.replace_all(&text, "$1");
    let text = MD_ITALIC.replace_all(&text, "$1");
    let text = MD_INLINE_CODE.replace_all(&text, "$1");
    MD_HEADER.replace_all(&text, "").into_owned()
}

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Full cleanup pipeline for one piece of tracker text.
pub fn clean_text(text: &str) -> String {
    normalize_whitespace(&clean_markdown(&clean_html(text)))
}

/// Compose the text a ticket is embedded from.
pub fn compose_ticket_text(title: &str, body: &str) -> String {
    let parts: Vec<String> = [title, body]
        .iter()
        .map(|part| clean_text(part))
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(". ")
}

/// Cut `text` to at most `max_chars` characters, keeping the head.
///
/// Always cuts on a char boundary. The tail is dropped silently.
pub fn truncate_head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Lowercased content words: alphanumeric runs of 2+ chars that are not
/// stopwords or pure numbers.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_html_tags_and_entities() {
        assert_eq!(
            normalize_whitespace(&clean_html("<p>Tom &amp; Jerry&#39;s <b>bug</b></p>")),
            "Tom & Jerry's bug"
        );
        assert_eq!(clean_html("&#x41;&unknown;"), "A&unknown;");
    }

    #[test]
    fn test_clean_markdown() {
        let text = "# Crash\nSee [the docs](http://x.y) and **bold** or *soft* `code`\n```\nfn x() {}\n```";
        assert_eq!(
            normalize_whitespace(&clean_markdown(text)),
            "Crash See the docs and bold or soft code"
        );
    }

    #[test]
    fn test_compose_skips_empty_parts() {
        assert_eq!(
            compose_ticket_text("Login fails", "<p>after reset</p>"),
            "Login fails. after reset"
        );
        assert_eq!(compose_ticket_text("Login fails", "  "), "Login fails");
        assert_eq!(compose_ticket_text(" ", "<br/>"), "");
    }

    #[test]
    fn test_truncate_head_respects_char_boundaries() {
        assert_eq!(truncate_head("héllo wörld", 4), "héll");
        assert_eq!(truncate_head("short", 10), "short");
        assert_eq!(truncate_head("abc", 0), "");
    }

    #[test]
    fn test_tokenize_drops_noise() {
        assert_eq!(
            tokenize("The login FAILS after 2 resets, v2 is x"),
            vec!["login", "fails", "resets", "v2"]
        );
    }
}
