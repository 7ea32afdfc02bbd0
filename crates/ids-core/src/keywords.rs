use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

pub const MAX_KEYWORDS: usize = 15;
pub const MIN_KEYWORD_LEN: usize = 3;
/// Shortest token allowed to match another token by prefix (`draft`/`drafts`).
const MIN_STEM_LEN: usize = 4;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "onto", "are", "was", "were",
    "will", "would", "should", "could", "can", "has", "have", "had", "not", "but", "any", "all",
    "our", "your", "their", "its", "his", "her", "them", "they", "you", "who", "what", "when",
    "where", "which", "while", "how", "why", "use", "using", "used", "via", "per", "each",
    "than", "then", "there", "these", "those", "also", "only", "just", "over", "under", "about",
    "after", "before", "does", "did", "done", "being", "been", "out", "off", "some", "such",
    "more", "most", "other", "new", "need", "needs", "want", "make", "get", "set", "let",
];

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"[a-z0-9]+").unwrap())
}

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

fn is_keyword(token: &str) -> bool {
    token.len() >= MIN_KEYWORD_LEN && !stop_words().contains(token)
}

/// Lowercase, split on non-alphanumerics, drop stop-words and short tokens,
/// dedupe in order of first appearance, cap at [`MAX_KEYWORDS`].
pub fn extract(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in token_re().find_iter(&lower) {
        let token = m.as_str();
        if is_keyword(token) && seen.insert(token.to_string()) {
            out.push(token.to_string());
            if out.len() == MAX_KEYWORDS {
                break;
            }
        }
    }
    out
}

/// The `limit` most frequent keywords of a document, ties broken by first
/// appearance. Used to repopulate keywords from file content.
pub fn top_by_frequency(text: &str, limit: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, m) in token_re().find_iter(&lower).enumerate() {
        let token = m.as_str();
        if token.chars().all(|c| c.is_ascii_digit()) || !is_keyword(token) {
            continue;
        }
        counts.entry(token).or_insert((0, pos)).0 += 1;
    }
    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(t, _)| t.to_string())
        .collect()
}

/// Exact match, or a shared stem: the shorter token (at least four chars) is
/// a prefix of the longer one.
pub fn tokens_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= MIN_STEM_LEN && long.starts_with(short)
}

/// Number of `needles` matched by at least one of `haystack`.
pub fn count_matches(needles: &[String], haystack: &[String]) -> usize {
    needles
        .iter()
        .filter(|n| haystack.iter().any(|h| tokens_match(n, h)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_drops_stop_words_and_short_tokens() {
        let kw = extract("Validate the story drafts for QA, and fix it!");
        assert_eq!(kw, vec!["validate", "story", "drafts", "fix"]);
    }

    #[test]
    fn extract_splits_on_punctuation_and_dedupes() {
        let kw = extract("create-story / Create_Story: story.md");
        assert_eq!(kw, vec!["create", "story"]);
    }

    #[test]
    fn extract_caps_keyword_count() {
        let text = (0..40).map(|i| format!("word{i:02}x")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract(&text).len(), MAX_KEYWORDS);
    }

    #[test]
    fn extract_blank_is_empty() {
        assert!(extract("").is_empty());
        assert!(extract("  ?? -- ").is_empty());
    }

    #[test]
    fn top_by_frequency_orders_by_count() {
        let text = "registry heal registry checksum registry heal backup 2026";
        assert_eq!(
            top_by_frequency(text, 3),
            vec!["registry", "heal", "checksum"]
        );
    }

    #[test]
    fn stem_matching() {
        assert!(tokens_match("draft", "drafts"));
        assert!(tokens_match("drafts", "draft"));
        assert!(!tokens_match("api", "apis"));
        assert!(!tokens_match("story", "history"));
    }

    #[test]
    fn count_matches_uses_stems() {
        let needles = vec!["validate".to_string(), "drafts".to_string(), "quantum".to_string()];
        let hay = vec!["validate".to_string(), "draft".to_string()];
        assert_eq!(count_matches(&needles, &hay), 2);
    }
}
