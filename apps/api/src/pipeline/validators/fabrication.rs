//! Fabrication Detector — flags technology mentions in free text that the candidate
//! never declared.
//!
//! Heuristic by nature: mentions are found with lexical patterns and matched loosely
//! against the allow-list. Results are warnings, never hard failures.
//!
//! # Algorithm
//! 1. Normalize the allow-list into lower-cased full phrases and word tokens (len ≥ 3).
//! 2. Extract candidate mentions: dotted identifiers (`Node.js`), hyphenated compounds
//!    carrying an uppercase letter or digit (`gRPC-Web`, `EC2-Classic`), capitalized word
//!    runs (`Amazon Web Services`), all-caps acronyms (`AWS`). Earlier patterns win
//!    overlapping spans, so `Node.js` is never also reported as `Node`.
//! 3. Drop generic resume vocabulary (`IGNORED_TERMS`), also trimmed from phrase edges.
//! 4. A mention is allowed if it equals, is contained in, or contains an allow-list entry.
//!    Mentions shorter than 3 characters (`Go`, `R`) must match exactly.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9]*(?:\.[A-Za-z0-9]+)+\b").unwrap());

static HYPHENATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9]+(?:-[A-Za-z0-9]+)+\b").unwrap());

static CAPITALIZED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9+#]*(?:[ \t]+[A-Z][A-Za-z0-9+#]*)*").unwrap()
});

static ACRONYM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9]+\b").unwrap());

/// Generic resume vocabulary and sentence-initial function words. Lower-case.
const IGNORED_TERMS: &[&str] = &[
    // function words that get capitalized at sentence start
    "a", "an", "the", "and", "or", "with", "in", "for", "of", "on", "at", "to", "by", "as",
    "from", "across", "over", "while", "through", "i", "my", "we", "our", "he", "she",
    "they", "their", "this", "that", "these", "those", "who", "whose", "currently",
    // seniority and role words
    "senior", "junior", "lead", "staff", "principal", "head", "chief", "engineer",
    "engineering", "developer", "development", "software", "manager", "architect",
    "consultant", "specialist", "intern", "team", "teams",
    // resume filler
    "expert", "experienced", "experience", "skilled", "proven", "passionate", "seasoned",
    "dedicated", "accomplished", "professional", "summary", "results", "results-driven",
    "detail-oriented", "self-starter", "production", "years", "year", "built", "led",
    "designed", "delivered", "developed", "architected", "shipped", "drove", "owned",
    "specializing", "specialized", "focused", "known", "adept", "versed", "strong",
    "full-stack", "front-end", "back-end", "end-to-end", "cross-functional",
    "high-performance", "large-scale", "real-time", "open-source", "data-driven",
    "e.g", "i.e", "etc",
    // action verbs that open resume sentences
    "mentored", "managed", "improved", "reduced", "scaled", "increased", "implemented",
    "created", "launched", "migrated", "optimized", "automated", "maintained", "partnered",
    "collaborated", "coached", "streamlined", "spearheaded", "established", "championed",
    "oversaw", "grew", "cut", "saved", "wrote", "authored", "ran", "helped", "supported",
];

/// Normalized allow-list.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    phrases: BTreeSet<String>,
    tokens: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases = BTreeSet::new();
        let mut tokens = BTreeSet::new();

        for term in terms {
            let phrase = term.as_ref().trim().to_lowercase();
            if phrase.is_empty() {
                continue;
            }
            for token in phrase
                .split(|c: char| c.is_whitespace() || matches!(c, '/' | ',' | '(' | ')'))
                .filter(|t| t.chars().count() >= 3)
            {
                tokens.insert(token.to_string());
            }
            phrases.insert(phrase);
        }

        Self { phrases, tokens }
    }

    pub fn allows(&self, mention: &str) -> bool {
        let mention = mention.to_lowercase();
        if mention.chars().count() < 3 {
            return self.phrases.contains(&mention) || self.tokens.contains(&mention);
        }
        self.phrases
            .iter()
            .chain(self.tokens.iter())
            .any(|entry| *entry == mention || entry.contains(&mention) || mention.contains(entry.as_str()))
    }
}

/// Extracts candidate technology mentions, lower-cased, deduplicated, in text order.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut taken: Vec<Range<usize>> = Vec::new();
    let mut found: Vec<(usize, String)> = Vec::new();

    let patterns: [(&Regex, bool); 4] = [
        (&DOTTED_RE, false),
        (&HYPHENATED_RE, true),
        (&CAPITALIZED_RE, false),
        (&ACRONYM_RE, false),
    ];

    for (re, needs_marker) in patterns {
        for m in re.find_iter(text) {
            let span = m.range();
            if taken.iter().any(|t| t.start < span.end && span.start < t.end) {
                continue;
            }
            let raw = m.as_str();
            if needs_marker && !raw.chars().any(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
                continue;
            }
            taken.push(span.clone());
            if let Some(mention) = normalize_mention(raw) {
                found.push((span.start, mention));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    let mut seen = BTreeSet::new();
    found
        .into_iter()
        .filter_map(|(_, m)| seen.insert(m.clone()).then_some(m))
        .collect()
}

/// Returns every mention the allow-list does not cover. These are warnings.
pub fn detect_fabrications(text: &str, allow: &AllowList) -> Vec<String> {
    extract_mentions(text)
        .into_iter()
        .filter(|m| !allow.allows(m))
        .collect()
}

/// Lower-cases, and trims ignored words off both ends of a phrase.
/// Returns `None` when nothing meaningful is left.
fn normalize_mention(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let start = words.iter().position(|w| !is_ignored(w))?;
    let end = words.iter().rposition(|w| !is_ignored(w))?;
    let mention = words[start..=end].join(" ");

    if mention.is_empty() || is_ignored(&mention) {
        None
    } else {
        Some(mention)
    }
}

fn is_ignored(word: &str) -> bool {
    IGNORED_TERMS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(terms: &[&str]) -> AllowList {
        AllowList::new(terms.iter().copied())
    }

    #[test]
    fn test_undeclared_language_is_flagged() {
        let warnings = detect_fabrications("Expert in React and Python", &allow(&["React", "Node.js"]));
        assert!(warnings.contains(&"python".to_string()), "{warnings:?}");
        assert!(!warnings.contains(&"react".to_string()));
    }

    #[test]
    fn test_declared_dotted_identifier_is_clean() {
        let warnings =
            detect_fabrications("Expert in React and Node.js", &allow(&["React", "Node.js"]));
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_dotted_identifier_wins_over_capitalized_prefix() {
        let mentions = extract_mentions("Shipped Node.js services");
        assert_eq!(mentions, vec!["node.js".to_string()]);
    }

    #[test]
    fn test_multi_word_phrase_and_acronym() {
        let mentions = extract_mentions("Migrated workloads to Amazon Web Services and GCP.");
        assert!(mentions.contains(&"amazon web services".to_string()));
        assert!(mentions.contains(&"gcp".to_string()));
    }

    #[test]
    fn test_phrase_edges_trimmed_of_resume_vocabulary() {
        let mentions = extract_mentions("Senior Engineer. Led Kafka migrations.");
        assert_eq!(mentions, vec!["kafka".to_string()]);
    }

    #[test]
    fn test_lowercase_hyphenated_words_are_not_mentions() {
        assert!(extract_mentions("delivered end-to-end and event-driven systems").is_empty());
        assert_eq!(extract_mentions("tuned EC2-Classic hosts"), vec!["ec2-classic".to_string()]);
    }

    #[test]
    fn test_substring_and_superstring_matching() {
        let list = allow(&["Amazon Web Services", "PostgreSQL"]);
        assert!(list.allows("Amazon"));
        assert!(list.allows("amazon web services (aws) platform"));
        assert!(list.allows("postgresql"));
        assert!(!list.allows("MongoDB"));
    }

    #[test]
    fn test_short_mentions_skip_substring_rule_and_need_exact_match() {
        let list = allow(&["Google Cloud"]);
        assert!(!list.allows("Go"));
        assert!(allow(&["Go"]).allows("go"));
    }

    #[test]
    fn test_sentence_initial_action_verbs_are_not_mentions() {
        let text = "Mentored peers. Managed releases. Improved latency. Reduced cost. Scaled Redis.";
        assert_eq!(extract_mentions(text), vec!["redis".to_string()]);
        assert!(detect_fabrications("Mentored peers.", &allow(&["Rust"])).is_empty());
    }

    #[test]
    fn test_mentions_are_deduplicated() {
        let mentions = extract_mentions("Kubernetes operator. Kubernetes at scale.");
        assert_eq!(mentions.iter().filter(|m| *m == "kubernetes").count(), 1);
    }
}
