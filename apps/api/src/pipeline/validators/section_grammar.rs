//! Section-Grammar Validator for refined job descriptions.
//!
//! Grammar:
//! - markers: `#`..`######` headings and `-` bullets only
//! - sections, each exactly once and in this order: Role Overview, Responsibilities,
//!   Requirements, Tech Stack (heading text matched case-insensitively)
//! - Responsibilities and Requirements: at most `MAX_LIST_BULLETS` bullets
//! - Tech Stack: bullets only, each a short technology name
//!
//! Every violated rule is reported, not just the first.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::ValidationResult;

pub const SECTIONS: [&str; 4] = ["Role Overview", "Responsibilities", "Requirements", "Tech Stack"];
pub const MAX_LIST_BULLETS: usize = 5;
pub const MAX_TECH_WORDS: usize = 4;
pub const MAX_TECH_CHARS: usize = 40;

const CRITIQUE_HEADING: &str = "The job description does not follow the required format";

const CAPPED_SECTIONS: [usize; 2] = [1, 2];
const TECH_SECTION: usize = 3;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*?)[\s#:]*$").unwrap());

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s").unwrap());

static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*|__|(?:^|[\s(])_[^_\s][^_]*_(?:$|[\s).,;:!?])").unwrap()
});

#[derive(Debug, Default)]
struct Section {
    bullets: Vec<(usize, String)>,
    prose: Vec<usize>,
}

/// Checks `text` against the grammar. Approves only if no rule is violated.
pub fn validate_sections(text: &str) -> ValidationResult {
    let mut violations = Vec::new();
    let mut sections: [Option<Section>; 4] = Default::default();
    let mut seen_order: Vec<usize> = Vec::new();
    let mut current: Option<usize> = None;
    let mut preamble_reported = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            let title = caps.get(2).map_or("", |m| m.as_str());
            check_emphasis(title, line_no, &mut violations);
            match section_index(title) {
                Some(i) if sections[i].is_some() => {
                    violations.push(format!("section \"{}\" appears more than once", SECTIONS[i]));
                    current = Some(i);
                }
                Some(i) => {
                    sections[i] = Some(Section::default());
                    seen_order.push(i);
                    current = Some(i);
                }
                None => {
                    violations.push(format!(
                        "unexpected section \"{title}\" (line {line_no}); only {} are allowed",
                        SECTIONS.join(", ")
                    ));
                    current = None;
                }
            }
            continue;
        }

        if line.starts_with('#') {
            violations.push(format!("line {line_no}: heading needs a space after `#`"));
            continue;
        }

        let bullet = if let Some(rest) = line.strip_prefix("- ") {
            Some(rest.trim())
        } else if line.starts_with("* ") || line.starts_with("+ ") {
            violations.push(format!("line {line_no}: use `-` for bullets, not `{}`", &line[..1]));
            Some(line[2..].trim())
        } else if NUMBERED_RE.is_match(line) {
            violations.push(format!("line {line_no}: numbered lists are not allowed; use `-` bullets"));
            line.split_once(' ').map(|(_, rest)| rest.trim())
        } else {
            if line.starts_with('>') || line.starts_with("```") || line.starts_with('|') {
                violations.push(format!(
                    "line {line_no}: only `#` headings and `-` bullets are allowed as markdown"
                ));
            }
            None
        };

        check_emphasis(bullet.unwrap_or(line), line_no, &mut violations);

        let Some(section) = current.and_then(|i| sections[i].as_mut()) else {
            if seen_order.is_empty() && !preamble_reported {
                violations.push(format!(
                    "line {line_no}: text appears before the first section heading"
                ));
                preamble_reported = true;
            }
            continue;
        };
        match bullet {
            Some(item) => section.bullets.push((line_no, item.to_string())),
            None => section.prose.push(line_no),
        }
    }

    for (i, name) in SECTIONS.iter().enumerate() {
        if sections[i].is_none() {
            violations.push(format!("missing section \"{name}\""));
        }
    }

    if seen_order.windows(2).any(|w| w[0] > w[1]) {
        let found: Vec<&str> = seen_order.iter().map(|&i| SECTIONS[i]).collect();
        violations.push(format!(
            "sections are out of order: found {}; expected {}",
            found.join(", "),
            SECTIONS.join(", ")
        ));
    }

    for (i, section) in sections.iter().enumerate() {
        let Some(section) = section else { continue };
        let name = SECTIONS[i];

        if section.bullets.is_empty() && section.prose.is_empty() {
            violations.push(format!("section \"{name}\" is empty"));
        }

        if CAPPED_SECTIONS.contains(&i) && section.bullets.len() > MAX_LIST_BULLETS {
            violations.push(format!(
                "section \"{name}\" has {} bullets; at most {MAX_LIST_BULLETS} are allowed",
                section.bullets.len()
            ));
        }

        if i == TECH_SECTION {
            check_tech_stack(section, &mut violations);
        }
    }

    ValidationResult::from_violations(CRITIQUE_HEADING, violations)
}

fn section_index(title: &str) -> Option<usize> {
    let title = title.trim();
    SECTIONS.iter().position(|s| s.eq_ignore_ascii_case(title))
}

fn check_emphasis(text: &str, line_no: usize, violations: &mut Vec<String>) {
    if EMPHASIS_RE.is_match(text) {
        violations.push(format!(
            "line {line_no}: bold/italic markers (`*`, `_`) are not allowed"
        ));
    }
}

fn check_tech_stack(section: &Section, violations: &mut Vec<String>) {
    if let Some(line_no) = section.prose.first() {
        violations.push(format!(
            "\"Tech Stack\" must be a bullet list of technology names; found prose on line {line_no}"
        ));
    }

    for (line_no, item) in &section.bullets {
        let words = item.split_whitespace().count();
        let chars = item.chars().count();
        if words > MAX_TECH_WORDS || chars > MAX_TECH_CHARS {
            violations.push(format!(
                "line {line_no}: Tech Stack bullet \"{item}\" is too long; list a technology name \
                 (at most {MAX_TECH_WORDS} words, {MAX_TECH_CHARS} characters)"
            ));
        } else if item.ends_with('.') {
            violations.push(format!(
                "line {line_no}: Tech Stack bullet \"{item}\" reads like a sentence; drop the trailing period"
            ));
        }
    }
}
