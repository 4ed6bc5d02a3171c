//! Permutation Validator — a sort result must contain exactly the input items, reordered.
//!
//! The ground truth is snapshotted once when a sort pipeline starts and never changes.
//! Equality is exact and case-sensitive. A candidate that differs from the input only
//! in capitalization is still rejected, but the violation says so, so the next attempt
//! can copy the exact spelling.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::resume::SkillGroup;
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::ValidationResult;

const CRITIQUE_HEADING: &str = "The ordering is not a permutation of the input";

/// Ground truth for a flat list sort.
#[derive(Debug, Clone)]
pub struct FlatSnapshot {
    items: Vec<String>,
    set: BTreeSet<String>,
}

impl FlatSnapshot {
    /// Rejects inputs with duplicates: a duplicated input cannot be checked by set equality.
    pub fn capture(items: &[String]) -> Result<Self, PipelineError> {
        let set: BTreeSet<String> = items.iter().cloned().collect();
        if set.len() != items.len() {
            return Err(PipelineError::InvalidInput(format!(
                "list contains duplicate items: {}",
                quote_all(&duplicates(items))
            )));
        }
        Ok(Self {
            items: items.to_vec(),
            set,
        })
    }

    /// The input in its original order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn validate(&self, candidate: &[String]) -> ValidationResult {
        let violations = compare_items("the list", &self.set, candidate);
        ValidationResult::from_violations(CRITIQUE_HEADING, violations)
    }
}

/// Ground truth for a grouped sort: group names and each group's skill set.
#[derive(Debug, Clone)]
pub struct GroupedSnapshot {
    order: Vec<String>,
    groups: BTreeMap<String, BTreeSet<String>>,
    originals: BTreeMap<String, Vec<String>>,
}

impl GroupedSnapshot {
    pub fn capture(groups: &[SkillGroup]) -> Result<Self, PipelineError> {
        let mut order = Vec::with_capacity(groups.len());
        let mut sets = BTreeMap::new();
        let mut originals = BTreeMap::new();

        for group in groups {
            if sets.contains_key(&group.name) {
                return Err(PipelineError::InvalidInput(format!(
                    "duplicate skill group name \"{}\"",
                    group.name
                )));
            }
            let set: BTreeSet<String> = group.skills.iter().cloned().collect();
            if set.len() != group.skills.len() {
                return Err(PipelineError::InvalidInput(format!(
                    "group \"{}\" contains duplicate skills: {}",
                    group.name,
                    quote_all(&duplicates(&group.skills))
                )));
            }
            order.push(group.name.clone());
            sets.insert(group.name.clone(), set);
            originals.insert(group.name.clone(), group.skills.clone());
        }

        Ok(Self {
            order,
            groups: sets,
            originals,
        })
    }

    pub fn group_names(&self) -> &[String] {
        &self.order
    }

    /// Original skill order of a group.
    pub fn skills_of(&self, group: &str) -> Option<&[String]> {
        self.originals.get(group).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks, in order: the group order list, the set of groups in the skill map,
    /// then each group's skills. One violation per failed check.
    pub fn validate(
        &self,
        group_order: &[String],
        skill_order: &BTreeMap<String, Vec<String>>,
    ) -> ValidationResult {
        let truth_names: BTreeSet<String> = self.groups.keys().cloned().collect();
        let mut violations = Vec::new();

        violations.extend(compare_items("group_order", &truth_names, group_order));

        let candidate_keys: Vec<String> = skill_order.keys().cloned().collect();
        violations.extend(compare_items("skill_order groups", &truth_names, &candidate_keys));

        for name in &self.order {
            let (Some(truth), Some(candidate)) = (self.groups.get(name), skill_order.get(name))
            else {
                continue;
            };
            violations.extend(compare_items(&format!("group \"{name}\""), truth, candidate));
        }

        ValidationResult::from_violations(CRITIQUE_HEADING, violations)
    }
}

/// Compares a candidate list against a ground-truth set.
///
/// Returns at most one violation per kind of failure (missing, unexpected, duplicated).
fn compare_items(label: &str, truth: &BTreeSet<String>, candidate: &[String]) -> Vec<String> {
    let candidate_set: BTreeSet<String> = candidate.iter().cloned().collect();
    let mut violations = Vec::new();

    let missing: Vec<String> = truth.difference(&candidate_set).cloned().collect();
    let extra: Vec<String> = candidate_set.difference(truth).cloned().collect();

    if !missing.is_empty() {
        violations.push(format!("{label} is missing {}", quote_all(&missing)));
    }

    if !extra.is_empty() {
        let mut message = format!("{label} contains items not in the input: {}", quote_all(&extra));
        let hints: Vec<String> = extra
            .iter()
            .filter_map(|e| {
                missing
                    .iter()
                    .find(|m| m.eq_ignore_ascii_case(e))
                    .map(|m| format!("use \"{m}\" instead of \"{e}\""))
            })
            .collect();
        if !hints.is_empty() {
            message.push_str(&format!(" (capitalization must match exactly: {})", hints.join(", ")));
        }
        violations.push(message);
    }

    if candidate_set.len() != candidate.len() {
        violations.push(format!(
            "{label} repeats {}",
            quote_all(&duplicates(candidate))
        ));
    }

    violations
}

fn duplicates(items: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for item in items {
        if !seen.insert(item) {
            dups.insert(item.clone());
        }
    }
    dups.into_iter().collect()
}

fn quote_all(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("\"{i}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    fn groups() -> Vec<SkillGroup> {
        vec![
            SkillGroup {
                name: "Languages".to_string(),
                skills: s(&["Rust", "Go", "TypeScript"]),
            },
            SkillGroup {
                name: "Cloud".to_string(),
                skills: s(&["AWS", "GCP"]),
            },
        ]
    }

    #[test]
    fn test_flat_reordering_is_approved() {
        let snap = FlatSnapshot::capture(&s(&["React", "Next.js", "TypeScript"])).unwrap();
        assert!(snap.validate(&s(&["TypeScript", "React", "Next.js"])).approved);
    }

    #[test]
    fn test_flat_missing_extra_and_duplicate_each_reported() {
        let snap = FlatSnapshot::capture(&s(&["React", "Next.js", "TypeScript"])).unwrap();
        let result = snap.validate(&s(&["React", "React", "Vue"]));
        assert!(!result.approved);
        assert_eq!(result.violations.len(), 3);
        assert!(result.violations[0].contains("missing \"Next.js\", \"TypeScript\""));
        assert!(result.violations[1].contains("\"Vue\""));
        assert!(result.violations[2].contains("repeats \"React\""));
    }

    #[test]
    fn test_flat_case_difference_is_rejected_with_hint() {
        let snap = FlatSnapshot::capture(&s(&["JavaScript", "Rust"])).unwrap();
        let result = snap.validate(&s(&["javascript", "Rust"]));
        assert!(!result.approved);
        assert!(result
            .violations
            .iter()
            .any(|v| v.contains("use \"JavaScript\" instead of \"javascript\"")));
    }

    #[test]
    fn test_flat_capture_rejects_duplicate_input() {
        let err = FlatSnapshot::capture(&s(&["Rust", "Rust"])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_grouped_permutation_is_approved() {
        let snap = GroupedSnapshot::capture(&groups()).unwrap();
        let mut skill_order = BTreeMap::new();
        skill_order.insert("Cloud".to_string(), s(&["GCP", "AWS"]));
        skill_order.insert("Languages".to_string(), s(&["TypeScript", "Rust", "Go"]));
        let result = snap.validate(&s(&["Cloud", "Languages"]), &skill_order);
        assert!(result.approved, "{:?}", result.violations);
    }

    #[test]
    fn test_grouped_missing_group_and_moved_skill() {
        let snap = GroupedSnapshot::capture(&groups()).unwrap();
        let mut skill_order = BTreeMap::new();
        // "AWS" moved into Languages, Cloud group dropped entirely.
        skill_order.insert("Languages".to_string(), s(&["Rust", "Go", "TypeScript", "AWS"]));
        let result = snap.validate(&s(&["Languages"]), &skill_order);
        assert!(!result.approved);
        assert!(result.violations[0].starts_with("group_order is missing \"Cloud\""));
        assert!(result.violations[1].starts_with("skill_order groups is missing \"Cloud\""));
        assert!(result.violations[2].contains("group \"Languages\" contains items not in the input: \"AWS\""));
        assert_eq!(result.violations.len(), 3);
    }

    #[test]
    fn test_grouped_extra_group_reported() {
        let snap = GroupedSnapshot::capture(&groups()).unwrap();
        let mut skill_order = BTreeMap::new();
        skill_order.insert("Cloud".to_string(), s(&["AWS", "GCP"]));
        skill_order.insert("Languages".to_string(), s(&["Rust", "Go", "TypeScript"]));
        skill_order.insert("Databases".to_string(), s(&["Postgres"]));
        let result = snap.validate(&s(&["Languages", "Cloud"]), &skill_order);
        assert!(!result.approved);
        assert_eq!(result.violations.len(), 1);
        assert!(result.violations[0].contains("\"Databases\""));
    }

    #[test]
    fn test_grouped_capture_rejects_duplicate_names() {
        let mut input = groups();
        input.push(input[0].clone());
        assert!(GroupedSnapshot::capture(&input).is_err());
    }
}
