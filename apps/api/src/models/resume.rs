//! Candidate-side input types for the pipelines.
//!
//! These are the caller's view of the resume document: the facts a summary may draw
//! on and the collections a sort may reorder. None of it is persisted here.

use serde::{Deserialize, Serialize};

/// A named group of skills, e.g. `Languages: [Rust, Go]`, in the caller's current order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGroup {
    pub name: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceFact {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationFact {
    pub institution: String,
    #[serde(default)]
    pub credential: Option<String>,
}

/// Everything the summary writer is allowed to state about the candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeFacts {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub years_experience: Option<u32>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceFact>,
    #[serde(default)]
    pub education: Vec<EducationFact>,
}

impl ResumeFacts {
    /// Declared vocabulary: the allow-list for the fabrication scan.
    ///
    /// Skills and technologies plus employer names, job titles, institutions and
    /// credentials, so that naming a real employer is never reported as invented.
    pub fn declared_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self
            .skills
            .iter()
            .chain(self.technologies.iter())
            .cloned()
            .collect();
        if let Some(headline) = &self.headline {
            terms.push(headline.clone());
        }
        for exp in &self.experience {
            terms.push(exp.title.clone());
            terms.push(exp.company.clone());
        }
        for edu in &self.education {
            terms.push(edu.institution.clone());
            if let Some(credential) = &edu.credential {
                terms.push(credential.clone());
            }
        }
        terms.retain(|t| !t.trim().is_empty());
        terms
    }

    pub fn is_empty(&self) -> bool {
        self.headline.is_none()
            && self.skills.is_empty()
            && self.technologies.is_empty()
            && self.experience.is_empty()
            && self.education.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_terms_covers_employers_and_credentials() {
        let facts = ResumeFacts {
            skills: vec!["React".to_string()],
            technologies: vec!["Node.js".to_string()],
            experience: vec![ExperienceFact {
                title: "Senior Engineer".to_string(),
                company: "Acme Robotics".to_string(),
                highlights: vec![],
            }],
            education: vec![EducationFact {
                institution: "Georgia Tech".to_string(),
                credential: Some("BS Computer Science".to_string()),
            }],
            ..Default::default()
        };
        let terms = facts.declared_terms();
        for expected in ["React", "Node.js", "Acme Robotics", "Georgia Tech", "BS Computer Science"] {
            assert!(terms.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_facts_deserialize_with_defaults() {
        let facts: ResumeFacts = serde_json::from_str(r#"{"skills": ["Rust"]}"#).unwrap();
        assert_eq!(facts.skills, vec!["Rust".to_string()]);
        assert!(facts.experience.is_empty());
        assert!(!facts.is_empty());
        assert!(ResumeFacts::default().is_empty());
    }
}
