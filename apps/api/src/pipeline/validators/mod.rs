//! Deterministic domain validators. Each one is a plain function of the candidate
//! output and the run's ground truth; none of them calls the model.

pub mod fabrication;
pub mod permutation;
pub mod section_grammar;

pub use fabrication::{detect_fabrications, AllowList};
pub use permutation::{FlatSnapshot, GroupedSnapshot};
pub use section_grammar::validate_sections;
