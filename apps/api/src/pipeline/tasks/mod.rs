//! The four critique-revise tasks and their entry points.

pub mod flat_sort;
pub mod refine;
pub mod skill_sort;
pub mod summary;

pub use flat_sort::{sort_flat_list, FlatSortRequest, FlatSortResponse};
pub use refine::{refine_text, RefineRequest, RefineResponse};
pub use skill_sort::{sort_skill_groups, SkillOrdering, SkillSortRequest};
pub use summary::{generate_summary, SummaryRequest, SummaryResponse};
