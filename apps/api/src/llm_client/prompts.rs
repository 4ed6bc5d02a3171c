// Shared prompt fragments used by more than one pipeline role.
// Role-specific system prompts and templates live in pipeline::prompts.

/// Grounding rule for every role that writes about the candidate.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every skill, technology, employer, or credential you mention must appear in \
    the candidate facts provided. Do NOT infer, interpolate, or invent details. \
    A job description requirement the candidate does not list must NOT be claimed.";

/// Rule for sort roles: the output is a reordering, never an edit.
pub const PERMUTATION_INSTRUCTION: &str = "\
    CRITICAL: You are REORDERING, not editing. Return every input item exactly once, \
    spelled and capitalized exactly as given. Do NOT add, remove, merge, rename, or \
    translate any item.";
