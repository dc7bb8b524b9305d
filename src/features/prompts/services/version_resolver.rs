//! Latest-version selection.
//!
//! The latest version is the one with the newest `created_at`; versions
//! created in the same instant are ordered by insertion sequence. The choice
//! is recomputed from the full history on every call.

use crate::features::prompts::models::PromptVersion;

pub fn latest(versions: &[PromptVersion]) -> Option<&PromptVersion> {
    versions
        .iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)))
}
