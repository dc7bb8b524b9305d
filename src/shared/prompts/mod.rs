//! Template handling shared by the prompt and run features.
//!
//! - [`renderer`]: `{{ name }}` substitution with missing-variable reporting
//! - [`bilingual`]: the two-language template record and its normalization

pub mod bilingual;
pub mod renderer;

pub use bilingual::{extract, normalize, BilingualTemplate, Language, StoredTemplate};
pub use renderer::{placeholders, render, stringify_variables, Rendered};
