pub mod prompt;

pub use prompt::{Prompt, PromptListRow, PromptVersion};
