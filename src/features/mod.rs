pub mod projects;
pub mod prompts;
pub mod run;
pub mod stats;
