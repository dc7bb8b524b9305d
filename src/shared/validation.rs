use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for prompt slugs (the key used by `POST /api/run/{slug}`)
    /// Lowercase alphanumeric segments joined by single hyphens or underscores
    /// - Valid: "resume-parser", "greet", "summarize_v2", "a-b_c"
    /// - Invalid: "-greet", "greet-", "re--sume", "Greet", "re sume"
    pub static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap();
}
