/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// PROMPT LIFECYCLE
// =============================================================================

/// Version label given to the initial version of a new prompt
pub const DEFAULT_VERSION_LABEL: &str = "1.0.0";

/// Project that owns prompts created without an explicit project name
pub const DEFAULT_PROJECT_NAME: &str = "Default";

/// Key inside a version's config mapping that names its default model
pub const MODEL_CONFIG_KEY: &str = "model_name";

// =============================================================================
// EXECUTION
// =============================================================================

/// Buffered stream events between the provider pump and the SSE writer
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Sampling temperature for translation calls
pub const TRANSLATION_TEMPERATURE: f32 = 0.3;

// =============================================================================
// STATISTICS
// =============================================================================

/// Window used for the "recently created" counter on the overview
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Window covered by the creation trend series
pub const TREND_WINDOW_DAYS: i64 = 30;

/// Row limit for top-N statistics lists
pub const STATS_TOP_LIMIT: i64 = 10;
