pub mod run_handler;

pub use run_handler::*;
