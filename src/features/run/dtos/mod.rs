pub mod run_dto;

pub use run_dto::*;
