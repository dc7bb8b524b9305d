pub mod prompt_dto;

pub use prompt_dto::{
    CreatePromptDto, PromptDetailDto, PromptItemDto, PromptQueryParams, PromptStructure,
    SortDirection, UpdatePromptDetailDto, UpdatePromptDto, VersionView,
};
