pub mod project_dto;

pub use project_dto::{
    CreateProjectDto, DeleteEmptyProjectsDto, ProjectResponseDto, UpdateProjectDto,
};
