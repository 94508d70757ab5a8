pub mod backend_dto;
pub mod report_dto;
