mod chat_dto;
mod thread_dto;

pub use chat_dto::*;
pub use thread_dto::*;
