//! Data Transfer Objects for REST request/response serialization.

pub mod event_dto;
pub mod presence_dto;

pub use event_dto::*;
pub use presence_dto::*;
