//! Application services: template rendering and conversion orchestration.

pub mod convert;
pub mod error;
pub mod printer;
pub mod template;
