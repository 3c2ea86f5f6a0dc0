//! Query facade and orchestration.

mod engine_service;
mod engine_traits;

pub use engine_service::*;
pub use engine_traits::*;
