//! The gateway: admission, caching and orchestrated provider calls per request.

mod builder;
pub mod prompt;
mod service;
pub mod validation;

pub use builder::GatewayBuilder;
pub use service::{
    AssistRequest, AssistResponse, CachedResponse, Gateway, GenerateRequest, GenerateResponse,
};
