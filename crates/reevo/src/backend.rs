//! Client side of the Reevo backend: request routing, the HTTP call and
//! decoding of the streamed reply.
pub mod client;
pub mod error;
pub mod protocol;

pub use client::{BackendClient, BackendRoute};
pub use error::BackendError;
