pub mod client;
pub mod error;
pub mod types;

pub use client::{InferenceProvider, ProviderClient};
pub use error::ProviderError;
pub use types::{InferenceRequest, MetadataPayload};
