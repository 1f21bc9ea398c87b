#![doc = include_str!("../README.md")]

mod client;
mod credentials;
mod error;
mod error_message;
pub mod pagination;
mod refresh;
mod types;

pub use client::BackofficeClient;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ApiError, ApiResult};
pub use error_message::normalize_error;
pub use pagination::{ListEnvelope, Page};
pub use refresh::{NoopSessionListener, SessionListener};
pub use reqwest::header::{HeaderName, HeaderValue};
pub use reqwest::Method;
pub use types::*;
