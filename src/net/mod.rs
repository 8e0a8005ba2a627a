//! REST plumbing for the task backend.
//!
//! `client` owns the HTTP connection and token injection; `auth` and `tasks`
//! expose the endpoints as mockable capability traits; `error` normalizes
//! every failure into one taxonomy.

pub mod auth;
pub mod client;
pub mod error;
pub mod tasks;
pub mod types;

pub use auth::AuthApi;
pub use client::ApiClient;
pub use error::{ApiError, ErrorKind};
pub use tasks::TaskApi;
