//! # taskdesk
//!
//! Native client for the task-management REST backend: sign-up/sign-in,
//! session lifecycle, and task CRUD over JSON with a bearer token.
//!
//! The crate is split the way the backend's consumers see it:
//! - `net`: wire types, error normalization and the authenticated HTTP client.
//! - `state`: token persistence, the session controller and the cached task list.
//! - `forms`: field validation applied before anything reaches the network.
//! - `config`: typed settings loaded from the environment.

pub mod config;
pub mod forms;
pub mod net;
pub mod state;
