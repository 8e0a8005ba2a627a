//! Client-side state.
//!
//! DESIGN
//! ======
//! State is split by concern: `token` persists the credential, `session`
//! derives who is signed in from it, and `tasks` caches the dashboard list.
//! Only the session controller writes to the token store.

pub mod session;
pub mod tasks;
pub mod token;

pub use session::{Navigator, NoopNavigator, Route, Session, SessionController, SessionError, SessionPhase};
pub use tasks::{TaskList, TaskListState};
pub use token::{FileTokenStore, MemoryTokenStore, NullTokenStore, TokenStore};
