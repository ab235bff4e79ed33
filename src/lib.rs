pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod guard;
pub mod models;
pub mod observer;
pub mod store;
pub mod types;

pub use backend::{Backend, MemoryBackend, RestBackend};
pub use error::BackendError;
pub use guard::{GuardDecision, RouteGuard};
pub use store::{ActionError, ActionResult, AppState, AppStore, AuthState, AuthStore, FetchOutcome};
