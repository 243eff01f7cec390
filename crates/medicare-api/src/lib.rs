pub mod access;
pub mod auth;
pub mod convert;
pub mod dashboard;
pub mod error;
pub mod medications;
pub mod middleware;
pub mod notifications;
pub mod patients;
pub mod photos;
pub mod router;
pub mod state;
pub mod storage;

pub use router::router;
pub use state::{AppState, AppStateInner};
