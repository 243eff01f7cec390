//! Client side of MediCare: a typed handle to the server, the session store,
//! a small on-disk cache, form helpers and the dashboard view models a UI
//! renders from.

pub mod backend;
pub mod error;
pub mod forms;
pub mod invalidation;
pub mod local_store;
pub mod session;
pub mod views;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{BackendClient, CareBackend, PhotoUpload};
pub use error::ClientError;
