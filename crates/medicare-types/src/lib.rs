pub mod api;
pub mod dashboard;
pub mod events;
pub mod models;
pub mod validate;
