// solace-server/src/lib.rs

pub mod api;
pub mod auth;
pub mod context;
pub mod routes;
pub mod ws;

pub use context::{AppState, Repositories};
pub use routes::build_router;
