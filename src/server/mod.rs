pub mod routes;

pub use routes::{routes, serve, AppState};
