pub mod auth;
pub mod blobs;
mod blocking;
pub mod crews;
pub mod error;
pub mod feed;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
