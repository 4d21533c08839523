pub mod auth;
pub mod contact;
pub mod extract;
pub mod health;
pub mod incidents;
pub mod middleware;
pub mod routes;
pub mod users;

pub use routes::{create_router, AppState};
