// Incident Desk Library

pub mod api;
pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod observability;
pub mod report;
pub mod services;

pub use config::Config;
pub use errors::{AppError, Result};
