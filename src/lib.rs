pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod session;

pub use app::{router, AppState};
