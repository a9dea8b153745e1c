// handlers/public/mod.rs - Public handlers (no session required)

pub mod auth;
pub mod status;

pub use status::{health, root};
