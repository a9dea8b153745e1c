// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (X-AccessToken session required)
pub mod protected;
pub mod public;
