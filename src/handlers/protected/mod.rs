// handlers/protected/mod.rs - Protected handlers (session required)
//
// Every route here sits behind `session_middleware`, so handlers can take
// `Extension<Session>` and trust it is a live, valid session.

pub mod entity;
pub mod params;
pub mod schedule;
pub mod schedule_detail;
pub mod user;

pub use params::{ListParams, ListQuery};
