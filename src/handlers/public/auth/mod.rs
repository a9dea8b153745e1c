// handlers/public/auth/mod.rs - Public authentication handlers
//
// Session acquisition and release. None of these require a session.

pub mod login;
pub mod logout;
pub mod register;

pub use login::login;
pub use logout::logout;
pub use register::register;
