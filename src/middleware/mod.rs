pub mod auth;
pub mod response;

pub use auth::{access_token, session_middleware, ACCESS_TOKEN_HEADER};
pub use response::{ApiResponse, ApiResult};
