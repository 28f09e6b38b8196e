// Session Middleware - authentication guard for the admin routes

pub mod session_extractor;
pub mod session_middleware;

pub use session_extractor::Session;
pub use session_middleware::*;
