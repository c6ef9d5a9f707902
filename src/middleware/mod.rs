pub mod auth;
pub mod error_envelope;
pub mod permissions;
pub mod request_logger;
