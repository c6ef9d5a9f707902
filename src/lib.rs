//! GMP regulatory administration backend: the Request126 approval workflow
//! over PostgreSQL, served as JSON under `/api`.

pub mod api;
pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod utils;
pub mod workflow;
