pub mod app;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod session;
pub mod upstream;
