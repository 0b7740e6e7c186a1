// handlers/mod.rs - HTTP surface of the gateway
//
// auth:    session lifecycle; the only handlers that write cookies
// proxy:   pass-through resources, identity headers forwarded untouched
// images:  binary relay with its own deadline
// health:  liveness, never touches upstream
pub mod auth;
pub mod health;
pub mod images;
pub mod proxy;

pub use health::health;
