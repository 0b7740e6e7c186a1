// handlers/auth/mod.rs - Session lifecycle endpoints
//
// Thin adapters between axum and crate::session: extract the cookie jar and
// body, run the flow, return the mutated jar alongside the result.

pub mod login;
pub mod logout;
pub mod password;
pub mod refresh;
pub mod switch_organization;

pub use login::login;
pub use logout::logout;
pub use password::{forgot_password, reset_password};
pub use refresh::refresh;
pub use switch_organization::switch_organization;
