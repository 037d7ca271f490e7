// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition plus the service banner and health check.
// Middleware: none

pub mod auth;
pub mod system;

pub use auth::{login, register};
pub use system::{health, root};
