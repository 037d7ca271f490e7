// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) and Protected (bearer JWT). Handlers stay thin: extract,
// call a service, wrap the result in `ApiResponse`.

pub mod protected;
pub mod public;
