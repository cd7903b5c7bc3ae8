mod admin;
mod error;
mod hooks;
mod middleware;

pub use admin::{AdminState, build_admin_router};
pub use hooks::{HooksState, build_hooks_router};
