pub mod auth;
pub mod loader;
pub mod session;
pub mod view;
