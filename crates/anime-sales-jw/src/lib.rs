pub mod config;
pub mod handlers;

pub use config::Config;
pub use handlers::{AppState, router};
