// proxy module - organisation lookup / registry proxy service

pub mod config;
pub mod server;
pub mod token_manager;

pub mod common; // Validation
pub mod handlers; // API endpoint handlers
pub mod mappers; // Request encodings
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client

pub use server::{AppState, AxumServer};
pub use token_manager::TokenManager;
