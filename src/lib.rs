// Library exports for testing
pub mod challenge;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod purchase;
pub mod risk;
pub mod verify;
