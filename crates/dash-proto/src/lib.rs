pub mod config;
pub mod platform;
pub mod record;
pub mod registry;
