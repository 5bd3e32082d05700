pub mod catalog;
pub mod config_store;
pub mod credentials;
pub mod defaults;
pub mod factory;
pub mod gemini;
