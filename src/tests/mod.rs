mod config;
pub mod semantic;
