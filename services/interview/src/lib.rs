pub mod app;
pub mod config;
pub mod evaluation_log;
pub mod prompt_loader;
