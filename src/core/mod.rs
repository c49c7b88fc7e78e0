pub mod config;
pub mod display;
pub mod loader;
pub mod paths;
pub mod preprocess;
pub mod schema;
