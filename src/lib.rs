pub mod area;
pub mod buffer;
pub mod config;
pub mod errors;
pub mod handler;
pub mod reader;
pub mod relations;
pub mod types;
