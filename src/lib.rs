pub mod config;
pub mod error;
pub mod git;
pub mod graph;
pub mod llm;
pub mod resolution;
pub mod store;
pub mod utils;
