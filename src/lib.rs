pub mod api;
pub mod config;
pub mod error;
pub mod labels;
pub mod models;
pub mod prediction;
pub mod preprocess;
pub mod state;
