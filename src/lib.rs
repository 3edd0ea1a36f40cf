pub mod app;
pub mod clipboard;
pub mod config;
pub mod display;
pub mod migrate;
pub mod models;
pub mod omdb;
pub mod sheets;
pub mod utils;
