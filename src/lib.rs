// src/lib.rs
pub mod backend;
pub mod banner;
pub mod config;
pub mod errors;
pub mod history;
pub mod job;
pub mod models;
pub mod render;
pub mod reveal;
