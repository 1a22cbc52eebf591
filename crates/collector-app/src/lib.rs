#![allow(dead_code)]

pub mod config;
pub mod state;

pub use config::CollectorConfig;
pub use state::FileStateStore;
