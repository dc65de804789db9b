pub mod api;
pub mod config;
pub mod error;
pub mod exchange;
pub mod history;
pub mod portfolio;
pub mod storage;
