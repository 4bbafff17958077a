pub mod collector;
pub mod config;
pub mod fetcher;
pub mod models;
pub mod processor;
pub mod storage;
