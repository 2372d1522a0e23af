pub mod analyzer;
pub mod config;
pub mod fetcher;
pub mod monitor;
pub mod notifications;
pub mod retry;
pub mod tracker;
pub mod version;
pub mod web;
