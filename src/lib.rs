pub mod app;
pub mod blast;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod reads;
pub mod resolver;
