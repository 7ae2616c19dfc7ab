pub mod config;
pub mod connection_manager;
pub mod dashboard;
pub mod data_source;
pub mod metrics;
pub mod query_runner;
pub mod shell;
pub mod statement_guard;
pub mod tabular;
pub mod view_renderer;
