pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod observability;
pub mod server;
pub mod storage;

// Application ports and their infrastructure adapters
pub mod app;
pub mod infra;

// Module and service catalog clients
pub mod catalog;

// BOM import and aggregation
pub mod pipeline;

// PDF output
pub mod report;
