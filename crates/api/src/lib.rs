//! HTTP front end for the CSV aggregation service: upload, status polling
//! and authorized artifact download.

pub mod app;
pub mod config;
pub mod middleware;
