// Library exports for AppFab
// Integration tests drive the stores, the workflow and the router through these.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod gateway;
pub mod ledger;
pub mod routes;
pub mod state;
pub mod store;
pub mod workflow;
