pub mod config;
pub mod logging;

pub mod agent;
pub mod auth;
pub mod batch;
pub mod catalog;
pub mod checksum;
pub mod clock;
pub mod descriptor;
pub mod http;
pub mod ledger;
pub mod naming;
pub mod preflight;
pub mod scheduler;
