pub mod alert;
pub mod config;
pub mod error;
pub mod hazard;
pub mod inventory;
pub mod output;
pub mod planner;
pub mod scan;
pub mod server;
pub mod store;
pub mod types;
