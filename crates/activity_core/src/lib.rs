pub mod activity_api;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod policy;
pub mod stats;
pub mod storage;
pub mod suspension;
