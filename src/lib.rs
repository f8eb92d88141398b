pub mod anomaly_log;
pub mod coerce;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod profiles;
pub mod reconcile;
pub mod sink;
pub mod types;
pub mod warehouse;
