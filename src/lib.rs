pub mod archive;
pub mod coerce;
pub mod completeness;
pub mod config;
pub mod export;
pub mod features;
pub mod fixtures;
pub mod http_client;
pub mod logging;
pub mod model;
pub mod odds;
pub mod pressure;
pub mod shutdown;
pub mod stats;
pub mod store;
pub mod sync;
