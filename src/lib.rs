pub mod analysis;
pub mod clean;
pub mod config;
pub mod consolidate;
pub mod enrich;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod store;
pub mod trip;
