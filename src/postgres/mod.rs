// ABOUTME: PostgreSQL utilities module
// ABOUTME: Exports connection management and the read-only catalog queries

pub mod catalog;
pub mod connection;

pub use catalog::{
    CatalogSession, Connector, LogicalSlot, PgConnector, EXCLUDED_DATABASES,
};
pub use connection::connect;
