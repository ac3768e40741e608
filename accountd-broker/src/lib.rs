//! Accountd broker
//!
//! An identity broker: visitors prove control of identifiers (emails,
//! domains, third-party accounts) through pluggable verification
//! adapters, and the broker links them to user handles in a durable
//! account graph. The outcome of a successful flow is a signed
//! assertion any relying party can verify offline.

pub mod adapters;
pub mod codes;
pub mod config;
pub mod error;
pub mod flow;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::BrokerError;
pub use state::AppState;
