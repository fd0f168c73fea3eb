//! The async connection contract on top of the execution bridge.
//!
//! - `adapter::connection`: `FirebirdConnection`, execution, fetching and autocommit
//! - `adapter::tx`: transaction state machine
//! - `adapter::errors`: statement context and integrity classification for driver failures
//! - `adapter::pool`: bb8 manager and pool

mod connection;
mod errors;
mod pool;
mod tx;

pub use connection::{FirebirdConnection, PING_SQL};
pub use pool::{FirebirdManager, FirebirdPool, PooledFirebirdConnection};
pub use tx::TxState;
