//! Connections and transactions: the per-entity state the engine tracks
//! for the host's live traffic.

mod connection;
mod parsed;
mod transaction;

pub use connection::{ConnFlags, Connection};
pub use parsed::{Header, RequestLine, ResponseLine};
pub use transaction::{BodyCapture, Transaction, TxFlags};
