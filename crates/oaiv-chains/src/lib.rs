pub mod actor;
pub mod dispatcher;
pub mod error;
pub mod traits;

// Chain implementations
pub mod bitcoin;
pub mod ethereum;

pub use actor::{Actor, SignedTransaction, UnsignedTransaction};
pub use dispatcher::ChainDispatcher;
pub use error::{Error, Result};
pub use traits::{ChainOperations, TransferRequest};
