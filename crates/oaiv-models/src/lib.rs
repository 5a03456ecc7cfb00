pub mod balance;
pub mod chain;
pub mod error;
pub mod key_pair;
pub mod tokens;
pub mod transaction;
pub mod units;

pub use balance::*;
pub use chain::*;
pub use error::{Error, Result};
pub use key_pair::*;
pub use tokens::*;
pub use transaction::*;
