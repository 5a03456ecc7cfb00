mod error;
mod http;

pub mod esplora;
pub mod etherscan;
pub mod ethplorer;

pub use error::{Error, Result};
pub use esplora::EsploraClient;
pub use etherscan::EtherscanClient;
pub use ethplorer::{EthplorerClient, EthplorerMethod};
pub use http::ClientOptions;
