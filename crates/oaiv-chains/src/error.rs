use oaiv_models::BlockchainType;
use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid {blockchain} address {address:?}"))]
    InvalidAddress {
        blockchain: BlockchainType,
        address: String,
    },

    #[snafu(display("Invalid {blockchain} private key: {reason}"))]
    InvalidPrivateKey {
        blockchain: BlockchainType,
        reason: String,
    },

    #[snafu(display("Address {address} does not match the private key (derives {derived})"))]
    KeyAddressMismatch { address: String, derived: String },

    #[snafu(display("An actor needs a private key, an address, or both"))]
    MissingKeyMaterial,

    #[snafu(display("Actor {address} has no private key and cannot sign"))]
    MissingPrivateKey { address: String },

    #[snafu(display("Expected a {expected} actor or transaction, got {actual}"))]
    ChainMismatch {
        expected: BlockchainType,
        actual: BlockchainType,
    },

    #[snafu(display("Actor {address} belongs to network {actual}, backend is on {expected}"))]
    NetworkMismatch {
        address: String,
        expected: String,
        actual: String,
    },

    #[snafu(display("Unknown currency {currency:?}"))]
    UnknownCurrency { currency: String },

    #[snafu(display("Insufficient funds: required {required} sats, available {available} sats"))]
    InsufficientFunds { required: u64, available: u64 },

    #[snafu(display("Amount of {amount} sats is below the dust limit"))]
    DustOutput { amount: u64 },

    #[snafu(display("Explorer error: {source}"))]
    Explorer {
        source: block_explorer_client::Error,
    },

    #[snafu(display("RPC error during {action}: {source}"))]
    Rpc {
        action: &'static str,
        source: alloy::transports::TransportError,
    },

    #[snafu(display("Invalid node URL {url:?}"))]
    InvalidNodeUrl { url: String, source: url::ParseError },

    #[snafu(display("Failed to sign transaction: {message}"))]
    Signing { message: String },

    #[snafu(display("Chain not supported: {chain}"))]
    ChainNotSupported { chain: String },

    #[snafu(display("Malformed explorer data: {message}"))]
    MalformedResponse { message: String },

    #[snafu(transparent)]
    Model { source: oaiv_models::Error },
}

impl From<block_explorer_client::Error> for Error {
    fn from(source: block_explorer_client::Error) -> Self {
        Error::Explorer { source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
