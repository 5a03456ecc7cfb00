use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid blockchain type {value:?}, expected \"ethereum\" or \"bitcoin\""))]
    InvalidBlockchain { value: String },

    #[snafu(display("Invalid network name {value:?}"))]
    InvalidNetwork { value: String },

    #[snafu(display("Invalid sort order {value:?}, expected \"asc\" or \"desc\""))]
    InvalidSortOrder { value: String },

    #[snafu(display("Invalid amount {value:?}"))]
    InvalidAmount { value: String },

    #[snafu(display("Amount {value} with {decimals} decimals does not fit a decimal"))]
    AmountOverflow { value: String, decimals: u32 },

    #[snafu(display("Failed to read token table {path}: {source}"))]
    ReadTokenTable {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse token table: {source}"))]
    ParseTokenTable { source: serde_json::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
