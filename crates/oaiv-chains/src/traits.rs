use crate::{Actor, Result};
use async_trait::async_trait;
use oaiv_models::{BalanceMap, BlockchainType, KeyPairCheck, SortOrder, TransactionHistory};
use rust_decimal::Decimal;

/// A value transfer between two actors of the same chain.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    /// Must hold a private key
    pub sender: &'a Actor,
    pub receiver: &'a Actor,
    /// Amount in whole units of `currency`
    pub value: Decimal,
    /// `ETH`, a token symbol, or `BTC`
    pub currency: &'a str,
    /// Gas limit on Ethereum, absolute fee in satoshis on Bitcoin. Estimated
    /// when absent.
    pub gas: Option<u64>,
}

// Implementors hold only configuration and clients, no per-account state.
#[async_trait]
pub trait ChainOperations: Send + Sync {
    fn blockchain(&self) -> BlockchainType;

    /// Whether `address` is well formed for this chain and network.
    fn is_address(&self, address: &str) -> bool;

    /// Whether `private_key` controls `address`. Never fails.
    fn is_key_pair(&self, private_key: &str, address: &str) -> KeyPairCheck;

    /// Balances per address per currency, in whole units.
    async fn balance(&self, addresses: &[String]) -> Result<BalanceMap>;

    async fn get_transactions(
        &self,
        account: &str,
        sort: SortOrder,
        raw: bool,
    ) -> Result<TransactionHistory>;

    /// Generate a fresh key and wrap it in an actor.
    fn create_account(&self) -> Result<Actor>;

    /// Build, sign and broadcast a transfer, returning the transaction id.
    async fn make_transaction(&self, request: TransferRequest<'_>) -> Result<String>;
}
