//! Ledger client interface
//!
//! The ledger is consumed as an opaque service. Nothing here knows about
//! accounts, consensus or indexers beyond the verbs below.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Ledger client error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The request timed out
    #[error("Ledger request timed out")]
    Timeout,
    /// The ledger or indexer is rate limiting us
    #[error("Ledger rate limited the request")]
    RateLimited,
    /// The operation is not supported by this ledger
    #[error("Unsupported ledger operation: {0}")]
    Unsupported(String),
    /// The ledger rejected the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    /// The requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// Any other transport failure
    #[error("Ledger transport error: {0}")]
    Transport(String),
}

impl LedgerError {
    /// Whether waiting and trying again could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Transport(_))
    }
}

/// An outbound payment carrying a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Sending account address
    pub sender: String,
    /// Receiving account address
    pub receiver: String,
    /// Value transferred alongside the note
    pub amount: u64,
    /// Opaque note bytes (an encoded envelope)
    pub note: Vec<u8>,
}

/// Result of submitting one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Ledger transaction id
    pub tx_id: String,
    /// Fee charged, when the ledger reports it
    pub fee: Option<u64>,
    /// Block height the transaction was confirmed in
    pub height: u64,
}

/// Result of submitting an atomic group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReceipt {
    /// Transaction ids in submission order
    pub tx_ids: Vec<String>,
    /// Total fee for the group, when the ledger reports it
    pub fee: Option<u64>,
    /// Block height the group was confirmed in
    pub height: u64,
}

/// A transaction observed on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTransaction {
    /// Ledger transaction id
    pub tx_id: String,
    /// Sending account address
    pub sender: String,
    /// Receiving account address
    pub receiver: String,
    /// Block height
    pub height: u64,
    /// Value transferred
    pub amount: u64,
    /// Note bytes
    pub note: Vec<u8>,
    /// Atomic group the transaction was confirmed in, if any
    pub group_id: Option<String>,
}

/// One page of a transaction query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPage {
    /// Transactions on this page, in ledger order
    pub transactions: Vec<InboundTransaction>,
    /// Token for the next page, `None` on the last page
    pub next_page: Option<String>,
}

/// Ledger verbs the messaging layer depends on
#[async_trait]
pub trait LedgerClient: Send + Sync + Debug {
    /// Submit a single transaction and wait for confirmation
    async fn submit_transaction(&self, transaction: Transaction) -> Result<TxReceipt, LedgerError>;

    /// Submit transactions as one atomic group: all confirm or none do
    async fn submit_group(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<GroupReceipt, LedgerError>;

    /// Transactions received by `address` at or above `since_height`
    async fn query_transactions_to(
        &self,
        address: &str,
        since_height: u64,
        page: Option<String>,
    ) -> Result<TransactionPage, LedgerError>;

    /// Latest confirmed block height
    async fn current_height(&self) -> Result<u64, LedgerError>;

    /// Look up the X25519 public key published by `address`
    async fn discover_public_key(&self, address: &str) -> Result<[u8; 32], LedgerError>;
}

/// Await `fut`, mapping an elapsed `limit` to [`LedgerError::Timeout`]
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LedgerError::Timeout)?
}

/// Every transaction addressed to one of `addresses` at or above
/// `since_height`, following pagination to the end.
///
/// Each remote call is bounded by `query_timeout`.
pub(crate) async fn fetch_inbound(
    ledger: &dyn LedgerClient,
    addresses: &[String],
    since_height: u64,
    query_timeout: Duration,
) -> Result<Vec<InboundTransaction>, LedgerError> {
    let mut transactions = Vec::new();
    for address in addresses {
        let mut page = None;
        loop {
            let result = with_timeout(
                query_timeout,
                ledger.query_transactions_to(address, since_height, page.take()),
            )
            .await?;
            transactions.extend(result.transactions);
            match result.next_page {
                Some(next) => page = Some(next),
                None => break,
            }
        }
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(LedgerError::Timeout.is_transient());
        assert!(LedgerError::RateLimited.is_transient());
        assert!(LedgerError::Transport("reset".into()).is_transient());
        assert!(!LedgerError::Rejected("overspend".into()).is_transient());
        assert!(!LedgerError::Unsupported("groups".into()).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, LedgerError>(7u64)
        };
        let result = with_timeout(Duration::from_secs(10), slow).await;
        assert_eq!(result, Err(LedgerError::Timeout));

        let fast = async { Ok::<_, LedgerError>(7u64) };
        assert_eq!(with_timeout(Duration::from_secs(10), fast).await, Ok(7));
    }
}
