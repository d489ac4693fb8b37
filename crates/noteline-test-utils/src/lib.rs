//! In-memory ledger for tests
//!
//! [`MockLedger`] records every submission with the (tokio) time it was made,
//! serves scripted inbound transactions page by page and can be told to fail
//! groups, fail submissions after a count or stall queries.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use noteline_core::ledger::{
    GroupReceipt, InboundTransaction, LedgerClient, LedgerError, Transaction, TransactionPage,
    TxReceipt,
};
use parking_lot::Mutex;
use tokio::time::Instant;

/// One submitted transaction
#[derive(Debug, Clone)]
pub struct Submission {
    /// Assigned transaction id
    pub tx_id: String,
    /// The transaction as submitted
    pub transaction: Transaction,
    /// Height it was confirmed at
    pub height: u64,
    /// Group it was confirmed in, for grouped submissions
    pub group_id: Option<String>,
    /// When it was submitted
    pub at: Instant,
}

impl Submission {
    /// The transaction as its receiver would observe it
    pub fn to_inbound(&self) -> InboundTransaction {
        InboundTransaction {
            tx_id: self.tx_id.clone(),
            sender: self.transaction.sender.clone(),
            receiver: self.transaction.receiver.clone(),
            height: self.height,
            amount: self.transaction.amount,
            note: self.transaction.note.clone(),
            group_id: self.group_id.clone(),
        }
    }
}

#[derive(Debug)]
struct State {
    height: u64,
    fee: Option<u64>,
    page_size: usize,
    next_tx: u64,
    inbound: Vec<InboundTransaction>,
    submissions: Vec<Submission>,
    groups: Vec<Vec<String>>,
    public_keys: HashMap<String, [u8; 32]>,
    discovery_calls: HashMap<String, usize>,
    query_calls: usize,
    group_error: Option<LedgerError>,
    fail_after: Option<(usize, LedgerError)>,
    query_delay: Option<Duration>,
}

/// Scriptable [`LedgerClient`]
#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<State>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Ledger at height 100 reporting a fee of 1000 per transaction
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                height: 100,
                fee: Some(1000),
                page_size: 50,
                next_tx: 1,
                inbound: Vec::new(),
                submissions: Vec::new(),
                groups: Vec::new(),
                public_keys: HashMap::new(),
                discovery_calls: HashMap::new(),
                query_calls: 0,
                group_error: None,
                fail_after: None,
                query_delay: None,
            }),
        }
    }

    /// Fee reported per transaction, `None` to omit it from receipts
    pub fn with_fee(self, fee: Option<u64>) -> Self {
        self.state.lock().fee = fee;
        self
    }

    /// Transactions returned per query page
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().page_size = page_size.max(1);
        self
    }

    /// Current height
    pub fn height(&self) -> u64 {
        self.state.lock().height
    }

    /// Jump to `height`
    pub fn set_height(&self, height: u64) {
        self.state.lock().height = height;
    }

    /// Publish a public key for `address`
    pub fn set_public_key(&self, address: &str, key: [u8; 32]) {
        self.state.lock().public_keys.insert(address.to_string(), key);
    }

    /// Make every group submission fail with `error`
    pub fn fail_groups(&self, error: LedgerError) {
        self.state.lock().group_error = Some(error);
    }

    /// Let `count` more single submissions succeed, then fail with `error`
    pub fn fail_submissions_after(&self, count: usize, error: LedgerError) {
        let mut state = self.state.lock();
        let already = state.submissions.len();
        state.fail_after = Some((already + count, error));
    }

    /// Stall every query by `delay`
    pub fn set_query_delay(&self, delay: Duration) {
        self.state.lock().query_delay = Some(delay);
    }

    /// Add a transaction to the inbound feed at the current height, returning it
    pub fn deliver(&self, sender: &str, receiver: &str, amount: u64, note: Vec<u8>) -> InboundTransaction {
        let mut state = self.state.lock();
        let tx = InboundTransaction {
            tx_id: format!("IN-{}", state.next_tx),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            height: state.height,
            amount,
            note,
            group_id: None,
        };
        state.next_tx += 1;
        state.inbound.push(tx.clone());
        tx
    }

    /// Add an arbitrary transaction to the inbound feed
    pub fn push_inbound(&self, transaction: InboundTransaction) {
        self.state.lock().inbound.push(transaction);
    }

    /// Every successful single or grouped submission, in order
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// Transaction ids of each successful group
    pub fn groups(&self) -> Vec<Vec<String>> {
        self.state.lock().groups.clone()
    }

    /// Number of public key lookups for `address`
    pub fn discovery_calls(&self, address: &str) -> usize {
        self.state
            .lock()
            .discovery_calls
            .get(address)
            .copied()
            .unwrap_or_default()
    }

    /// Number of inbound queries served
    pub fn query_calls(&self) -> usize {
        self.state.lock().query_calls
    }

    async fn stall(&self) {
        let delay = self.state.lock().query_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl State {
    fn record(&mut self, transaction: Transaction, height: u64, group_id: Option<String>) -> String {
        let tx_id = format!("TX-{}", self.next_tx);
        self.next_tx += 1;
        self.submissions.push(Submission {
            tx_id: tx_id.clone(),
            transaction,
            height,
            group_id,
            at: Instant::now(),
        });
        tx_id
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit_transaction(&self, transaction: Transaction) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock();
        if let Some((limit, error)) = &state.fail_after
            && state.submissions.len() >= *limit
        {
            return Err(error.clone());
        }

        state.height += 1;
        let height = state.height;
        let tx_id = state.record(transaction, height, None);
        Ok(TxReceipt {
            tx_id,
            fee: state.fee,
            height,
        })
    }

    async fn submit_group(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<GroupReceipt, LedgerError> {
        let mut state = self.state.lock();
        if let Some(error) = &state.group_error {
            return Err(error.clone());
        }

        state.height += 1;
        let height = state.height;
        let count = transactions.len() as u64;
        let group_id = format!("GRP-{}", state.groups.len() + 1);
        let tx_ids: Vec<String> = transactions
            .into_iter()
            .map(|transaction| state.record(transaction, height, Some(group_id.clone())))
            .collect();
        state.groups.push(tx_ids.clone());
        Ok(GroupReceipt {
            tx_ids,
            fee: state.fee.map(|fee| fee * count),
            height,
        })
    }

    async fn query_transactions_to(
        &self,
        address: &str,
        since_height: u64,
        page: Option<String>,
    ) -> Result<TransactionPage, LedgerError> {
        self.stall().await;

        let mut state = self.state.lock();
        state.query_calls += 1;
        let offset = match page {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| LedgerError::Transport(format!("bad page token {token}")))?,
            None => 0,
        };

        let matching: Vec<&InboundTransaction> = state
            .inbound
            .iter()
            .filter(|tx| tx.receiver == address && tx.height >= since_height)
            .collect();
        let end = (offset + state.page_size).min(matching.len());
        let transactions = matching
            .get(offset..end)
            .map(|page| page.iter().map(|tx| (*tx).clone()).collect())
            .unwrap_or_default();
        let next_page = (end < matching.len()).then(|| end.to_string());

        Ok(TransactionPage {
            transactions,
            next_page,
        })
    }

    async fn current_height(&self) -> Result<u64, LedgerError> {
        self.stall().await;
        Ok(self.state.lock().height)
    }

    async fn discover_public_key(&self, address: &str) -> Result<[u8; 32], LedgerError> {
        let mut state = self.state.lock();
        *state
            .discovery_calls
            .entry(address.to_string())
            .or_default() += 1;
        state
            .public_keys
            .get(address)
            .copied()
            .ok_or_else(|| LedgerError::NotFound(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pages_through_inbound() {
        let ledger = MockLedger::new().with_page_size(2);
        for i in 0..5 {
            ledger.deliver("SENDER", "ME", 0, vec![i]);
        }
        ledger.deliver("SENDER", "SOMEONE-ELSE", 0, vec![9]);

        let first = ledger.query_transactions_to("ME", 0, None).await.unwrap();
        assert_eq!(first.transactions.len(), 2);
        let second = ledger
            .query_transactions_to("ME", 0, first.next_page)
            .await
            .unwrap();
        let third = ledger
            .query_transactions_to("ME", 0, second.next_page)
            .await
            .unwrap();
        assert_eq!(third.transactions.len(), 1);
        assert!(third.next_page.is_none());
        assert_eq!(ledger.query_calls(), 3);
    }

    #[tokio::test]
    async fn test_fail_after_count() {
        let ledger = MockLedger::new();
        ledger.fail_submissions_after(1, LedgerError::RateLimited);
        let tx = Transaction {
            sender: "A".into(),
            receiver: "B".into(),
            amount: 0,
            note: vec![],
        };
        assert!(ledger.submit_transaction(tx.clone()).await.is_ok());
        assert_eq!(
            ledger.submit_transaction(tx).await,
            Err(LedgerError::RateLimited)
        );
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_group_members_share_a_group_id() {
        let ledger = MockLedger::new();
        let tx = Transaction {
            sender: "A".into(),
            receiver: "B".into(),
            amount: 0,
            note: vec![],
        };
        ledger.submit_transaction(tx.clone()).await.unwrap();
        ledger
            .submit_group(vec![tx.clone(), tx.clone()])
            .await
            .unwrap();
        ledger.submit_group(vec![tx]).await.unwrap();

        let groups: Vec<Option<String>> = ledger
            .submissions()
            .iter()
            .map(|submission| submission.to_inbound().group_id)
            .collect();
        assert_eq!(
            groups,
            vec![
                None,
                Some("GRP-1".to_string()),
                Some("GRP-1".to_string()),
                Some("GRP-2".to_string()),
            ]
        );
    }
}
