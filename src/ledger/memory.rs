use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    LedgerPolicy, LedgerResult, NewTransaction, Outcome, TransactionLedger, TransactionRecord,
};

/// Process-local ledger. Each call holds the lock for its whole
/// read-modify-write; ordering across calls is last-write-wins.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<String, TransactionRecord>>,
    policy: LedgerPolicy,
}

impl InMemoryLedger {
    pub fn new(policy: LedgerPolicy) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            policy,
        }
    }

    fn purge_expired(&self, records: &mut HashMap<String, TransactionRecord>, now: DateTime<Utc>) {
        let before = records.len();
        records.retain(|_, record| !record.is_expired(self.policy.ttl, now));
        let purged = before - records.len();
        if purged > 0 {
            debug!(purged, "expired ledger records purged");
        }
    }

    fn evict_oldest(&self, records: &mut HashMap<String, TransactionRecord>) {
        let Some(max) = self.policy.max_entries else {
            return;
        };
        while records.len() > max {
            let oldest = records
                .values()
                .min_by_key(|record| record.created_at)
                .map(|record| record.transaction_id.clone());
            match oldest {
                Some(id) => {
                    records.remove(&id);
                    debug!(transaction_id = %id, "ledger at capacity, oldest record evicted");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl TransactionLedger for InMemoryLedger {
    async fn create(
        &self,
        transaction_id: &str,
        new: NewTransaction,
    ) -> LedgerResult<TransactionRecord> {
        let now = Utc::now();
        let record = TransactionRecord::pending(transaction_id, new, now);

        let mut records = self.records.write().await;
        self.purge_expired(&mut records, now);
        if records
            .insert(transaction_id.to_string(), record.clone())
            .is_some()
        {
            debug!(transaction_id = %transaction_id, "existing ledger record replaced");
        }
        self.evict_oldest(&mut records);

        Ok(record)
    }

    async fn get(&self, transaction_id: &str) -> LedgerResult<Option<TransactionRecord>> {
        let now = Utc::now();
        let records = self.records.read().await;
        Ok(records
            .get(transaction_id)
            .filter(|record| !record.is_expired(self.policy.ttl, now))
            .cloned())
    }

    async fn apply_result(
        &self,
        transaction_id: &str,
        outcome: Outcome,
    ) -> LedgerResult<Option<TransactionRecord>> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        self.purge_expired(&mut records, now);

        match records.get_mut(transaction_id) {
            Some(record) => {
                record.apply(&outcome, now);
                Ok(Some(record.clone()))
            }
            None => {
                warn!(
                    transaction_id = %transaction_id,
                    status = %outcome.state,
                    "result for unknown transaction ignored"
                );
                Ok(None)
            }
        }
    }

    async fn len(&self) -> LedgerResult<usize> {
        let now = Utc::now();
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| !record.is_expired(self.policy.ttl, now))
            .count())
    }
}
