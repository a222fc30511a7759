use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::model::metadata::Metadata;

/// Receipt for a catalog transaction: which catalogs took part and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    transaction_id: String,
    catalog_ids: BTreeSet<String>,
    received_at: DateTime<Utc>,
}

impl TransactionReceipt {
    pub fn new<I, S>(transaction_id: impl Into<String>, catalog_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transaction_id: transaction_id.into(),
            catalog_ids: catalog_ids.into_iter().map(Into::into).collect(),
            received_at: Utc::now(),
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn catalog_ids(&self) -> &BTreeSet<String> {
        &self.catalog_ids
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Metadata paired with the receipt of the transaction that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionalMetadata {
    receipt: TransactionReceipt,
    metadata: Metadata,
}

impl TransactionalMetadata {
    pub fn new(receipt: TransactionReceipt, metadata: Metadata) -> Self {
        Self { receipt, metadata }
    }

    pub fn receipt(&self) -> &TransactionReceipt {
        &self.receipt
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
