//! Core data model.
//!
//! Dealers and products are resolved from external keys to internal ids.
//! A work item pairs one resolved dealer with one product key; each consumed
//! work item yields exactly one outcome record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Store entities
// ---------------------------------------------------------------------------

/// A dealer resolved from its external code. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dealer {
    pub id: i64,
    pub external_key: String,
}

/// A product resolved from a barcode-like external key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub external_key: String,
}

/// Association between one product and one dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    pub product_id: i64,
    pub dealer_id: i64,
    pub active: bool,
}

impl LinkRecord {
    /// A new, active link.
    pub fn active(product_id: i64, dealer_id: i64) -> Self {
        Self {
            product_id,
            dealer_id,
            active: true,
        }
    }
}

/// Side effect of a successful commit. Its presence after the commit is
/// the only evidence that the commit was durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingMarker {
    pub product_id: i64,
    pub dealer_id: i64,
}

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

/// One (dealer, product key) pair to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub dealer: Dealer,
    pub product_key: String,
}

/// Newtype for run IDs. Tags logs and spans of a single engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw input for one run.
///
/// When `pairs` is non-empty it wins: each dealer key is combined only with
/// its own product keys. Otherwise every dealer key is combined with every
/// product key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunInput {
    pub dealer_keys: Vec<String>,
    pub product_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pairs: BTreeMap<String, Vec<String>>,
}

impl RunInput {
    /// Legacy cross-product input.
    pub fn cross(dealer_keys: Vec<String>, product_keys: Vec<String>) -> Self {
        Self {
            dealer_keys,
            product_keys,
            pairs: BTreeMap::new(),
        }
    }

    /// Explicit dealer → products mapping.
    pub fn pairs(pairs: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            dealer_keys: Vec::new(),
            product_keys: Vec::new(),
            pairs,
        }
    }

    pub fn is_explicit(&self) -> bool {
        !self.pairs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Fail,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Fail => "fail",
        };
        write!(f, "{s}")
    }
}

/// Result of processing one work item. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    /// Set only when the product key itself could not be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_key: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OutcomeRecord {
    pub fn ok(dealer_id: i64, product_id: i64) -> Self {
        Self {
            dealer_id: Some(dealer_id),
            product_id: Some(product_id),
            external_key: None,
            status: Status::Ok,
            reason: None,
        }
    }

    pub fn fail(dealer_id: i64, product_id: Option<i64>, reason: impl Into<String>) -> Self {
        Self {
            dealer_id: Some(dealer_id),
            product_id,
            external_key: None,
            status: Status::Fail,
            reason: Some(reason.into()),
        }
    }

    pub fn with_external_key(mut self, key: impl Into<String>) -> Self {
        self.external_key = Some(key.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// The aggregate value returned by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub success: Vec<OutcomeRecord>,
    pub failure: Vec<OutcomeRecord>,
}

impl Report {
    pub fn total(&self) -> usize {
        self.success.len() + self.failure.len()
    }

    /// Success share in percent of `expected` items; 0 when nothing was expected.
    pub fn success_rate(&self, expected: usize) -> f64 {
        if expected == 0 {
            return 0.0;
        }
        self.success.len() as f64 / expected as f64 * 100.0
    }
}
