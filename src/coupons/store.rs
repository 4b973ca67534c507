//! Coupon store

use mockall::automock;
use thiserror::Error;
use tracing::debug;

use crate::coupons::CouponRecord;

/// Errors returned by a [`CouponStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponStoreError {
    /// The backing store could not be reached.
    #[error("coupon store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("malformed coupon record {code}: {reason}")]
    Malformed {
        /// Code of the offending record.
        code: String,

        /// What was wrong with it.
        reason: String,
    },
}

/// Source of coupon records.
#[automock]
pub trait CouponStore: Send + Sync {
    /// Load the records for `codes`. Unknown codes are omitted.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponStoreError`] if the store cannot be read.
    fn load_by_codes(&self, codes: &[String]) -> Result<Vec<CouponRecord<'static>>, CouponStoreError>;
}

/// Coupon store backed by a vector, used by fixtures and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCouponStore {
    records: Vec<CouponRecord<'static>>,
}

impl InMemoryCouponStore {
    /// Create a store over `records`.
    pub fn new(records: Vec<CouponRecord<'static>>) -> Self {
        Self { records }
    }

    /// Add a record.
    pub fn insert(&mut self, record: CouponRecord<'static>) {
        self.records.push(record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CouponStore for InMemoryCouponStore {
    fn load_by_codes(&self, codes: &[String]) -> Result<Vec<CouponRecord<'static>>, CouponStoreError> {
        let records: Vec<CouponRecord<'static>> = self
            .records
            .iter()
            .filter(|record| codes.contains(&record.code))
            .cloned()
            .collect();

        debug!(requested = codes.len(), found = records.len(), "loaded coupon records");

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn loads_only_requested_codes() -> TestResult {
        let store = InMemoryCouponStore::new(vec![
            CouponRecord::new("SAVE10", "Save 10", USD),
            CouponRecord::new("FREESHIP", "Free shipping", USD),
        ]);

        let records = store.load_by_codes(&["SAVE10".to_string(), "UNKNOWN".to_string()])?;

        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(|record| record.code.as_str()), Some("SAVE10"));

        Ok(())
    }

    #[test]
    fn mock_store_returns_configured_error() {
        let mut store = MockCouponStore::new();

        store
            .expect_load_by_codes()
            .returning(|_| Err(CouponStoreError::Unavailable("timeout".to_string())));

        assert_eq!(
            store.load_by_codes(&[]),
            Err(CouponStoreError::Unavailable("timeout".to_string()))
        );
    }
}
