//! External voucher validation.
//!
//! The validator is the sole owner of single-use enforcement: a code it
//! reports as used or unknown is rejected here, and a code it accepts is
//! credited without any local reuse tracking.

use async_trait::async_trait;
use thiserror::Error;

/// What the validator reported for a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherOutcome {
    pub success: bool,
    /// Coins the code is worth; meaningful only when `success`.
    pub virtual_currency: u64,
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("voucher validator unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait VoucherValidator: Send + Sync {
    async fn validate(&self, code: &str) -> Result<VoucherOutcome, ValidatorError>;
}

pub use fixed::StaticVouchers;

mod fixed {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::{ValidatorError, VoucherOutcome, VoucherValidator, async_trait};

    /// Fixed voucher table that consumes codes on first validation,
    /// mimicking the external service's single-use behavior.
    #[derive(Debug, Default)]
    pub struct StaticVouchers {
        codes: Mutex<HashMap<String, u64>>,
    }

    impl StaticVouchers {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_code(&self, code: impl Into<String>, coins: u64) {
            self.codes.lock().await.insert(code.into(), coins);
        }
    }

    #[async_trait]
    impl VoucherValidator for StaticVouchers {
        async fn validate(&self, code: &str) -> Result<VoucherOutcome, ValidatorError> {
            let mut codes = self.codes.lock().await;
            match codes.remove(code) {
                Some(coins) => Ok(VoucherOutcome {
                    success: true,
                    virtual_currency: coins,
                }),
                None => Ok(VoucherOutcome {
                    success: false,
                    virtual_currency: 0,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_code_reports_value_once() {
        let vouchers = StaticVouchers::new();
        vouchers.add_code("WELCOME50", 50).await;

        let first = vouchers.validate("WELCOME50").await.unwrap();
        assert!(first.success);
        assert_eq!(first.virtual_currency, 50);

        // Single use: the second validation fails.
        let second = vouchers.validate("WELCOME50").await.unwrap();
        assert!(!second.success);
    }

    #[tokio::test]
    async fn unknown_code_is_rejected() {
        let vouchers = StaticVouchers::new();
        assert!(!vouchers.validate("GARBAGE").await.unwrap().success);
    }
}
