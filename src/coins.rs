use std::fmt;

use serde::{Deserialize, Serialize};

/// An EliteCoins amount, stored as a whole number of coins.
///
/// Balances are represented with the same type; the unsigned backing
/// integer makes negative balances unrepresentable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
#[serde(transparent)]
pub struct Coins(u64);

impl Coins {
    pub const ZERO: Coins = Coins(0);

    pub const fn new(value: u64) -> Self {
        Coins(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Coins)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Coins)
    }

    /// Subtraction flooring at zero, used by administrative revocation.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Coins(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
