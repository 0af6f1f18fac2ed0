//! Money represented in integer paise to avoid floating point issues.

use serde::{Deserialize, Serialize};

/// A rupee amount stored as integer paise (e.g., 1000 = ₹10.00).
/// Serializes as the bare paise integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    paise: i64,
}

impl Money {
    /// Creates a new Money amount from paise.
    pub fn from_paise(paise: i64) -> Self {
        Self { paise }
    }

    /// Creates a new Money amount from a whole-rupee value.
    pub fn from_rupees(rupees: i64) -> Self {
        Self {
            paise: rupees * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { paise: 0 }
    }

    /// Returns the amount in paise.
    pub fn paise(&self) -> i64 {
        self.paise
    }

    /// Returns the rupee portion (whole number).
    pub fn rupees(&self) -> i64 {
        self.paise / 100
    }

    /// Returns the paise portion (remainder after rupees).
    pub fn paise_part(&self) -> i64 {
        self.paise.abs() % 100
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.paise == 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            paise: self.paise * quantity as i64,
        }
    }

    /// Returns `percent`% of this amount, rounding toward zero.
    pub fn percent(&self, percent: u8) -> Money {
        Money {
            paise: self.paise * percent as i64 / 100,
        }
    }

    /// Subtracts, flooring the result at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money {
            paise: (self.paise - other.paise).max(0),
        }
    }

    /// Returns the smaller of the two amounts.
    pub fn min(self, other: Money) -> Money {
        if self.paise <= other.paise { self } else { other }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.paise < 0 {
            write!(f, "-₹{}.{:02}", self.rupees().abs(), self.paise_part())
        } else {
            write!(f, "₹{}.{:02}", self.rupees(), self.paise_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            paise: self.paise + rhs.paise,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            paise: self.paise - rhs.paise,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.paise += rhs.paise;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_paise_parts() {
        let money = Money::from_paise(1234);
        assert_eq!(money.paise(), 1234);
        assert_eq!(money.rupees(), 12);
        assert_eq!(money.paise_part(), 34);
    }

    #[test]
    fn from_rupees() {
        let money = Money::from_rupees(50);
        assert_eq!(money.paise(), 5000);
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_paise(1234).to_string(), "₹12.34");
        assert_eq!(Money::from_paise(5).to_string(), "₹0.05");
        assert_eq!(Money::from_paise(-1234).to_string(), "-₹12.34");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(500);

        assert_eq!((a + b).paise(), 1500);
        assert_eq!((a - b).paise(), 500);
        assert_eq!(a.multiply(3).paise(), 3000);
    }

    #[test]
    fn percent_rounds_toward_zero() {
        assert_eq!(Money::from_paise(200_000).percent(10).paise(), 20_000);
        assert_eq!(Money::from_paise(999).percent(10).paise(), 99);
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Money::from_paise(100);
        let b = Money::from_paise(500);
        assert_eq!(a.saturating_sub(b), Money::zero());
        assert_eq!(b.saturating_sub(a).paise(), 400);
    }

    #[test]
    fn min_picks_smaller() {
        let a = Money::from_paise(100);
        let b = Money::from_paise(500);
        assert_eq!(a.min(b), a);
        assert_eq!(b.min(a), a);
    }

    #[test]
    fn serialization_roundtrip() {
        let money = Money::from_paise(4321);
        let json = serde_json::to_string(&money).unwrap();
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(money, deserialized);
    }
}
