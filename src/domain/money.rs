use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point monetary amount held at currency minor-unit precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const TARGET_DECIMALS: u32 = 2;
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Rounds half-to-even onto the target scale.
    pub fn new(value: Decimal) -> Self {
        let mut rounded = value
            .round_dp_with_strategy(Self::TARGET_DECIMALS, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(Self::TARGET_DECIMALS);
        Self(rounded)
    }

    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, Self::TARGET_DECIMALS))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money::new)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money::new)
    }

    pub fn from_decimal_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Decimal::from_str(s).ok().map(Self::new)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_decimal_str(s).ok_or_else(|| format!("Invalid Money format: {}", s))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut value = self.0;
        value.rescale(Self::TARGET_DECIMALS);
        write!(f, "{}", value)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_decimal_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid Money format: {}", s)))
    }
}
