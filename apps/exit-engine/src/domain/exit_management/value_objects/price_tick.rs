//! Price Tick Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{SessionTime, SessionTimeError};

/// One price observation driving an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Last traded price.
    pub price: Decimal,
    /// Local wall-clock time, used only for end-of-day comparisons.
    pub time: SessionTime,
}

impl PriceTick {
    /// Create a tick.
    #[must_use]
    pub const fn new(price: Decimal, time: SessionTime) -> Self {
        Self { price, time }
    }

    /// Create a tick from an `HH:MM:SS` time string.
    ///
    /// # Errors
    ///
    /// Returns error if the time is malformed.
    pub fn parse(price: Decimal, time: &str) -> Result<Self, SessionTimeError> {
        Ok(Self::new(price, SessionTime::parse(time)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_tick() {
        let tick = PriceTick::parse(dec!(22000), "09:15:30").unwrap();
        assert_eq!(tick.price, dec!(22000));
        assert_eq!(tick.time.to_string(), "09:15:30");
    }

    #[test]
    fn parse_tick_bad_time() {
        assert!(PriceTick::parse(dec!(22000), "9h15").is_err());
    }
}
