//! Per-lot Rule Configuration Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::exit_management::errors::RuleConfigError;

/// Trailing stop parameters for a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingRule {
    /// Points of favorable movement required to arm the trailing stop.
    pub activation: Decimal,
    /// Fraction of the favorable excursion given back before exiting.
    pub pullback: Decimal,
}

impl TrailingRule {
    /// Trailing stop level for a lot with the given entry and peak.
    ///
    /// LONG: `peak - (peak - entry) * pullback`;
    /// SHORT: `peak + (entry - peak) * pullback`. Both reduce to the same
    /// expression.
    #[must_use]
    pub fn stop_price(&self, entry: Decimal, peak: Decimal) -> Decimal {
        peak - (peak - entry) * self.pullback
    }
}

/// Raw, unvalidated rule as it appears in configuration files or the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfigSpec {
    /// 1-based lot ID.
    pub lot_id: u32,
    /// Whether the trailing stop is enabled.
    #[serde(default)]
    pub use_trailing_stop: bool,
    /// Activation distance in points.
    #[serde(default)]
    pub trailing_activation: Option<Decimal>,
    /// Pullback ratio in [0, 1].
    #[serde(default)]
    pub trailing_pullback: Option<Decimal>,
    /// Whether the lot may receive a cascaded protective stop.
    #[serde(default)]
    pub use_protective_stop: bool,
    /// Multiplier applied to cumulative prior profit.
    #[serde(default)]
    pub protective_stop_multiplier: Option<Decimal>,
}

/// Immutable per-lot exit rule.
///
/// Only constructible through validation, so the evaluator never sees an
/// inconsistent rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleConfigSpec", into = "RuleConfigSpec")]
pub struct RuleConfig {
    lot_id: u32,
    trailing: Option<TrailingRule>,
    protective_multiplier: Option<Decimal>,
    use_protective_stop: bool,
}

impl RuleConfig {
    /// Validate a raw rule.
    ///
    /// # Errors
    ///
    /// Returns `RuleConfigError` when an enabled feature is missing a
    /// parameter or a parameter is out of range.
    pub fn new(spec: RuleConfigSpec) -> Result<Self, RuleConfigError> {
        let lot_id = spec.lot_id;
        if lot_id == 0 {
            return Err(RuleConfigError::InvalidLotId { lot_id });
        }

        let trailing = if spec.use_trailing_stop {
            let activation =
                spec.trailing_activation
                    .ok_or(RuleConfigError::MissingTrailingField {
                        lot_id,
                        field: "trailing_activation",
                    })?;
            let pullback = spec
                .trailing_pullback
                .ok_or(RuleConfigError::MissingTrailingField {
                    lot_id,
                    field: "trailing_pullback",
                })?;
            if activation <= Decimal::ZERO {
                return Err(RuleConfigError::InvalidTrailingActivation {
                    lot_id,
                    value: activation,
                });
            }
            if pullback < Decimal::ZERO || pullback > Decimal::ONE {
                return Err(RuleConfigError::InvalidTrailingPullback {
                    lot_id,
                    value: pullback,
                });
            }
            Some(TrailingRule {
                activation,
                pullback,
            })
        } else {
            None
        };

        if let Some(value) = spec.protective_stop_multiplier
            && value < Decimal::ZERO
        {
            return Err(RuleConfigError::InvalidProtectiveMultiplier { lot_id, value });
        }
        if spec.use_protective_stop && spec.protective_stop_multiplier.is_none() {
            return Err(RuleConfigError::MissingProtectiveMultiplier { lot_id });
        }

        Ok(Self {
            lot_id,
            trailing,
            protective_multiplier: spec.protective_stop_multiplier,
            use_protective_stop: spec.use_protective_stop,
        })
    }

    /// Rule for a lot with neither trailing nor protective stops.
    ///
    /// Such a lot only exits on the group-wide stops.
    #[must_use]
    pub const fn range_only(lot_id: u32) -> Self {
        Self {
            lot_id,
            trailing: None,
            protective_multiplier: None,
            use_protective_stop: false,
        }
    }

    /// 1-based lot ID.
    #[must_use]
    pub const fn lot_id(&self) -> u32 {
        self.lot_id
    }

    /// Whether the trailing stop is enabled.
    #[must_use]
    pub const fn use_trailing_stop(&self) -> bool {
        self.trailing.is_some()
    }

    /// Trailing parameters, if enabled.
    #[must_use]
    pub const fn trailing(&self) -> Option<&TrailingRule> {
        self.trailing.as_ref()
    }

    /// Whether the protective stop is enabled.
    #[must_use]
    pub const fn use_protective_stop(&self) -> bool {
        self.use_protective_stop
    }

    /// Protective multiplier as configured, regardless of the enable flag.
    #[must_use]
    pub const fn protective_stop_multiplier(&self) -> Option<Decimal> {
        self.protective_multiplier
    }

    /// Multiplier to use for cascading, `None` if this lot never receives one.
    #[must_use]
    pub const fn cascade_multiplier(&self) -> Option<Decimal> {
        if self.use_protective_stop {
            self.protective_multiplier
        } else {
            None
        }
    }
}

impl TryFrom<RuleConfigSpec> for RuleConfig {
    type Error = RuleConfigError;

    fn try_from(spec: RuleConfigSpec) -> Result<Self, Self::Error> {
        Self::new(spec)
    }
}

impl From<RuleConfig> for RuleConfigSpec {
    fn from(rule: RuleConfig) -> Self {
        Self {
            lot_id: rule.lot_id,
            use_trailing_stop: rule.trailing.is_some(),
            trailing_activation: rule.trailing.map(|t| t.activation),
            trailing_pullback: rule.trailing.map(|t| t.pullback),
            use_protective_stop: rule.use_protective_stop,
            protective_stop_multiplier: rule.protective_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn trailing_spec(activation: Option<Decimal>, pullback: Option<Decimal>) -> RuleConfigSpec {
        RuleConfigSpec {
            lot_id: 1,
            use_trailing_stop: true,
            trailing_activation: activation,
            trailing_pullback: pullback,
            ..RuleConfigSpec::default()
        }
    }

    #[test]
    fn valid_trailing_rule() {
        let rule = RuleConfig::new(trailing_spec(Some(dec!(15)), Some(dec!(0.20)))).unwrap();
        assert_eq!(rule.lot_id(), 1);
        assert!(rule.use_trailing_stop());
        assert_eq!(rule.trailing().unwrap().activation, dec!(15));
        assert!(rule.cascade_multiplier().is_none());
    }

    #[test_case(None, Some(dec!(0.2)), "trailing_activation" ; "missing activation")]
    #[test_case(Some(dec!(15)), None, "trailing_pullback" ; "missing pullback")]
    fn trailing_requires_both_fields(
        activation: Option<Decimal>,
        pullback: Option<Decimal>,
        field: &'static str,
    ) {
        let err = RuleConfig::new(trailing_spec(activation, pullback)).unwrap_err();
        assert_eq!(err, RuleConfigError::MissingTrailingField { lot_id: 1, field });
    }

    #[test_case(dec!(0) ; "zero activation")]
    #[test_case(dec!(-5) ; "negative activation")]
    fn activation_must_be_positive(activation: Decimal) {
        let err = RuleConfig::new(trailing_spec(Some(activation), Some(dec!(0.2)))).unwrap_err();
        assert!(matches!(
            err,
            RuleConfigError::InvalidTrailingActivation { .. }
        ));
    }

    #[test_case(dec!(-0.1) ; "negative pullback")]
    #[test_case(dec!(1.01) ; "pullback above one")]
    fn pullback_must_be_a_ratio(pullback: Decimal) {
        let err = RuleConfig::new(trailing_spec(Some(dec!(15)), Some(pullback))).unwrap_err();
        assert!(matches!(err, RuleConfigError::InvalidTrailingPullback { .. }));
    }

    #[test_case(dec!(0) ; "zero pullback")]
    #[test_case(dec!(1) ; "full pullback")]
    fn pullback_bounds_are_inclusive(pullback: Decimal) {
        assert!(RuleConfig::new(trailing_spec(Some(dec!(15)), Some(pullback))).is_ok());
    }

    #[test]
    fn disabled_trailing_ignores_parameters() {
        let spec = RuleConfigSpec {
            lot_id: 3,
            use_trailing_stop: false,
            trailing_activation: None,
            trailing_pullback: Some(dec!(5)),
            ..RuleConfigSpec::default()
        };
        let rule = RuleConfig::new(spec).unwrap();
        assert!(rule.trailing().is_none());
    }

    #[test]
    fn lot_id_zero_rejected() {
        let spec = RuleConfigSpec::default();
        assert_eq!(
            RuleConfig::new(spec).unwrap_err(),
            RuleConfigError::InvalidLotId { lot_id: 0 }
        );
    }

    #[test]
    fn protective_stop_requires_multiplier() {
        let spec = RuleConfigSpec {
            lot_id: 2,
            use_protective_stop: true,
            ..RuleConfigSpec::default()
        };
        assert_eq!(
            RuleConfig::new(spec).unwrap_err(),
            RuleConfigError::MissingProtectiveMultiplier { lot_id: 2 }
        );
    }

    #[test]
    fn negative_multiplier_rejected() {
        let spec = RuleConfigSpec {
            lot_id: 2,
            use_protective_stop: true,
            protective_stop_multiplier: Some(dec!(-1)),
            ..RuleConfigSpec::default()
        };
        assert!(matches!(
            RuleConfig::new(spec).unwrap_err(),
            RuleConfigError::InvalidProtectiveMultiplier { .. }
        ));
    }

    #[test]
    fn zero_multiplier_accepted() {
        let rule = RuleConfig::new(RuleConfigSpec {
            lot_id: 2,
            use_protective_stop: true,
            protective_stop_multiplier: Some(dec!(0)),
            ..RuleConfigSpec::default()
        })
        .unwrap();
        assert_eq!(rule.cascade_multiplier(), Some(dec!(0)));
    }

    #[test]
    fn cascade_multiplier_requires_enable_flag() {
        let spec = RuleConfigSpec {
            lot_id: 2,
            protective_stop_multiplier: Some(dec!(2)),
            ..RuleConfigSpec::default()
        };
        let rule = RuleConfig::new(spec).unwrap();
        assert_eq!(rule.protective_stop_multiplier(), Some(dec!(2)));
        assert!(rule.cascade_multiplier().is_none());
    }

    #[test]
    fn trailing_stop_price_long_and_short() {
        let rule = TrailingRule {
            activation: dec!(15),
            pullback: dec!(0.20),
        };
        assert_eq!(rule.stop_price(dec!(22000), dec!(22040)), dec!(22032));
        assert_eq!(rule.stop_price(dec!(22542), dec!(22502)), dec!(22510));
    }

    #[test]
    fn deserialize_validates() {
        let ok: RuleConfig = serde_json::from_str(
            r#"{"lot_id":1,"use_trailing_stop":true,"trailing_activation":"15","trailing_pullback":"0.2"}"#,
        )
        .unwrap();
        assert!(ok.use_trailing_stop());

        let bad = serde_json::from_str::<RuleConfig>(r#"{"lot_id":1,"use_trailing_stop":true}"#);
        assert!(bad.is_err());
    }
}
