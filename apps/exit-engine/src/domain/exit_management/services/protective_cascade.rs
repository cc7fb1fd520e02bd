//! Protective Stop Cascade Domain Service
//!
//! After a lot exits, the next lot in the group may receive a stop funded by
//! the profit already banked by every earlier lot: its worst-case loss is
//! bounded by `cumulative_profit * multiplier`.

use rust_decimal::Decimal;

use crate::domain::exit_management::value_objects::{CascadeSkip, StopUpdate, TradeGroup};

/// Tightens the next lot's stop from earlier lots' realized profit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectiveStopCascade;

impl ProtectiveStopCascade {
    /// Create a new cascade.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Apply the cascade after `exited_lot_id` exited.
    ///
    /// Returns the update applied to lot `exited_lot_id + 1`, or `None`.
    pub fn on_lot_exit(&self, group: &mut TradeGroup, exited_lot_id: u32) -> Option<StopUpdate> {
        self.try_on_lot_exit(group, exited_lot_id).ok()
    }

    /// Apply the cascade, reporting why nothing changed.
    ///
    /// # Errors
    ///
    /// Returns a `CascadeSkip` describing the legitimate reason the next lot
    /// was left unchanged.
    pub fn try_on_lot_exit(
        &self,
        group: &mut TradeGroup,
        exited_lot_id: u32,
    ) -> Result<StopUpdate, CascadeSkip> {
        let next_lot_id = exited_lot_id
            .checked_add(1)
            .ok_or(CascadeSkip::NoNextLot)?;
        let direction = group.direction();

        let next = group.lot(next_lot_id).ok_or(CascadeSkip::NoNextLot)?;
        if next.is_exited() || next.exit.is_some() {
            return Err(CascadeSkip::NextLotExited);
        }
        let multiplier = next
            .rule
            .cascade_multiplier()
            .ok_or(CascadeSkip::NoMultiplier)?;
        let entry = next.entry_price.ok_or(CascadeSkip::MissingEntryPrice)?;

        let cumulative_profit = Self::cumulative_prior_profit(group, next_lot_id)?;
        if cumulative_profit <= Decimal::ZERO {
            return Err(CascadeSkip::NoCumulativeProfit);
        }

        let stop_amount = cumulative_profit * multiplier;
        let new_stop = direction.stop_from_entry(entry, stop_amount);

        let next = group
            .lot_mut(next_lot_id)
            .ok_or(CascadeSkip::NoNextLot)?;
        let old_stop = next.current_stop_loss;
        next.current_stop_loss = new_stop;
        next.protection_activated = true;

        Ok(StopUpdate {
            position_id: next.position_id.clone(),
            lot_id: next_lot_id,
            old_stop,
            new_stop,
            cumulative_profit,
            multiplier,
        })
    }

    /// Sum of realized P&L of every lot before `lot_id`.
    ///
    /// Every earlier lot must be present, exited and profitable; one losing
    /// lot disables the cascade for the rest of the group.
    fn cumulative_prior_profit(group: &TradeGroup, lot_id: u32) -> Result<Decimal, CascadeSkip> {
        let mut seen = 0_u32;
        let mut total = Decimal::ZERO;

        for prior in group.lots_before(lot_id) {
            seen += 1;
            if !prior.is_exited() {
                return Err(CascadeSkip::PriorLotOpen);
            }
            match prior.realized_pnl() {
                Some(pnl) if pnl > Decimal::ZERO => total += pnl,
                _ => return Err(CascadeSkip::PriorLotLoss),
            }
        }

        if seen + 1 != lot_id {
            return Err(CascadeSkip::PriorLotMissing);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit_management::value_objects::{
        ExitReason, GroupRange, PositionDirection, PositionRecord, RuleConfig, RuleConfigSpec,
    };
    use crate::domain::shared::{GroupId, PositionId, SessionTime};
    use rust_decimal_macros::dec;

    fn protected_rule(lot_id: u32, multiplier: Decimal) -> RuleConfig {
        RuleConfig::new(RuleConfigSpec {
            lot_id,
            use_protective_stop: true,
            protective_stop_multiplier: Some(multiplier),
            ..RuleConfigSpec::default()
        })
        .unwrap()
    }

    fn short_group(rules: Vec<RuleConfig>) -> TradeGroup {
        let range = GroupRange::new(
            GroupId::new("g1"),
            PositionDirection::Short,
            dec!(22600),
            dec!(22500),
        );
        let lots = rules
            .into_iter()
            .map(|rule| {
                PositionRecord::filled(
                    PositionId::new(format!("p{}", rule.lot_id())),
                    GroupId::new("g1"),
                    PositionDirection::Short,
                    dec!(22542),
                    dec!(22600),
                    rule,
                )
            })
            .collect();
        TradeGroup::assemble(range, lots).0
    }

    fn exit(group: &mut TradeGroup, lot_id: u32, price: Decimal) {
        group
            .lot_mut(lot_id)
            .unwrap()
            .mark_exited(
                ExitReason::TrailingStop,
                price,
                SessionTime::from_hms(10, 0, 0).unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn profitable_exit_funds_next_lot() {
        let mut group = short_group(vec![RuleConfig::range_only(1), protected_rule(2, dec!(2.0))]);
        exit(&mut group, 1, dec!(22522));

        let update = ProtectiveStopCascade::new()
            .on_lot_exit(&mut group, 1)
            .unwrap();
        assert_eq!(update.cumulative_profit, dec!(20));
        assert_eq!(update.new_stop, dec!(22582));
        assert_eq!(update.old_stop, dec!(22600));

        let lot2 = group.lot(2).unwrap();
        assert_eq!(lot2.current_stop_loss, dec!(22582));
        assert!(lot2.protection_activated);
    }

    #[test]
    fn losing_prior_lot_disables_cascade() {
        let mut group = short_group(vec![RuleConfig::range_only(1), protected_rule(2, dec!(2.0))]);
        exit(&mut group, 1, dec!(22552));

        let result = ProtectiveStopCascade::new().try_on_lot_exit(&mut group, 1);
        assert_eq!(result.unwrap_err(), CascadeSkip::PriorLotLoss);
        assert!(!group.lot(2).unwrap().protection_activated);
    }

    #[test]
    fn flat_prior_lot_counts_as_loss() {
        let mut group = short_group(vec![RuleConfig::range_only(1), protected_rule(2, dec!(2.0))]);
        exit(&mut group, 1, dec!(22542));

        let result = ProtectiveStopCascade::new().try_on_lot_exit(&mut group, 1);
        assert_eq!(result.unwrap_err(), CascadeSkip::PriorLotLoss);
    }

    #[test]
    fn cumulative_profit_spans_all_prior_lots() {
        let mut group = short_group(vec![
            RuleConfig::range_only(1),
            protected_rule(2, dec!(1.0)),
            protected_rule(3, dec!(0.5)),
        ]);
        exit(&mut group, 1, dec!(22522));
        exit(&mut group, 2, dec!(22512));

        let update = ProtectiveStopCascade::new()
            .on_lot_exit(&mut group, 2)
            .unwrap();
        assert_eq!(update.cumulative_profit, dec!(50));
        assert_eq!(update.new_stop, dec!(22567));
        assert_eq!((update.new_stop - dec!(22542)).abs(), update.stop_amount());
    }

    #[test]
    fn open_prior_lot_blocks_cascade() {
        let mut group = short_group(vec![
            RuleConfig::range_only(1),
            RuleConfig::range_only(2),
            protected_rule(3, dec!(1.0)),
        ]);
        exit(&mut group, 2, dec!(22522));

        let result = ProtectiveStopCascade::new().try_on_lot_exit(&mut group, 2);
        assert_eq!(result.unwrap_err(), CascadeSkip::PriorLotOpen);
    }

    #[test]
    fn missing_prior_lot_blocks_cascade() {
        let mut group = short_group(vec![RuleConfig::range_only(2), protected_rule(3, dec!(1.0))]);
        exit(&mut group, 2, dec!(22522));

        let result = ProtectiveStopCascade::new().try_on_lot_exit(&mut group, 2);
        assert_eq!(result.unwrap_err(), CascadeSkip::PriorLotMissing);
    }

    #[test]
    fn no_next_lot_or_multiplier() {
        let mut group = short_group(vec![RuleConfig::range_only(1), RuleConfig::range_only(2)]);
        exit(&mut group, 1, dec!(22522));

        let cascade = ProtectiveStopCascade::new();
        assert_eq!(
            cascade.try_on_lot_exit(&mut group, 1).unwrap_err(),
            CascadeSkip::NoMultiplier
        );
        assert_eq!(
            cascade.try_on_lot_exit(&mut group, 2).unwrap_err(),
            CascadeSkip::NoNextLot
        );
    }

    #[test]
    fn highest_lot_id_has_no_successor() {
        let mut group = short_group(vec![RuleConfig::range_only(u32::MAX)]);
        exit(&mut group, u32::MAX, dec!(22522));

        let result = ProtectiveStopCascade::new().try_on_lot_exit(&mut group, u32::MAX);
        assert_eq!(result.unwrap_err(), CascadeSkip::NoNextLot);
    }

    #[test]
    fn exited_next_lot_untouched() {
        let mut group = short_group(vec![RuleConfig::range_only(1), protected_rule(2, dec!(2.0))]);
        exit(&mut group, 1, dec!(22522));
        exit(&mut group, 2, dec!(22530));

        let result = ProtectiveStopCascade::new().try_on_lot_exit(&mut group, 1);
        assert_eq!(result.unwrap_err(), CascadeSkip::NextLotExited);
    }

    #[test]
    fn long_stop_sits_below_entry() {
        let range = GroupRange::new(
            GroupId::new("g2"),
            PositionDirection::Long,
            dec!(22050),
            dec!(21980),
        );
        let lots = vec![
            PositionRecord::filled(
                PositionId::new("a"),
                GroupId::new("g2"),
                PositionDirection::Long,
                dec!(22000),
                dec!(21980),
                RuleConfig::range_only(1),
            ),
            PositionRecord::filled(
                PositionId::new("b"),
                GroupId::new("g2"),
                PositionDirection::Long,
                dec!(22000),
                dec!(21980),
                protected_rule(2, dec!(0.5)),
            ),
        ];
        let mut group = TradeGroup::assemble(range, lots).0;
        exit(&mut group, 1, dec!(22032));

        let update = ProtectiveStopCascade::new()
            .on_lot_exit(&mut group, 1)
            .unwrap();
        assert_eq!(update.new_stop, dec!(21984));
    }
}
