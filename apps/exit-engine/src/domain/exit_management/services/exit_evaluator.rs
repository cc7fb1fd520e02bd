//! Exit Condition Evaluator Domain Service
//!
//! Per-group state machine. On every tick the checks run in strict priority
//! order and the first match wins for the group:
//!
//! 1. End-of-day close (optional): every active lot exits at the tick price.
//! 2. Initial range stop: every active lot exits at the tick price.
//! 3. Each lot in ascending `lot_id`: protective stop, trailing activation,
//!    trailing trigger, then peak update.
//!
//! Cascade updates are applied between lots, so a lot that exits early in
//! the pass can protect a later lot in the same tick.

use rust_decimal::Decimal;

use super::{PeakTracker, ProtectiveStopCascade};
use crate::domain::exit_management::value_objects::{
    Diagnostic, ExitAction, ExitReason, PeakUpdate, PositionChange, PositionRecord,
    PositionStatus, PriceTick, StopUpdate, TradeGroup,
};
use crate::domain::shared::{GroupId, PositionId, SessionTime};

/// Evaluator configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Forced close time; `None` disables end-of-day close.
    pub eod_close_time: Option<SessionTime>,
}

impl EvaluatorConfig {
    /// Configuration with end-of-day close at `close_time`.
    #[must_use]
    pub const fn with_eod_close(close_time: SessionTime) -> Self {
        Self {
            eod_close_time: Some(close_time),
        }
    }
}

/// Per-tick options supplied by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Whether peak prices are updated on this tick.
    pub track_peaks: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self { track_peaks: true }
    }
}

/// Everything one group's evaluation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEvaluation {
    /// Group evaluated.
    pub group_id: GroupId,
    /// Lots that must close now.
    pub actions: Vec<ExitAction>,
    /// Field writes to persist, in the order they happened.
    pub changes: Vec<PositionChange>,
    /// Peak moves.
    pub peak_updates: Vec<PeakUpdate>,
    /// Lots whose trailing stop was armed.
    pub activations: Vec<PositionId>,
    /// Protective stops set by the cascade.
    pub stop_updates: Vec<StopUpdate>,
    /// Skipped lots and cascade outcomes.
    pub diagnostics: Vec<Diagnostic>,
}

impl GroupEvaluation {
    fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            actions: Vec::new(),
            changes: Vec::new(),
            peak_updates: Vec::new(),
            activations: Vec::new(),
            stop_updates: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Append another pass over the same group.
    pub fn absorb(&mut self, other: Self) {
        self.actions.extend(other.actions);
        self.changes.extend(other.changes);
        self.peak_updates.extend(other.peak_updates);
        self.activations.extend(other.activations);
        self.stop_updates.extend(other.stop_updates);
        self.diagnostics.extend(other.diagnostics);
    }

    /// Keep only the store writes matching `keep`, along with the peak,
    /// activation and stop records those writes carry.
    pub fn retain_writes(&mut self, keep: impl Fn(&PositionChange) -> bool) {
        self.changes.retain(|change| keep(change));
        let changes = &self.changes;
        let written = |id: &PositionId, kind: &str| {
            changes
                .iter()
                .any(|c| c.position_id() == id && c.change_type() == kind)
        };
        self.peak_updates
            .retain(|u| written(&u.position_id, "PEAK_UPDATED"));
        self.activations
            .retain(|id| written(id, "TRAILING_ACTIVATED"));
        self.stop_updates
            .retain(|u| written(&u.position_id, "PROTECTION_APPLIED"));
    }

    /// Whether anything needs persisting.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Which stop level currently governs a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveStop {
    /// Stop level.
    pub price: Decimal,
    /// Exit reason if it fires.
    pub reason: ExitReason,
}

/// Central exit state machine.
#[derive(Debug, Clone, Default)]
pub struct ExitConditionEvaluator {
    config: EvaluatorConfig,
    peak_tracker: PeakTracker,
    cascade: ProtectiveStopCascade,
}

impl ExitConditionEvaluator {
    /// Create an evaluator.
    #[must_use]
    pub const fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            peak_tracker: PeakTracker::new(),
            cascade: ProtectiveStopCascade::new(),
        }
    }

    /// Evaluator configuration.
    #[must_use]
    pub const fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate several groups independently.
    pub fn evaluate_groups(
        &self,
        groups: &mut [TradeGroup],
        tick: &PriceTick,
        options: EvaluationOptions,
    ) -> Vec<GroupEvaluation> {
        groups
            .iter_mut()
            .map(|group| self.evaluate_group(group, tick, options))
            .collect()
    }

    /// Evaluate one group against a tick, mutating its lots in place.
    pub fn evaluate_group(
        &self,
        group: &mut TradeGroup,
        tick: &PriceTick,
        options: EvaluationOptions,
    ) -> GroupEvaluation {
        let mut eval = GroupEvaluation::new(group.group_id().clone());
        let lot_ids = Self::evaluable_lots(group, &mut eval);
        if lot_ids.is_empty() {
            return eval;
        }

        if self.eod_reached(tick.time) {
            self.close_group(group, &lot_ids, ExitReason::EodClose, tick, &mut eval);
            return eval;
        }

        if group.range().initial_stop_touched(tick.price) {
            self.close_group(group, &lot_ids, ExitReason::InitialStop, tick, &mut eval);
            return eval;
        }

        for lot_id in lot_ids {
            self.evaluate_lot(group, lot_id, tick, options, &mut eval);
        }
        eval
    }

    /// Re-apply exits decided on an earlier tick but never confirmed.
    ///
    /// Each exit keeps its original reason, price and time and runs the
    /// cascade again. Exits for lots that are no longer active, or whose
    /// position ID does not match, are dropped.
    pub fn replay_exits(&self, group: &mut TradeGroup, exits: &[ExitAction]) -> GroupEvaluation {
        let mut eval = GroupEvaluation::new(group.group_id().clone());
        for exit in exits {
            let matches = group
                .lot(exit.lot_id)
                .is_some_and(|lot| lot.position_id == exit.position_id);
            if matches
                && Self::exit_lot(
                    group,
                    exit.lot_id,
                    exit.exit_reason,
                    exit.exit_price,
                    exit.exit_time,
                    &mut eval,
                )
            {
                self.apply_cascade(group, exit.lot_id, &mut eval);
            }
        }
        eval
    }

    /// The stop level that currently governs `lot`, if any lot-level stop is live.
    ///
    /// When both the protective and trailing stops are live, the tighter one
    /// (nearer the current price) governs. Ties go to the protective stop.
    #[must_use]
    pub fn effective_stop(&self, lot: &PositionRecord) -> Option<EffectiveStop> {
        let protective = lot.protection_activated.then_some(EffectiveStop {
            price: lot.current_stop_loss,
            reason: ExitReason::ProtectiveStop,
        });
        let trailing = Self::trailing_stop(lot).map(|price| EffectiveStop {
            price,
            reason: ExitReason::TrailingStop,
        });

        match (protective, trailing) {
            (Some(p), Some(t)) => {
                // Equal levels resolve to the protective stop.
                let tighter = lot.direction.tighter_stop(p.price, t.price);
                Some(if tighter == p.price { p } else { t })
            }
            (p, None) => p,
            (None, t) => t,
        }
    }

    fn eod_reached(&self, now: SessionTime) -> bool {
        self.config.eod_close_time.is_some_and(|close| now >= close)
    }

    /// Lot IDs eligible this tick; inconsistent active lots become diagnostics.
    fn evaluable_lots(group: &TradeGroup, eval: &mut GroupEvaluation) -> Vec<u32> {
        let mut ids = Vec::new();
        for lot in group.lots() {
            if lot.status != PositionStatus::Active {
                continue;
            }
            match lot.evaluable_entry() {
                Ok(_) => ids.push(lot.lot_id()),
                Err(inconsistency) => eval.diagnostics.push(Diagnostic::LotSkipped {
                    group_id: group.group_id().clone(),
                    inconsistency,
                }),
            }
        }
        ids
    }

    fn close_group(
        &self,
        group: &mut TradeGroup,
        lot_ids: &[u32],
        reason: ExitReason,
        tick: &PriceTick,
        eval: &mut GroupEvaluation,
    ) {
        let exited: Vec<u32> = lot_ids
            .iter()
            .copied()
            .filter(|&lot_id| Self::exit_lot(group, lot_id, reason, tick.price, tick.time, eval))
            .collect();
        for lot_id in exited {
            self.apply_cascade(group, lot_id, eval);
        }
    }

    fn evaluate_lot(
        &self,
        group: &mut TradeGroup,
        lot_id: u32,
        tick: &PriceTick,
        options: EvaluationOptions,
        eval: &mut GroupEvaluation,
    ) {
        let price = tick.price;
        let Some(lot) = group.lot_mut(lot_id) else {
            return;
        };
        let Some(entry) = lot.entry_price else {
            return;
        };
        let direction = lot.direction;

        // Protective stop, unless an armed trailing stop is tighter.
        if lot.protection_activated {
            let governing = self.effective_stop(lot);
            if let Some(stop) = governing
                && stop.reason == ExitReason::ProtectiveStop
                && direction.stop_touched(price, stop.price)
            {
                if Self::exit_lot(group, lot_id, stop.reason, stop.price, tick.time, eval) {
                    self.apply_cascade(group, lot_id, eval);
                }
                return;
            }
        }

        let Some(lot) = group.lot_mut(lot_id) else {
            return;
        };

        // Trailing activation latch; arming never exits on the same tick.
        let mut armed_now = false;
        if let Some(rule) = lot.rule.trailing().copied()
            && !lot.trailing_activated
            && direction.reached_favorable(price, entry, rule.activation)
        {
            lot.trailing_activated = true;
            armed_now = true;
            eval.activations.push(lot.position_id.clone());
            eval.changes.push(PositionChange::TrailingActivated {
                position_id: lot.position_id.clone(),
            });
        }

        if !armed_now
            && let Some(stop) = Self::trailing_stop(lot)
            && direction.stop_touched(price, stop)
        {
            if Self::exit_lot(group, lot_id, ExitReason::TrailingStop, stop, tick.time, eval) {
                self.apply_cascade(group, lot_id, eval);
            }
            return;
        }

        if options.track_peaks
            && let Some(update) = self.peak_tracker.update(lot, price)
        {
            eval.changes.push(PositionChange::PeakUpdated {
                position_id: update.position_id.clone(),
                peak_price: update.new_peak,
            });
            eval.peak_updates.push(update);
        }
    }

    /// Trailing stop level for an armed lot.
    fn trailing_stop(lot: &PositionRecord) -> Option<Decimal> {
        if !lot.trailing_activated {
            return None;
        }
        let rule = lot.rule.trailing()?;
        let entry = lot.entry_price?;
        let peak = lot.peak_or_entry()?;
        Some(rule.stop_price(entry, peak))
    }

    fn exit_lot(
        group: &mut TradeGroup,
        lot_id: u32,
        reason: ExitReason,
        price: Decimal,
        time: SessionTime,
        eval: &mut GroupEvaluation,
    ) -> bool {
        let group_id = group.group_id().clone();
        let Some(lot) = group.lot_mut(lot_id) else {
            return false;
        };
        let Some(details) = lot.mark_exited(reason, price, time) else {
            return false;
        };

        eval.actions.push(ExitAction::from_details(
            lot.position_id.clone(),
            group_id,
            lot_id,
            lot.direction,
            &details,
        ));
        eval.changes.push(PositionChange::Exited {
            position_id: lot.position_id.clone(),
            details,
        });
        true
    }

    fn apply_cascade(
        &self,
        group: &mut TradeGroup,
        exited_lot_id: u32,
        eval: &mut GroupEvaluation,
    ) {
        match self.cascade.try_on_lot_exit(group, exited_lot_id) {
            Ok(update) => {
                eval.changes.push(PositionChange::ProtectionApplied {
                    position_id: update.position_id.clone(),
                    current_stop_loss: update.new_stop,
                });
                eval.stop_updates.push(update);
            }
            Err(skip) => eval.diagnostics.push(Diagnostic::CascadeSkipped {
                group_id: group.group_id().clone(),
                exited_lot_id,
                skip,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit_management::errors::DataInconsistency;
    use crate::domain::exit_management::value_objects::{
        CascadeSkip, GroupRange, PositionDirection, RuleConfig, RuleConfigSpec,
    };
    use rust_decimal_macros::dec;

    fn trailing_rule(lot_id: u32, activation: Decimal, pullback: Decimal) -> RuleConfig {
        RuleConfig::new(RuleConfigSpec {
            lot_id,
            use_trailing_stop: true,
            trailing_activation: Some(activation),
            trailing_pullback: Some(pullback),
            ..RuleConfigSpec::default()
        })
        .unwrap()
    }

    fn protected_rule(lot_id: u32, multiplier: Decimal) -> RuleConfig {
        RuleConfig::new(RuleConfigSpec {
            lot_id,
            use_protective_stop: true,
            protective_stop_multiplier: Some(multiplier),
            ..RuleConfigSpec::default()
        })
        .unwrap()
    }

    fn group(
        direction: PositionDirection,
        entry: Decimal,
        high: Decimal,
        low: Decimal,
        rules: Vec<RuleConfig>,
    ) -> TradeGroup {
        let range = GroupRange::new(GroupId::new("g1"), direction, high, low);
        let stop = range.initial_stop();
        let lots = rules
            .into_iter()
            .map(|rule| {
                PositionRecord::filled(
                    PositionId::new(format!("p{}", rule.lot_id())),
                    GroupId::new("g1"),
                    direction,
                    entry,
                    stop,
                    rule,
                )
            })
            .collect();
        TradeGroup::assemble(range, lots).0
    }

    fn long_group(rules: Vec<RuleConfig>) -> TradeGroup {
        group(PositionDirection::Long, dec!(22000), dec!(22050), dec!(21980), rules)
    }

    fn tick(price: Decimal) -> PriceTick {
        PriceTick::parse(price, "10:00:00").unwrap()
    }

    fn run(
        evaluator: &ExitConditionEvaluator,
        group: &mut TradeGroup,
        price: Decimal,
    ) -> GroupEvaluation {
        evaluator.evaluate_group(group, &tick(price), EvaluationOptions::default())
    }

    #[test]
    fn quiet_tick_produces_nothing() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![RuleConfig::range_only(1)]);
        let eval = run(&evaluator, &mut g, dec!(22010));
        assert!(eval.actions.is_empty());
        assert!(!eval.has_changes());
    }

    #[test]
    fn initial_stop_closes_whole_group_at_tick_price() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![
            trailing_rule(1, dec!(15), dec!(0.2)),
            RuleConfig::range_only(2),
        ]);
        let eval = run(&evaluator, &mut g, dec!(21975));

        assert_eq!(eval.actions.len(), 2);
        for action in &eval.actions {
            assert_eq!(action.exit_reason, ExitReason::InitialStop);
            assert_eq!(action.exit_price, dec!(21975));
            assert_eq!(action.realized_pnl, dec!(-25));
        }
        assert_eq!(g.active_count(), 0);
    }

    #[test]
    fn eod_close_overrides_everything() {
        let evaluator = ExitConditionEvaluator::new(EvaluatorConfig::with_eod_close(
            SessionTime::parse("13:30:00").unwrap(),
        ));
        let mut g = long_group(vec![RuleConfig::range_only(1), RuleConfig::range_only(2)]);

        let before = PriceTick::parse(dec!(21970), "13:29:59").unwrap();
        let eval = evaluator.evaluate_group(&mut g.clone(), &before, EvaluationOptions::default());
        assert!(eval.actions.iter().all(|a| a.exit_reason == ExitReason::InitialStop));

        let at_close = PriceTick::parse(dec!(21970), "13:30:00").unwrap();
        let eval = evaluator.evaluate_group(&mut g, &at_close, EvaluationOptions::default());
        assert_eq!(eval.actions.len(), 2);
        assert!(eval.actions.iter().all(|a| a.exit_reason == ExitReason::EodClose));
        assert!(eval.actions.iter().all(|a| a.exit_price == dec!(21970)));
    }

    #[test]
    fn eod_disabled_by_default() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![RuleConfig::range_only(1)]);
        let late = PriceTick::parse(dec!(22010), "23:59:59").unwrap();
        let eval = evaluator.evaluate_group(&mut g, &late, EvaluationOptions::default());
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn activation_arms_without_exit() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![trailing_rule(1, dec!(15), dec!(0.2))]);

        let eval = run(&evaluator, &mut g, dec!(22014));
        assert!(eval.activations.is_empty());

        let eval = run(&evaluator, &mut g, dec!(22015));
        assert_eq!(eval.activations.len(), 1);
        assert!(eval.actions.is_empty());
        assert!(g.lot(1).unwrap().trailing_activated);
        assert_eq!(g.lot(1).unwrap().peak_price, Some(dec!(22015)));
    }

    #[test]
    fn trailing_stop_triggers_on_touch() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![trailing_rule(1, dec!(15), dec!(0.2))]);

        run(&evaluator, &mut g, dec!(22020));
        run(&evaluator, &mut g, dec!(22040));
        let eval = run(&evaluator, &mut g, dec!(22033));
        assert!(eval.actions.is_empty());

        let eval = run(&evaluator, &mut g, dec!(22032));
        assert_eq!(eval.actions.len(), 1);
        let action = &eval.actions[0];
        assert_eq!(action.exit_reason, ExitReason::TrailingStop);
        assert_eq!(action.exit_price, dec!(22032));
        assert_eq!(action.realized_pnl, dec!(32));
    }

    #[test]
    fn short_trailing_stop() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = group(
            PositionDirection::Short,
            dec!(22542),
            dec!(22600),
            dec!(22500),
            vec![trailing_rule(1, dec!(20), dec!(0.25))],
        );

        run(&evaluator, &mut g, dec!(22522));
        run(&evaluator, &mut g, dec!(22502));
        // stop = 22502 + 40 * 0.25 = 22512
        let eval = run(&evaluator, &mut g, dec!(22512));
        assert_eq!(eval.actions.len(), 1);
        assert_eq!(eval.actions[0].exit_price, dec!(22512));
        assert_eq!(eval.actions[0].realized_pnl, dec!(30));
    }

    #[test]
    fn peak_tracking_can_be_throttled() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![trailing_rule(1, dec!(15), dec!(0.2))]);
        run(&evaluator, &mut g, dec!(22020));

        let eval = evaluator.evaluate_group(
            &mut g,
            &tick(dec!(22040)),
            EvaluationOptions { track_peaks: false },
        );
        assert!(eval.peak_updates.is_empty());
        assert_eq!(g.lot(1).unwrap().peak_price, Some(dec!(22020)));
    }

    #[test]
    fn trailing_exit_cascades_into_next_lot_same_tick() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![
            trailing_rule(1, dec!(15), dec!(0.2)),
            protected_rule(2, dec!(1.0)),
        ]);
        run(&evaluator, &mut g, dec!(22020));
        run(&evaluator, &mut g, dec!(22040));

        let eval = run(&evaluator, &mut g, dec!(22032));
        assert_eq!(eval.actions.len(), 1);
        assert_eq!(eval.stop_updates.len(), 1);
        let lot2 = g.lot(2).unwrap();
        assert!(lot2.protection_activated);
        assert_eq!(lot2.current_stop_loss, dec!(21968));
        assert!(eval.changes.iter().any(|c| matches!(
            c,
            PositionChange::ProtectionApplied { current_stop_loss, .. } if *current_stop_loss == dec!(21968)
        )));
    }

    #[test]
    fn cascade_stop_can_fire_later_in_same_pass() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![
            trailing_rule(1, dec!(10), dec!(0.5)),
            protected_rule(2, dec!(0.25)),
        ]);
        {
            let lot = g.lot_mut(1).unwrap();
            lot.trailing_activated = true;
            lot.peak_price = Some(dec!(22040));
        }

        // Lot 1 exits at its 22020 stop; lot 2 is then protected at
        // 22000 - 20 * 0.25 = 21995, which this tick already breaches.
        let eval = run(&evaluator, &mut g, dec!(21990));
        assert_eq!(eval.actions.len(), 2);
        assert_eq!(eval.actions[0].exit_reason, ExitReason::TrailingStop);
        assert_eq!(eval.actions[0].exit_price, dec!(22020));
        assert_eq!(eval.actions[1].exit_reason, ExitReason::ProtectiveStop);
        assert_eq!(eval.actions[1].exit_price, dec!(21995));
        assert_eq!(eval.actions[1].realized_pnl, dec!(-5));
    }

    #[test]
    fn protective_exit_uses_stop_level() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![protected_rule(1, dec!(1))]);
        {
            let lot = g.lot_mut(1).unwrap();
            lot.current_stop_loss = dec!(21995);
            lot.protection_activated = true;
        }
        let eval = run(&evaluator, &mut g, dec!(21990));
        assert_eq!(eval.actions[0].exit_reason, ExitReason::ProtectiveStop);
        assert_eq!(eval.actions[0].exit_price, dec!(21995));
        assert_eq!(eval.actions[0].realized_pnl, dec!(-5));
    }

    #[test]
    fn tighter_trailing_stop_governs_over_protective() {
        let evaluator = ExitConditionEvaluator::default();
        let mut lot_rule = RuleConfigSpec::from(trailing_rule(1, dec!(15), dec!(0.5)));
        lot_rule.use_protective_stop = true;
        lot_rule.protective_stop_multiplier = Some(dec!(1));
        let mut g = long_group(vec![RuleConfig::new(lot_rule).unwrap()]);
        {
            let lot = g.lot_mut(1).unwrap();
            lot.current_stop_loss = dec!(21990);
            lot.protection_activated = true;
            lot.trailing_activated = true;
            lot.peak_price = Some(dec!(22040));
        }
        // trailing stop = 22040 - 40 * 0.5 = 22020, tighter than 21990
        let governing = evaluator.effective_stop(g.lot(1).unwrap()).unwrap();
        assert_eq!(governing.reason, ExitReason::TrailingStop);
        assert_eq!(governing.price, dec!(22020));

        let eval = run(&evaluator, &mut g, dec!(22019));
        assert_eq!(eval.actions[0].exit_reason, ExitReason::TrailingStop);
        assert_eq!(eval.actions[0].exit_price, dec!(22020));
    }

    #[test]
    fn equal_stops_resolve_to_protective() {
        let evaluator = ExitConditionEvaluator::default();
        let mut lot_rule = RuleConfigSpec::from(trailing_rule(1, dec!(15), dec!(0.5)));
        lot_rule.use_protective_stop = true;
        lot_rule.protective_stop_multiplier = Some(dec!(1));
        let mut g = long_group(vec![RuleConfig::new(lot_rule).unwrap()]);
        {
            let lot = g.lot_mut(1).unwrap();
            lot.current_stop_loss = dec!(22020);
            lot.protection_activated = true;
            lot.trailing_activated = true;
            lot.peak_price = Some(dec!(22040));
        }
        let governing = evaluator.effective_stop(g.lot(1).unwrap()).unwrap();
        assert_eq!(governing.reason, ExitReason::ProtectiveStop);
        assert_eq!(governing.price, dec!(22020));

        // A protective stop above the trailing level governs for a long.
        g.lot_mut(1).unwrap().current_stop_loss = dec!(22025);
        let governing = evaluator.effective_stop(g.lot(1).unwrap()).unwrap();
        assert_eq!(governing.reason, ExitReason::ProtectiveStop);
        assert_eq!(governing.price, dec!(22025));
    }

    #[test]
    fn initial_stop_beats_trailing_stop() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![trailing_rule(1, dec!(15), dec!(0.2))]);
        {
            let lot = g.lot_mut(1).unwrap();
            lot.trailing_activated = true;
            lot.peak_price = Some(dec!(22040));
        }
        let eval = run(&evaluator, &mut g, dec!(21980));
        assert_eq!(eval.actions.len(), 1);
        assert_eq!(eval.actions[0].exit_reason, ExitReason::InitialStop);
        assert_eq!(eval.actions[0].exit_price, dec!(21980));
    }

    #[test]
    fn inconsistent_lot_is_skipped_not_closed() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![RuleConfig::range_only(1), RuleConfig::range_only(2)]);
        g.lot_mut(2).unwrap().entry_price = None;

        let eval = run(&evaluator, &mut g, dec!(21970));
        assert_eq!(eval.actions.len(), 1);
        assert_eq!(eval.actions[0].lot_id, 1);
        assert!(g.lot(2).unwrap().is_active());
        assert!(eval.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::LotSkipped {
                inconsistency: DataInconsistency::MissingEntryPrice { .. },
                ..
            }
        )));
    }

    #[test]
    fn exited_lots_are_never_reevaluated() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![RuleConfig::range_only(1)]);
        run(&evaluator, &mut g, dec!(21970));
        let first_exit = g.lot(1).unwrap().exit.clone();

        let eval = run(&evaluator, &mut g, dec!(21900));
        assert!(eval.actions.is_empty());
        assert_eq!(g.lot(1).unwrap().exit, first_exit);
    }

    #[test]
    fn group_wide_exit_reports_cascade_outcome() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![RuleConfig::range_only(1), protected_rule(2, dec!(1))]);
        let eval = run(&evaluator, &mut g, dec!(21970));
        assert_eq!(eval.actions.len(), 2);
        assert!(eval.stop_updates.is_empty());
        assert!(eval.diagnostics.contains(&Diagnostic::CascadeSkipped {
            group_id: GroupId::new("g1"),
            exited_lot_id: 1,
            skip: CascadeSkip::NextLotExited,
        }));
    }

    #[test]
    fn range_stop_on_highest_lot_id_does_not_overflow() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![RuleConfig::range_only(u32::MAX)]);

        let eval = run(&evaluator, &mut g, dec!(21970));
        assert_eq!(eval.actions.len(), 1);
        assert_eq!(eval.actions[0].lot_id, u32::MAX);
        assert!(eval.diagnostics.contains(&Diagnostic::CascadeSkipped {
            group_id: GroupId::new("g1"),
            exited_lot_id: u32::MAX,
            skip: CascadeSkip::NoNextLot,
        }));
    }

    #[test]
    fn replayed_exit_keeps_original_details_and_cascades() {
        let evaluator = ExitConditionEvaluator::default();
        let mut first = long_group(vec![
            trailing_rule(1, dec!(15), dec!(0.2)),
            protected_rule(2, dec!(1.0)),
        ]);
        run(&evaluator, &mut first, dec!(22020));
        run(&evaluator, &mut first, dec!(22040));
        let original = run(&evaluator, &mut first, dec!(22032));
        assert_eq!(original.actions.len(), 1);

        // Same lots as stored before the exit was written.
        let mut stored = long_group(vec![
            trailing_rule(1, dec!(15), dec!(0.2)),
            protected_rule(2, dec!(1.0)),
        ]);
        let eval = evaluator.replay_exits(&mut stored, &original.actions);

        assert_eq!(eval.actions, original.actions);
        assert_eq!(eval.stop_updates.len(), 1);
        assert_eq!(stored.lot(2).unwrap().current_stop_loss, dec!(21968));

        // Already exited: nothing to replay.
        let again = evaluator.replay_exits(&mut stored, &original.actions);
        assert!(again.actions.is_empty());
    }

    #[test]
    fn retain_writes_drops_records_of_discarded_changes() {
        let evaluator = ExitConditionEvaluator::default();
        let mut g = long_group(vec![
            trailing_rule(1, dec!(15), dec!(0.2)),
            protected_rule(2, dec!(1.0)),
        ]);
        run(&evaluator, &mut g, dec!(22020));
        run(&evaluator, &mut g, dec!(22040));
        let mut eval = run(&evaluator, &mut g, dec!(22032));
        assert!(!eval.stop_updates.is_empty());

        eval.retain_writes(|change| !change.follows_exit());
        assert!(eval.changes.iter().all(|c| !c.follows_exit()));
        assert!(eval.stop_updates.is_empty());
        assert_eq!(eval.actions.len(), 1);
    }
}
