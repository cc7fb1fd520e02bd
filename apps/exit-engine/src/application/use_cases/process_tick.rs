//! Process Tick Use Case
//!
//! Runs one price tick through every group with active lots: load, assemble,
//! evaluate, dispatch, persist, then notify hooks. Groups are independent; a
//! storage or dispatch failure in one group is reported and the rest proceed.
//!
//! An exit is only written as EXITED once the dispatcher accepted it. Exits
//! that could not be delivered are held and replayed, with their original
//! price and reason, on the next tick that reaches the group.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::Instrument;

use crate::application::ports::{
    ExitDispatcherPort, ExitHook, PositionRepositoryPort, RepositoryError,
};
use crate::application::services::IntervalThrottle;
use crate::domain::exit_management::errors::DataInconsistency;
use crate::domain::exit_management::services::{
    EvaluationOptions, ExitConditionEvaluator, GroupEvaluation,
};
use crate::domain::exit_management::value_objects::{
    Diagnostic, ExitAction, GroupSummary, PeakUpdate, PositionChange, PositionRecord, PriceTick,
    StopUpdate, TradeGroup,
};
use crate::domain::shared::{GroupId, PositionId};
use crate::error::EngineError;
use crate::observability;

/// Outcome of one tick across all groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Tick processed.
    pub tick: PriceTick,
    /// Whether peak tracking ran on this tick.
    pub peaks_tracked: bool,
    /// Exit actions persisted and delivered.
    pub actions: Vec<ExitAction>,
    /// Exit actions the dispatcher rejected; held and retried on the next tick.
    pub undelivered: Vec<ExitAction>,
    /// Changes written to the store.
    pub changes: Vec<PositionChange>,
    /// Peak moves.
    pub peak_updates: Vec<PeakUpdate>,
    /// Lots whose trailing stop was armed.
    pub activations: Vec<PositionId>,
    /// Protective stops set by the cascade.
    pub stop_updates: Vec<StopUpdate>,
    /// Skipped lots, cascade outcomes and group failures.
    pub diagnostics: Vec<Diagnostic>,
    /// Per-group snapshot after the tick.
    pub summaries: Vec<GroupSummary>,
}

impl TickReport {
    fn new(tick: PriceTick, peaks_tracked: bool) -> Self {
        Self {
            tick,
            peaks_tracked,
            actions: Vec::new(),
            undelivered: Vec::new(),
            changes: Vec::new(),
            peak_updates: Vec::new(),
            activations: Vec::new(),
            stop_updates: Vec::new(),
            diagnostics: Vec::new(),
            summaries: Vec::new(),
        }
    }

    /// Number of lots that exited on this tick.
    #[must_use]
    pub fn exit_count(&self) -> usize {
        self.actions.len() + self.undelivered.len()
    }

    /// Whether any group failed to load, persist or dispatch.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::GroupFailed { .. }))
    }

    /// Lots still active after the tick, across all groups.
    #[must_use]
    pub fn open_lots(&self) -> usize {
        self.summaries.iter().map(|s| s.open_lots).sum()
    }
}

/// Failure while handling one group.
#[derive(Debug)]
struct GroupFailure {
    stage: &'static str,
    error: EngineError,
}

impl GroupFailure {
    fn at(stage: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |err| Self {
            stage,
            error: err.into(),
        }
    }
}

/// An exit decided on an earlier tick that is not yet written to the store.
#[derive(Debug, Clone)]
struct HeldExit {
    action: ExitAction,
    delivered: bool,
}

impl HeldExit {
    fn undelivered(action: ExitAction) -> Self {
        Self {
            action,
            delivered: false,
        }
    }

    fn delivered(action: ExitAction) -> Self {
        Self {
            action,
            delivered: true,
        }
    }
}

/// Use case for evaluating a tick against all open groups.
pub struct ProcessTickUseCase<R, D>
where
    R: PositionRepositoryPort,
    D: ExitDispatcherPort,
{
    repository: Arc<R>,
    dispatcher: Arc<D>,
    evaluator: ExitConditionEvaluator,
    peak_throttle: Option<IntervalThrottle>,
    hooks: Vec<Arc<dyn ExitHook>>,
    held: Mutex<HashMap<GroupId, Vec<HeldExit>>>,
}

impl<R, D> ProcessTickUseCase<R, D>
where
    R: PositionRepositoryPort,
    D: ExitDispatcherPort,
{
    /// Create a new `ProcessTickUseCase`.
    pub fn new(repository: Arc<R>, dispatcher: Arc<D>, evaluator: ExitConditionEvaluator) -> Self {
        Self {
            repository,
            dispatcher,
            evaluator,
            peak_throttle: None,
            hooks: Vec::new(),
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Rate-limit peak updates.
    #[must_use]
    pub fn with_peak_throttle(mut self, throttle: IntervalThrottle) -> Self {
        self.peak_throttle = Some(throttle);
        self
    }

    /// Register a hook run once per delivered exit.
    pub fn add_hook(&mut self, hook: Arc<dyn ExitHook>) {
        self.hooks.push(hook);
    }

    /// Evaluator in use.
    #[must_use]
    pub const fn evaluator(&self) -> &ExitConditionEvaluator {
        &self.evaluator
    }

    /// Exits waiting to be delivered or written, across all groups.
    #[must_use]
    pub fn held_exit_count(&self) -> usize {
        self.held_exits().values().map(Vec::len).sum()
    }

    /// Process one tick.
    ///
    /// # Errors
    ///
    /// Returns an error only if the active lots cannot be loaded at all;
    /// per-group failures are reported in [`TickReport::diagnostics`].
    pub async fn execute(&self, tick: PriceTick) -> Result<TickReport, EngineError> {
        let span = tracing::info_span!(
            "exit_engine.tick",
            price = %tick.price,
            time = %tick.time
        );
        self.execute_inner(tick).instrument(span).await
    }

    async fn execute_inner(&self, tick: PriceTick) -> Result<TickReport, EngineError> {
        let started = Instant::now();

        let active = self.repository.get_active_positions(None).await.map_err(|e| {
            observability::record_group_failure("load");
            EngineError::from(e)
        })?;

        let track_peaks = self
            .peak_throttle
            .as_ref()
            .is_none_or(IntervalThrottle::try_acquire);
        let options = EvaluationOptions { track_peaks };
        let mut report = TickReport::new(tick, track_peaks);

        let mut by_group: BTreeMap<GroupId, Vec<PositionRecord>> = BTreeMap::new();
        for record in active {
            by_group.entry(record.group_id.clone()).or_default().push(record);
        }

        self.release_stale(&by_group.keys().cloned().collect());

        for (group_id, records) in by_group {
            let span = tracing::debug_span!("exit_engine.group", group_id = %group_id);
            let result = self
                .process_group(&group_id, records, &tick, options, &mut report)
                .instrument(span)
                .await;

            if let Err(failure) = result {
                observability::record_group_failure(failure.stage);
                tracing::warn!(
                    group_id = %group_id,
                    stage = failure.stage,
                    error = %failure.error,
                    "Group processing failed"
                );
                report.diagnostics.push(Diagnostic::GroupFailed {
                    group_id,
                    message: format!("{}: {}", failure.stage, failure.error),
                });
            }
        }

        observability::update_active_lots(report.open_lots());
        observability::record_tick_duration(started.elapsed().as_secs_f64());

        if report.exit_count() > 0 {
            tracing::info!(
                exits = report.exit_count(),
                cascade_updates = report.stop_updates.len(),
                "Tick produced exits"
            );
        }

        Ok(report)
    }

    async fn process_group(
        &self,
        group_id: &GroupId,
        records: Vec<PositionRecord>,
        tick: &PriceTick,
        options: EvaluationOptions,
        report: &mut TickReport,
    ) -> Result<(), GroupFailure> {
        let Some(range) = self
            .repository
            .get_group(group_id)
            .await
            .map_err(GroupFailure::at("load"))?
        else {
            for record in records {
                Self::skip_lot(
                    report,
                    group_id,
                    DataInconsistency::GroupNotFound {
                        position_id: record.position_id,
                        group_id: group_id.clone(),
                    },
                );
            }
            return Ok(());
        };

        let mut lots = records;
        lots.extend(
            self.repository
                .get_exited_positions(group_id)
                .await
                .map_err(GroupFailure::at("load"))?,
        );

        let (mut group, rejected) = TradeGroup::assemble(range, lots);
        for inconsistency in rejected {
            Self::skip_lot(report, group_id, inconsistency);
        }

        let held = self.held_for(group_id);
        if !held.is_empty() {
            tracing::info!(group_id = %group_id, exits = held.len(), "Replaying held exits");
        }
        let replay: Vec<ExitAction> = held.iter().map(|h| h.action.clone()).collect();
        let mut evaluation = self.evaluator.replay_exits(&mut group, &replay);
        evaluation.absorb(self.evaluator.evaluate_group(&mut group, tick, options));

        // Held exits the executor already accepted only need writing.
        let accepted: HashSet<&PositionId> = held
            .iter()
            .filter(|h| h.delivered)
            .map(|h| &h.action.position_id)
            .collect();
        let (confirmed, outgoing): (Vec<ExitAction>, Vec<ExitAction>) =
            std::mem::take(&mut evaluation.actions)
                .into_iter()
                .partition(|action| accepted.contains(&action.position_id));

        if !outgoing.is_empty() {
            if let Err(err) = self.dispatcher.dispatch(&outgoing).await {
                observability::record_group_failure("dispatch");
                tracing::warn!(
                    group_id = %group_id,
                    error = %err,
                    actions = outgoing.len(),
                    "Exit dispatch failed, holding exits for retry"
                );
                report.diagnostics.push(Diagnostic::GroupFailed {
                    group_id: group_id.clone(),
                    message: format!("dispatch: {}", EngineError::from(err)),
                });

                let retry = confirmed
                    .into_iter()
                    .map(HeldExit::delivered)
                    .chain(outgoing.iter().cloned().map(HeldExit::undelivered))
                    .collect();
                self.hold(group_id, retry);

                evaluation.retain_writes(|change| !change.follows_exit());
                if evaluation.has_changes() {
                    self.repository
                        .apply_changes(&evaluation.changes)
                        .await
                        .map_err(GroupFailure::at("persist"))?;
                }
                evaluation.actions = outgoing;
                self.record(evaluation, false, report);
                return Ok(());
            }
        }

        if evaluation.has_changes() {
            if let Err(err) = self.repository.apply_changes(&evaluation.changes).await {
                let retry = confirmed
                    .into_iter()
                    .chain(outgoing.iter().cloned())
                    .map(HeldExit::delivered)
                    .collect();
                self.hold(group_id, retry);

                // Delivered exits still reach hooks; nothing else was written.
                evaluation.retain_writes(|_| false);
                evaluation.actions = outgoing;
                self.record(evaluation, true, report);
                return Err(GroupFailure::at("persist")(err));
            }
        }
        self.release(group_id);

        let summary = group.summary();
        evaluation.actions = outgoing;
        self.record(evaluation, true, report);
        report.summaries.push(summary);
        Ok(())
    }

    fn held_exits(&self) -> MutexGuard<'_, HashMap<GroupId, Vec<HeldExit>>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn held_for(&self, group_id: &GroupId) -> Vec<HeldExit> {
        self.held_exits().get(group_id).cloned().unwrap_or_default()
    }

    fn hold(&self, group_id: &GroupId, exits: Vec<HeldExit>) {
        self.held_exits().insert(group_id.clone(), exits);
    }

    fn release(&self, group_id: &GroupId) {
        self.held_exits().remove(group_id);
    }

    /// Drop held exits for groups with no active lots left in the store.
    fn release_stale(&self, active: &HashSet<GroupId>) {
        self.held_exits().retain(|group_id, exits| {
            let keep = active.contains(group_id);
            if !keep {
                tracing::debug!(
                    group_id = %group_id,
                    exits = exits.len(),
                    "Dropping held exits for closed group"
                );
            }
            keep
        });
    }

    fn skip_lot(report: &mut TickReport, group_id: &GroupId, inconsistency: DataInconsistency) {
        observability::record_lot_skipped();
        tracing::warn!(
            group_id = %group_id,
            position_id = %inconsistency.position_id(),
            reason = %inconsistency,
            "Lot skipped"
        );
        report.diagnostics.push(Diagnostic::LotSkipped {
            group_id: group_id.clone(),
            inconsistency,
        });
    }

    /// Emit logs, metrics and hooks for a handled evaluation and fold it into the report.
    fn record(&self, evaluation: GroupEvaluation, delivered: bool, report: &mut TickReport) {
        let GroupEvaluation {
            group_id,
            actions,
            changes,
            peak_updates,
            activations,
            stop_updates,
            diagnostics,
        } = evaluation;

        for position_id in &activations {
            observability::record_trailing_activation();
            tracing::info!(group_id = %group_id, position_id = %position_id, "Trailing stop armed");
        }
        for update in &peak_updates {
            observability::record_peak_update();
            tracing::debug!(
                position_id = %update.position_id,
                old_peak = %update.old_peak,
                new_peak = %update.new_peak,
                "Peak updated"
            );
        }
        for update in &stop_updates {
            observability::record_cascade_update();
            tracing::info!(
                group_id = %group_id,
                position_id = %update.position_id,
                lot_id = update.lot_id,
                old_stop = %update.old_stop,
                new_stop = %update.new_stop,
                cumulative_profit = %update.cumulative_profit,
                "Protective stop applied"
            );
        }
        for diagnostic in &diagnostics {
            match diagnostic {
                Diagnostic::CascadeSkipped { skip, .. } => {
                    observability::record_cascade_skip(*skip);
                    tracing::debug!(%diagnostic, "Cascade skipped");
                }
                Diagnostic::LotSkipped { .. } => {
                    observability::record_lot_skipped();
                    tracing::warn!(%diagnostic, "Lot skipped");
                }
                Diagnostic::GroupFailed { .. } => tracing::warn!(%diagnostic, "Group failed"),
            }
        }
        if delivered {
            for action in &actions {
                observability::record_exit_action(action.exit_reason);
                tracing::info!(
                    group_id = %group_id,
                    position_id = %action.position_id,
                    lot_id = action.lot_id,
                    reason = %action.exit_reason,
                    price = %action.exit_price,
                    pnl = %action.realized_pnl,
                    "Exit emitted"
                );
                for hook in &self.hooks {
                    hook.on_exit(action);
                }
            }
            report.actions.extend(actions);
        } else {
            for action in &actions {
                tracing::debug!(
                    group_id = %group_id,
                    position_id = %action.position_id,
                    lot_id = action.lot_id,
                    reason = %action.exit_reason,
                    "Exit held"
                );
            }
            report.undelivered.extend(actions);
        }

        report.changes.extend(changes);
        report.peak_updates.extend(peak_updates);
        report.activations.extend(activations);
        report.stop_updates.extend(stop_updates);
        report.diagnostics.extend(diagnostics);
    }
}
