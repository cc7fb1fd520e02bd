//! Peak Tracker Domain Service

use rust_decimal::Decimal;

use crate::domain::exit_management::value_objects::{PeakUpdate, PositionRecord};

/// Direction-aware monotonic peak tracking.
///
/// Only ACTIVE lots with an armed trailing stop are tracked; before arming,
/// trailing logic works from the entry price. Safe to call at any frequency:
/// a price that does not improve the peak is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakTracker;

impl PeakTracker {
    /// Create a new peak tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Move the peak to `current_price` if it is strictly more favorable.
    ///
    /// Returns `None` when nothing changed.
    pub fn update(&self, position: &mut PositionRecord, current_price: Decimal) -> Option<PeakUpdate> {
        if !position.is_active() || !position.trailing_activated {
            return None;
        }
        let old_peak = position.peak_or_entry()?;
        if !position.direction.improves(current_price, old_peak) {
            return None;
        }

        position.peak_price = Some(current_price);
        Some(PeakUpdate {
            position_id: position.position_id.clone(),
            old_peak,
            new_peak: current_price,
            improvement: (current_price - old_peak).abs(),
        })
    }

    /// Update every position in `positions`, returning the changes.
    pub fn update_all(
        &self,
        positions: &mut [PositionRecord],
        current_price: Decimal,
    ) -> Vec<PeakUpdate> {
        positions
            .iter_mut()
            .filter_map(|p| self.update(p, current_price))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit_management::value_objects::{
        ExitReason, PositionDirection, RuleConfig,
    };
    use crate::domain::shared::{GroupId, PositionId, SessionTime};
    use rust_decimal_macros::dec;

    fn armed(direction: PositionDirection) -> PositionRecord {
        let mut record = PositionRecord::filled(
            PositionId::new("p1"),
            GroupId::new("g1"),
            direction,
            dec!(22000),
            dec!(21980),
            RuleConfig::range_only(1),
        );
        record.trailing_activated = true;
        record
    }

    #[test]
    fn long_peak_moves_up_only() {
        let tracker = PeakTracker::new();
        let mut record = armed(PositionDirection::Long);

        let update = tracker.update(&mut record, dec!(22020)).unwrap();
        assert_eq!(update.old_peak, dec!(22000));
        assert_eq!(update.new_peak, dec!(22020));
        assert_eq!(update.improvement, dec!(20));

        assert!(tracker.update(&mut record, dec!(22010)).is_none());
        assert_eq!(record.peak_price, Some(dec!(22020)));
    }

    #[test]
    fn short_peak_moves_down_only() {
        let tracker = PeakTracker::new();
        let mut record = armed(PositionDirection::Short);

        let update = tracker.update(&mut record, dec!(21970)).unwrap();
        assert_eq!(update.improvement, dec!(30));
        assert!(tracker.update(&mut record, dec!(21990)).is_none());
        assert_eq!(record.peak_price, Some(dec!(21970)));
    }

    #[test]
    fn same_price_twice_is_idempotent() {
        let tracker = PeakTracker::new();
        let mut record = armed(PositionDirection::Long);

        assert!(tracker.update(&mut record, dec!(22040)).is_some());
        assert!(tracker.update(&mut record, dec!(22040)).is_none());
    }

    #[test]
    fn unarmed_lot_is_not_tracked() {
        let tracker = PeakTracker::new();
        let mut record = armed(PositionDirection::Long);
        record.trailing_activated = false;

        assert!(tracker.update(&mut record, dec!(22100)).is_none());
        assert_eq!(record.peak_price, Some(dec!(22000)));
    }

    #[test]
    fn exited_lot_is_not_tracked() {
        let tracker = PeakTracker::new();
        let mut record = armed(PositionDirection::Long);
        record.mark_exited(
            ExitReason::TrailingStop,
            dec!(22010),
            SessionTime::from_hms(10, 0, 0).unwrap(),
        );
        assert!(tracker.update(&mut record, dec!(22100)).is_none());
    }

    #[test]
    fn update_all_reports_changed_only() {
        let tracker = PeakTracker::new();
        let mut lots = vec![armed(PositionDirection::Long), armed(PositionDirection::Long)];
        lots[1].trailing_activated = false;

        let updates = tracker.update_all(&mut lots, dec!(22030));
        assert_eq!(updates.len(), 1);
    }
}
