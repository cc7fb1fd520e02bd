//! In-memory position repository for tests and embedding.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::application::ports::{PositionRepositoryPort, RepositoryError};
use crate::domain::exit_management::value_objects::{
    GroupRange, PositionChange, PositionRecord, PositionStatus,
};
use crate::domain::shared::{GroupId, PositionId};

/// In-memory implementation of `PositionRepositoryPort`.
///
/// Change batches are applied to a copy and swapped in, so a rejected batch
/// leaves the store untouched.
#[derive(Debug, Default)]
pub struct InMemoryPositionRepository {
    positions: RwLock<HashMap<PositionId, PositionRecord>>,
    groups: RwLock<HashMap<GroupId, GroupRange>>,
    unavailable: AtomicBool,
}

impl InMemoryPositionRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register group metadata.
    pub fn add_group(&self, range: GroupRange) {
        let mut groups = self
            .groups
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        groups.insert(range.group_id.clone(), range);
    }

    /// Insert or replace a lot record.
    pub fn add_position(&self, record: PositionRecord) {
        let mut positions = self
            .positions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        positions.insert(record.position_id.clone(), record);
    }

    /// Get a lot record by ID.
    #[must_use]
    pub fn position(&self, position_id: &PositionId) -> Option<PositionRecord> {
        let positions = self
            .positions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        positions.get(position_id).cloned()
    }

    /// All lots of a group, ordered by lot ID.
    #[must_use]
    pub fn group_positions(&self, group_id: &GroupId) -> Vec<PositionRecord> {
        let positions = self
            .positions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut lots: Vec<_> = positions
            .values()
            .filter(|p| &p.group_id == group_id)
            .cloned()
            .collect();
        lots.sort_by_key(PositionRecord::lot_id);
        lots
    }

    /// Number of stored lots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every call fail with `RepositoryError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable {
                message: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn filter_positions(
        &self,
        predicate: impl Fn(&PositionRecord) -> bool,
    ) -> Vec<PositionRecord> {
        let positions = self
            .positions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut matched: Vec<_> = positions.values().filter(|p| predicate(p)).cloned().collect();
        matched.sort_by(|a, b| {
            a.group_id
                .cmp(&b.group_id)
                .then_with(|| a.lot_id().cmp(&b.lot_id()))
        });
        matched
    }
}

fn apply_change(
    positions: &mut HashMap<PositionId, PositionRecord>,
    change: &PositionChange,
) -> Result<(), RepositoryError> {
    let position_id = change.position_id();
    let record = positions
        .get_mut(position_id)
        .ok_or_else(|| RepositoryError::PositionNotFound {
            position_id: position_id.clone(),
        })?;

    match change {
        PositionChange::PeakUpdated { peak_price, .. } => {
            record.peak_price = Some(*peak_price);
        }
        PositionChange::TrailingActivated { .. } => {
            record.trailing_activated = true;
        }
        PositionChange::ProtectionApplied {
            current_stop_loss, ..
        } => {
            record.current_stop_loss = *current_stop_loss;
            record.protection_activated = true;
        }
        PositionChange::Exited { details, .. } => {
            if record.status == PositionStatus::Exited {
                return Err(RepositoryError::WriteRejected {
                    position_id: position_id.clone(),
                    message: "position already exited".to_string(),
                });
            }
            record.status = PositionStatus::Exited;
            record.exit = Some(details.clone());
        }
    }
    Ok(())
}

#[async_trait]
impl PositionRepositoryPort for InMemoryPositionRepository {
    async fn get_active_positions(
        &self,
        group_id: Option<&GroupId>,
    ) -> Result<Vec<PositionRecord>, RepositoryError> {
        self.check_available()?;
        Ok(self.filter_positions(|p| {
            p.status == PositionStatus::Active && group_id.is_none_or(|g| &p.group_id == g)
        }))
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<Option<GroupRange>, RepositoryError> {
        self.check_available()?;
        let groups = self
            .groups
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(groups.get(group_id).cloned())
    }

    async fn get_exited_positions(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<PositionRecord>, RepositoryError> {
        self.check_available()?;
        Ok(self.filter_positions(|p| p.status == PositionStatus::Exited && &p.group_id == group_id))
    }

    async fn apply_changes(&self, changes: &[PositionChange]) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut positions = self
            .positions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut staged = positions.clone();
        for change in changes {
            apply_change(&mut staged, change)?;
        }
        *positions = staged;
        drop(positions);
        Ok(())
    }
}
