//! Position Repository Port (Driven Port)
//!
//! Interface for loading lot records and persisting the field writes the
//! evaluator produces.

use async_trait::async_trait;

use crate::domain::exit_management::value_objects::{GroupRange, PositionChange, PositionRecord};
use crate::domain::shared::{GroupId, PositionId};

/// Repository error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    /// Backing store unavailable.
    #[error("repository unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// A change referenced a position the store does not know.
    #[error("position not found: {position_id}")]
    PositionNotFound {
        /// Position ID.
        position_id: PositionId,
    },

    /// The store rejected a write.
    #[error("write rejected for {position_id}: {message}")]
    WriteRejected {
        /// Position ID.
        position_id: PositionId,
        /// Error details.
        message: String,
    },
}

/// Port for lot persistence.
#[async_trait]
pub trait PositionRepositoryPort: Send + Sync {
    /// ACTIVE lots, optionally restricted to one group.
    async fn get_active_positions(
        &self,
        group_id: Option<&GroupId>,
    ) -> Result<Vec<PositionRecord>, RepositoryError>;

    /// Group metadata (direction and opening range).
    async fn get_group(&self, group_id: &GroupId) -> Result<Option<GroupRange>, RepositoryError>;

    /// EXITED lots of a group, used as cascade history.
    async fn get_exited_positions(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<PositionRecord>, RepositoryError>;

    /// Persist a batch of field writes.
    ///
    /// Implementations apply the batch atomically: either every change is
    /// stored or none is.
    async fn apply_changes(&self, changes: &[PositionChange]) -> Result<(), RepositoryError>;
}
