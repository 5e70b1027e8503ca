//! The save cycle: plan the staged changes, hand them to a writer, and clear
//! the store once the writer reports a commit.

use thiserror::Error;
use tracing::{info, warn};

use crate::error::EditError;
use crate::planner;
use crate::staging::StagedChanges;
use crate::types::TableChanges;

/// Something that can persist a planned batch atomically.
///
/// Implementations must either apply every change or none of them.
pub trait ChangeWriter {
    type Error: std::error::Error + 'static;

    fn apply_changes(&mut self, table: &str, changes: &TableChanges) -> Result<(), Self::Error>;
}

/// Why a save did not commit. The staged changes are intact in both cases.
#[derive(Debug, Error)]
pub enum SaveError<E: std::error::Error + 'static> {
    /// The staged changes could not be turned into a valid batch.
    #[error(transparent)]
    Plan(#[from] EditError),

    /// The writer rejected the batch and rolled back.
    #[error("save failed: {0}")]
    Apply(#[source] E),
}

/// Plans and writes everything staged for `table`, returning how many staged
/// changes were saved.
///
/// On success the store and its history are cleared; the caller should reload
/// its rows since any fetched page is now stale.
///
/// # Errors
///
/// Returns [`SaveError::Plan`] (including [`EditError::MissingTableChanges`]
/// when nothing is staged) or [`SaveError::Apply`]. The store is unchanged on
/// error.
pub fn save<W: ChangeWriter>(
    staged: &mut StagedChanges,
    table: &str,
    writer: &mut W,
) -> Result<usize, SaveError<W::Error>> {
    if !staged.has_dirty_edits() {
        return Err(SaveError::Plan(EditError::MissingTableChanges));
    }
    let changes = planner::plan(staged)?;
    let saved = staged.dirty_count();

    if let Err(err) = writer.apply_changes(table, &changes) {
        warn!(table, error = %err, "Save rejected, keeping staged changes");
        return Err(SaveError::Apply(err));
    }

    staged.clear();
    info!(table, saved, "Saved staged changes");
    Ok(saved)
}
