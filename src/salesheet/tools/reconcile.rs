//! Keyed replace-or-append of row groups against a positional worksheet.
//!
//! Per batch the key column is snapshotted once, then again before the next
//! group whenever an update has shifted row positions. New keys are buffered
//! and appended in a single call once every update has been applied.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::salesheet::tools::error::{Result, StoreError, ToolError};
use crate::salesheet::tools::io::store::{WriteMode, Worksheet};
use crate::salesheet::tools::model::{RecordKey, Row, RowGroup};

/// What the reconciler did to one worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorksheetOutcome {
    pub worksheet: String,
    pub companies: Vec<String>,
    pub groups: usize,
    /// Groups dropped because a later group in the batch had the same key.
    pub coalesced_groups: usize,
    pub appended_groups: usize,
    pub appended_rows: usize,
    pub replaced_groups: usize,
    /// Rows removed by updates.
    pub replaced_rows_old: usize,
    /// Rows inserted by updates.
    pub replaced_rows_new: usize,
    /// Key-column reads issued against the store.
    pub snapshots: usize,
}

impl WorksheetOutcome {
    pub fn any_change(&self) -> bool {
        self.appended_rows > 0 || self.replaced_rows_old > 0 || self.replaced_rows_new > 0
    }

    /// Net change in the worksheet's row count.
    pub fn net_rows(&self) -> isize {
        self.appended_rows as isize + self.replaced_rows_new as isize
            - self.replaced_rows_old as isize
    }
}

/// Applies row groups to a single worksheet.
pub struct Reconciler<'s> {
    sheet: &'s mut dyn Worksheet,
    key_column: usize,
    mode: WriteMode,
}

impl<'s> Reconciler<'s> {
    pub fn new(sheet: &'s mut dyn Worksheet, key_column: usize) -> Self {
        Self {
            sheet,
            key_column,
            mode: WriteMode::UserEntered,
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces every existing occurrence of each group's key in place, or
    /// appends the group when the key is absent.
    ///
    /// Groups sharing a key are coalesced: the last one wins and is applied
    /// at the batch position of the first. A store failure stops the batch;
    /// mutations already applied stay in the worksheet.
    #[instrument(level = "info", skip_all, fields(worksheet = %self.sheet.title(), groups = groups.len()))]
    pub fn apply(&mut self, groups: Vec<RowGroup>) -> Result<WorksheetOutcome> {
        let mut outcome = WorksheetOutcome {
            worksheet: self.sheet.title().to_string(),
            ..WorksheetOutcome::default()
        };
        let submitted = groups.len();
        let groups = coalesce(groups);
        outcome.groups = groups.len();
        outcome.coalesced_groups = submitted - groups.len();

        let mut snapshot = self.snapshot(&mut outcome)?;
        let mut stale = false;
        let mut pending_keys: Vec<RecordKey> = Vec::new();
        let mut pending_rows: Vec<Row> = Vec::new();

        for group in groups.into_values() {
            if stale {
                snapshot = self.snapshot(&mut outcome)?;
                stale = false;
            }

            let positions = find_positions(&snapshot, &group.key);
            if positions.is_empty() {
                debug!(key = %group.key, rows = group.len(), "key not present, queued for append");
                outcome.appended_groups += 1;
                outcome.appended_rows += group.len();
                pending_keys.push(group.key);
                pending_rows.extend(group.rows);
                continue;
            }

            self.replace(&group, &positions)?;
            outcome.replaced_groups += 1;
            outcome.replaced_rows_old += positions.len();
            outcome.replaced_rows_new += group.len();
            stale = true;
        }

        if !pending_rows.is_empty() {
            self.sheet
                .append_rows(&pending_rows, self.mode)
                .map_err(|source| self.write_error(&pending_keys.join(", "), "append_rows", source))?;
            info!(
                groups = pending_keys.len(),
                rows = pending_rows.len(),
                "appended new keys"
            );
        }

        info!(
            appended_rows = outcome.appended_rows,
            replaced_old = outcome.replaced_rows_old,
            replaced_new = outcome.replaced_rows_new,
            snapshots = outcome.snapshots,
            "worksheet reconciled"
        );
        Ok(outcome)
    }

    fn snapshot(&mut self, outcome: &mut WorksheetOutcome) -> Result<Vec<String>> {
        let column = self
            .sheet
            .read_column(self.key_column)
            .map_err(|source| ToolError::StoreRead {
                worksheet: self.sheet.title().to_string(),
                source,
            })?;
        outcome.snapshots += 1;
        debug!(rows = column.len(), "key column snapshot taken");
        Ok(column)
    }

    /// Deletes the key's rows bottom-up, then inserts the new rows at the
    /// first old position.
    fn replace(&mut self, group: &RowGroup, positions: &[usize]) -> Result<()> {
        let anchor = positions[0];
        for &position in positions.iter().rev() {
            self.sheet
                .delete_row(position)
                .map_err(|source| self.write_error(&group.key, "delete_row", source))?;
        }
        if !group.is_empty() {
            self.sheet
                .insert_rows(&group.rows, anchor, self.mode)
                .map_err(|source| self.write_error(&group.key, "insert_rows", source))?;
        }
        info!(
            key = %group.key,
            anchor,
            old_rows = positions.len(),
            new_rows = group.len(),
            "replaced rows in place"
        );
        Ok(())
    }

    fn write_error(&self, key: &str, operation: &'static str, source: StoreError) -> ToolError {
        warn!(
            worksheet = %self.sheet.title(),
            key,
            operation,
            %source,
            "store write failed, earlier mutations are kept"
        );
        ToolError::StoreWrite {
            worksheet: self.sheet.title().to_string(),
            key: key.to_string(),
            operation,
            source,
        }
    }
}

/// Convenience wrapper around [`Reconciler::apply`] in user-entered mode.
pub fn reconcile(
    sheet: &mut dyn Worksheet,
    key_column: usize,
    groups: Vec<RowGroup>,
) -> Result<WorksheetOutcome> {
    Reconciler::new(sheet, key_column).apply(groups)
}

/// 1-based positions whose key cell equals `key`, ascending.
pub fn find_positions(snapshot: &[String], key: &str) -> Vec<usize> {
    snapshot
        .iter()
        .enumerate()
        .filter(|(_, value)| value.as_str() == key)
        .map(|(index, _)| index + 1)
        .collect()
}

fn coalesce(groups: Vec<RowGroup>) -> IndexMap<RecordKey, RowGroup> {
    let mut unique: IndexMap<RecordKey, RowGroup> = IndexMap::with_capacity(groups.len());
    for group in groups {
        if let Some(previous) = unique.insert(group.key.clone(), group) {
            warn!(
                key = %previous.key,
                dropped_rows = previous.len(),
                "duplicate key in batch, keeping the latest rows"
            );
        }
    }
    unique
}
