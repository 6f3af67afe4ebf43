//! Splits a proposed write into the part that needs approval and the part that
//! can be written straight away.
use super::config::FieldSelection;
use super::error::ApprovalError;
use super::types::FieldMap;
use serde_json::Value;

/// Captured original vs. proposed values of one pending change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub original_data: FieldMap,
    pub new_data: FieldMap,
}

/// Result of diffing a write against the persisted record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Split {
    /// `None` when no approvable field actually changed
    pub snapshot: Option<Snapshot>,
    pub passthrough: FieldMap,
}

impl Snapshot {
    pub fn new(original_data: FieldMap, new_data: FieldMap) -> Result<Self, ApprovalError> {
        let snapshot = Self {
            original_data,
            new_data,
        };
        snapshot.verify()?;
        Ok(snapshot)
    }
    /// Snapshot of a record that does not exist yet
    pub fn for_create(attributes: &FieldMap) -> Self {
        Self {
            original_data: attributes.with_nulls(),
            new_data: attributes.clone(),
        }
    }
    /// Snapshot of a record that is proposed for removal
    pub fn for_delete(attributes: &FieldMap) -> Self {
        Self {
            original_data: attributes.clone(),
            new_data: attributes.with_nulls(),
        }
    }
    pub fn verify(&self) -> Result<(), ApprovalError> {
        let diverging = self.original_data.diverging_keys(&self.new_data);
        if !diverging.is_empty() {
            return Err(ApprovalError::SnapshotMismatch(diverging));
        }
        Ok(())
    }
}

/// Diffs `proposed` against `original`, restricted to `selection`.
///
/// Unchanged fields are dropped. Changed fields outside the selection end up in
/// `passthrough`. A field missing from `original` is captured with a null prior
/// value.
pub fn capture(
    selection: &FieldSelection,
    original: &FieldMap,
    proposed: &FieldMap,
) -> Result<Split, ApprovalError> {
    let mut original_data = FieldMap::new();
    let mut new_data = FieldMap::new();
    let mut passthrough = FieldMap::new();

    for (field, value) in proposed.iter() {
        let previous = original.get(field).unwrap_or(&Value::Null);
        if previous == value && original.contains_key(field) {
            continue;
        }

        if selection.contains(field) {
            original_data.insert(field.clone(), previous.clone());
            new_data.insert(field.clone(), value.clone());
        } else {
            passthrough.insert(field.clone(), value.clone());
        }
    }

    let snapshot = if new_data.is_empty() {
        None
    } else {
        Some(Snapshot::new(original_data, new_data)?)
    };

    Ok(Split {
        snapshot,
        passthrough,
    })
}
