//! Canonical, observable list of stream records.
//!
//! The registry is owned exclusively by the dashboard core and mutated only
//! through [`Registry::merge`] (channel batches) or [`Registry::replace`]
//! (initial load and post-command refresh).  At most one record per id at
//! any time; append-on-new, update-in-place-on-existing, so positions of
//! untouched records are stable.

use crate::record::{RecordId, StreamPatch, StreamRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    records: Vec<StreamRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[StreamRecord] {
        &self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&StreamRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full replace — initial load and the refresh after a control command.
    pub fn replace(&mut self, records: Vec<StreamRecord>) {
        self.records = records;
    }

    /// Apply a batch of partial updates in arrival order.
    ///
    /// Known ids are overlaid field-wise in place; unknown ids are appended.
    /// Applying the same batch twice yields the same registry.
    pub fn merge(&mut self, batch: Vec<StreamPatch>) {
        for patch in batch {
            match self.records.iter_mut().find(|r| r.id == patch.id) {
                Some(existing) => patch.apply_to(existing),
                None => self.records.push(patch.into_record()),
            }
        }
    }
}
