//! The governed domain record
use super::types::{FieldMap, ModelRef, TimeStamp};
use chrono::Utc;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Record {
    #[n(0)]
    pub model: ModelRef,
    #[n(1)]
    pub attributes: FieldMap,
    #[n(2)]
    pub created_at: TimeStamp<Utc>,
    #[n(3)]
    pub updated_at: TimeStamp<Utc>,
}

impl Record {
    pub fn new(model: ModelRef, attributes: FieldMap) -> Self {
        let now = TimeStamp::new();
        Self {
            model,
            attributes,
            created_at: now.clone(),
            updated_at: now,
        }
    }
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
    /// Writes every field of `values` onto the record in the mapping's order.
    pub fn apply(&mut self, values: &FieldMap) {
        for (field, value) in values.iter() {
            self.attributes.insert(field.clone(), value.clone());
        }
        self.updated_at = TimeStamp::new();
    }
}
