use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::upsert::schema::{Fields, RecordSchema, Relations};
use crate::upsert::RecordId;

/// A single entity instance: plain attributes plus relation memberships.
///
/// `id` and the timestamps are `None` until a store has persisted the record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub id: Option<RecordId>,
    pub slug: String,
    pub fields: Fields,
    pub relations: Relations,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Unsaved record built from plain field values only.
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// JSON representation returned to API clients.
    ///
    /// Every declared field is present; unset fields render as `null` and
    /// unset relations as an empty list.
    pub fn to_json(&self, schema: &RecordSchema) -> Value {
        let mut body = Fields::new();
        body.insert("id".to_string(), json!(self.id));
        body.insert("slug".to_string(), json!(self.slug));

        for spec in schema.fields {
            let value = self.fields.get(spec.name).cloned().unwrap_or(Value::Null);
            body.insert(spec.name.to_string(), value);
        }

        for relation in schema.relations {
            let ids: Vec<RecordId> = self
                .relations
                .get(relation.name)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();
            body.insert(relation.name.to_string(), json!(ids));
        }

        body.insert("created_at".to_string(), json!(self.created_at));
        body.insert("updated_at".to_string(), json!(self.updated_at));

        Value::Object(body)
    }
}
