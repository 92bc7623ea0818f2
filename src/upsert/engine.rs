use std::sync::Arc;
use tracing::debug;

use crate::error::RecordError;
use crate::upsert::schema::{Fields, RecordSchema, Relations};
use crate::upsert::slug::derive_slug;
use crate::upsert::store::RecordStore;
use crate::upsert::Record;

/// Creates and updates records: plain fields, slug and relation memberships.
///
/// The sequence per call is fixed: persist the plain fields (with the slug),
/// then replace each supplied relation. There is no compensating step, so a
/// relation failure after a successful persist leaves the plain-field write
/// in place and the error is returned to the caller.
#[derive(Clone)]
pub struct UpsertEngine {
    store: Arc<dyn RecordStore>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Create a record from proposed values.
    ///
    /// Relation fields never reach the record constructor; they are applied
    /// after the record exists, each as a total replacement.
    ///
    /// # Errors
    /// * `Schema` - `proposed` names a field the schema does not declare
    /// * `Validation` - a value violates the store's constraints
    pub async fn create(&self, schema: &RecordSchema, proposed: Fields) -> Result<Record, RecordError> {
        let (mut plain, relations) = schema.partition(proposed)?;
        let slug_values = plain.clone();

        schema.apply_defaults(&mut plain);
        let mut record = Record::new(plain);
        assign_slug(schema, &mut record, &slug_values);

        let record = self.store.insert(schema, record).await?;
        debug!(resource = schema.resource, id = ?record.id, slug = %record.slug, "Created record");

        self.replace_relations(schema, record, relations).await
    }

    /// Apply proposed values onto an existing record.
    ///
    /// Fields absent from `proposed` keep their values. An already assigned
    /// slug is never recomputed, even when its source fields change.
    ///
    /// # Errors
    /// Same as [`UpsertEngine::create`], plus `NotFound` when the record was
    /// deleted before it could be saved.
    pub async fn update(
        &self,
        schema: &RecordSchema,
        mut existing: Record,
        proposed: Fields,
    ) -> Result<Record, RecordError> {
        let (plain, relations) = schema.partition(proposed)?;

        assign_slug(schema, &mut existing, &plain);
        for (field, value) in plain {
            existing.fields.insert(field, value);
        }

        let record = self.store.save(schema, existing).await?;
        debug!(resource = schema.resource, id = ?record.id, "Updated record");

        self.replace_relations(schema, record, relations).await
    }

    async fn replace_relations(
        &self,
        schema: &RecordSchema,
        mut record: Record,
        relations: Relations,
    ) -> Result<Record, RecordError> {
        let Some(id) = record.id else {
            return Ok(record);
        };

        for (field, targets) in relations {
            self.store.replace_relation(schema, id, &field, &targets).await?;
            record.relations.insert(field, targets);
        }

        Ok(record)
    }
}

/// Derive the slug once: only when the schema has slug sources and the record has none yet.
fn assign_slug(schema: &RecordSchema, record: &mut Record, values: &Fields) {
    if !schema.slug_fields.is_empty() && record.slug.is_empty() {
        record.slug = derive_slug(schema.slug_fields, values);
    }
}
