//! Persistence seam for records, plus the in-process store.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{RecordError, Violation};
use crate::query::{ListQuery, Listing};
use crate::upsert::schema::{OnDelete, RecordSchema};
use crate::upsert::{Record, RecordId};

/// Storage backend for records of any schema.
///
/// Writes enforce the schema's constraints and return
/// `RecordError::Validation` on violation. Each method is its own unit of
/// work: a `save` followed by a failing `replace_relation` keeps the save.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record, assigning `id` and timestamps.
    async fn insert(&self, schema: &RecordSchema, record: Record) -> Result<Record, RecordError>;

    /// Persist changes to an existing record.
    ///
    /// # Errors
    /// * `NotFound` - the record no longer exists
    async fn save(&self, schema: &RecordSchema, record: Record) -> Result<Record, RecordError>;

    /// Replace the whole membership set of one relation field.
    async fn replace_relation(
        &self,
        schema: &RecordSchema,
        id: RecordId,
        field: &str,
        targets: &BTreeSet<RecordId>,
    ) -> Result<(), RecordError>;

    async fn get(&self, schema: &RecordSchema, id: RecordId) -> Result<Option<Record>, RecordError>;

    async fn list(&self, schema: &RecordSchema, query: &ListQuery) -> Result<Listing, RecordError>;

    /// Delete a record and its relation memberships. Returns `false` if it did not exist.
    ///
    /// `referrers` are the schemas whose reference fields may point at the
    /// deleted record. Each such field's `OnDelete` rule is applied: referring
    /// records are deleted in turn (`Cascade`) or have the field set to `null`
    /// (`SetNull`).
    async fn delete(
        &self,
        schema: &RecordSchema,
        id: RecordId,
        referrers: &[RecordSchema],
    ) -> Result<bool, RecordError>;
}

#[derive(Default)]
struct Tables {
    next_id: RecordId,
    /// resource name -> id -> record
    records: HashMap<String, BTreeMap<RecordId, Record>>,
}

impl Tables {
    fn contains(&self, resource: &str, id: RecordId) -> bool {
        self.records
            .get(resource)
            .map(|rows| rows.contains_key(&id))
            .unwrap_or(false)
    }

    fn check_constraints(&self, schema: &RecordSchema, record: &Record) -> Result<(), RecordError> {
        schema.validate(&record.fields)?;

        for (field, resource, id) in schema.references(&record.fields) {
            if !self.contains(resource, id) {
                return Err(RecordError::validation(field, Violation::UnknownReference { id }));
            }
        }

        if schema.unique_slug {
            let taken = self
                .records
                .get(schema.resource)
                .map(|rows| {
                    rows.values()
                        .any(|other| other.id != record.id && other.slug == record.slug)
                })
                .unwrap_or(false);
            if taken {
                return Err(RecordError::validation("slug", Violation::Duplicate));
            }
        }

        Ok(())
    }

    fn remove(&mut self, resource: &str, id: RecordId) -> bool {
        let removed = self
            .records
            .get_mut(resource)
            .and_then(|rows| rows.remove(&id))
            .is_some();

        // Ids are unique across resources, so memberships can be dropped by id alone
        if removed {
            for record in self.records.values_mut().flat_map(|rows| rows.values_mut()) {
                for targets in record.relations.values_mut() {
                    targets.remove(&id);
                }
            }
        }
        removed
    }

    /// Ids of `resource` records whose `field` holds `target`.
    fn referring(&self, resource: &str, field: &str, target: RecordId) -> Vec<RecordId> {
        self.records
            .get(resource)
            .map(|rows| {
                rows.iter()
                    .filter(|(_, record)| record.get(field).and_then(Value::as_i64) == Some(target))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-process store used in development mode and by tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, schema: &RecordSchema, mut record: Record) -> Result<Record, RecordError> {
        let mut tables = self.write();
        record.id = None;
        tables.check_constraints(schema, &record)?;

        tables.next_id += 1;
        let id = tables.next_id;
        let now = Utc::now();
        record.id = Some(id);
        record.created_at = Some(now);
        record.updated_at = Some(now);

        tables
            .records
            .entry(schema.resource.to_string())
            .or_default()
            .insert(id, record.clone());

        Ok(record)
    }

    async fn save(&self, schema: &RecordSchema, mut record: Record) -> Result<Record, RecordError> {
        let mut tables = self.write();
        let not_found = || RecordError::NotFound {
            resource: schema.resource.to_string(),
            id: record.id.unwrap_or_default(),
        };

        let id = record.id.ok_or_else(not_found)?;
        let created_at = tables
            .records
            .get(schema.resource)
            .and_then(|rows| rows.get(&id))
            .map(|existing| existing.created_at)
            .ok_or_else(not_found)?;

        tables.check_constraints(schema, &record)?;

        record.created_at = created_at;
        record.updated_at = Some(Utc::now());
        if let Some(rows) = tables.records.get_mut(schema.resource) {
            rows.insert(id, record.clone());
        }

        Ok(record)
    }

    async fn replace_relation(
        &self,
        schema: &RecordSchema,
        id: RecordId,
        field: &str,
        targets: &BTreeSet<RecordId>,
    ) -> Result<(), RecordError> {
        let mut tables = self.write();
        let relation = schema.relation(field).ok_or_else(|| RecordError::Schema {
            resource: schema.resource.to_string(),
            field: field.to_string(),
        })?;

        if let Some(missing) = targets.iter().find(|target| !tables.contains(relation.target, **target)) {
            return Err(RecordError::validation(
                field,
                Violation::UnknownReference { id: *missing },
            ));
        }

        let record = tables
            .records
            .get_mut(schema.resource)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| RecordError::NotFound {
                resource: schema.resource.to_string(),
                id,
            })?;
        record.relations.insert(field.to_string(), targets.clone());

        Ok(())
    }

    async fn get(&self, schema: &RecordSchema, id: RecordId) -> Result<Option<Record>, RecordError> {
        Ok(self
            .read()
            .records
            .get(schema.resource)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    async fn list(&self, schema: &RecordSchema, query: &ListQuery) -> Result<Listing, RecordError> {
        let tables = self.read();
        let mut matched: Vec<&Record> = tables
            .records
            .get(schema.resource)
            .map(|rows| {
                rows.values()
                    .filter(|record| {
                        query.matches(record, |resource: &str, id: RecordId| {
                            tables.records.get(resource).and_then(|rows| rows.get(&id))
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by(|a, b| query.compare(a, b));

        Ok(Listing {
            count: matched.len() as u64,
            records: matched
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn delete(
        &self,
        schema: &RecordSchema,
        id: RecordId,
        referrers: &[RecordSchema],
    ) -> Result<bool, RecordError> {
        let mut tables = self.write();
        if !tables.remove(schema.resource, id) {
            return Ok(false);
        }

        let mut pending = vec![(schema.resource, id)];
        while let Some((resource, target)) = pending.pop() {
            for referrer in referrers {
                for (field, on_delete) in referrer.referrers(resource) {
                    for referring in tables.referring(referrer.resource, field, target) {
                        match on_delete {
                            OnDelete::Cascade => {
                                if tables.remove(referrer.resource, referring) {
                                    pending.push((referrer.resource, referring));
                                }
                            }
                            OnDelete::SetNull => {
                                if let Some(record) = tables
                                    .records
                                    .get_mut(referrer.resource)
                                    .and_then(|rows| rows.get_mut(&referring))
                                {
                                    record.fields.insert(field.to_string(), Value::Null);
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(true)
    }
}
