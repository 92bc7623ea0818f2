use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::error::{RecordError, Violation};
use crate::query::{ListQuery, Listing, BUILTIN_COLUMNS};
use crate::upsert::{
    Fields, OnDelete, Record, RecordId, RecordSchema, RecordStore, Relations, SearchField,
};

const RECORD_COLUMNS: &str = "id, slug, fields, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    slug: String,
    fields: Json<Fields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            id: Some(row.id),
            slug: row.slug,
            fields: row.fields.0,
            relations: Relations::new(),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

/// PostgreSQL-backed record store.
///
/// Every resource shares one `records` table; plain fields live in a JSONB
/// column. Relation memberships are rows of `record_relations`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and create tables if missing
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.create_tables().await?;
        info!(max_connections, "Connected to PostgreSQL");

        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                id BIGSERIAL PRIMARY KEY,
                resource TEXT NOT NULL,
                slug TEXT NOT NULL DEFAULT '',
                fields JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create records table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_resource_slug ON records (resource, slug)")
            .execute(&self.pool)
            .await
            .context("Failed to create records index")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS record_relations (
                record_id BIGINT NOT NULL REFERENCES records (id) ON DELETE CASCADE,
                field TEXT NOT NULL,
                target_id BIGINT NOT NULL REFERENCES records (id) ON DELETE CASCADE,
                PRIMARY KEY (record_id, field, target_id)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create record_relations table")?;

        Ok(())
    }

    /// Attach relation memberships to already loaded records.
    async fn load_relations(&self, records: &mut [Record]) -> Result<(), RecordError> {
        let ids: Vec<RecordId> = records.iter().filter_map(|record| record.id).collect();
        if ids.is_empty() {
            return Ok(());
        }

        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT record_id, field, target_id FROM record_relations WHERE record_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_record: HashMap<RecordId, Relations> = HashMap::new();
        for (record_id, field, target_id) in rows {
            by_record
                .entry(record_id)
                .or_default()
                .entry(field)
                .or_default()
                .insert(target_id);
        }

        for record in records {
            if let Some(relations) = record.id.and_then(|id| by_record.remove(&id)) {
                record.relations = relations;
            }
        }

        Ok(())
    }
}

/// Serialize writers of one resource until the transaction ends.
async fn lock_resource(conn: &mut PgConnection, resource: &str) -> Result<(), RecordError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(resource)
        .execute(conn)
        .await?;
    Ok(())
}

async fn exists(conn: &mut PgConnection, resource: &str, id: RecordId) -> Result<bool, RecordError> {
    let found: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM records WHERE resource = $1 AND id = $2)")
            .bind(resource)
            .bind(id)
            .fetch_one(conn)
            .await?;
    Ok(found)
}

async fn check_constraints(
    conn: &mut PgConnection,
    schema: &RecordSchema,
    record: &Record,
) -> Result<(), RecordError> {
    schema.validate(&record.fields)?;

    for (field, resource, id) in schema.references(&record.fields) {
        if !exists(&mut *conn, resource, id).await? {
            return Err(RecordError::validation(field, Violation::UnknownReference { id }));
        }
    }

    if schema.unique_slug {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM records
                WHERE resource = $1 AND slug = $2 AND id IS DISTINCT FROM $3
            )",
        )
        .bind(schema.resource)
        .bind(&record.slug)
        .bind(record.id)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(RecordError::validation("slug", Violation::Duplicate));
        }
    }

    Ok(())
}

async fn delete_row(conn: &mut PgConnection, resource: &str, id: RecordId) -> Result<bool, RecordError> {
    let result = sqlx::query("DELETE FROM records WHERE resource = $1 AND id = $2")
        .bind(resource)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Escape `%`, `_` and `\` so a search term matches literally under `ILIKE`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Filter and search conditions shared by the page and count queries.
fn push_conditions(builder: &mut QueryBuilder<'static, Postgres>, schema: &RecordSchema, query: &ListQuery) {
    builder.push(" WHERE resource = ");
    builder.push_bind(schema.resource);

    for (field, value) in &query.filters {
        match field.as_str() {
            "id" => builder.push(" AND id::text = "),
            "slug" => builder.push(" AND slug = "),
            _ => {
                builder.push(" AND fields ->> ");
                builder.push_bind(field.clone());
                builder.push(" = ")
            }
        };
        builder.push_bind(value.clone());
    }

    let term = query.search.as_deref().map(str::trim).unwrap_or_default();
    if !term.is_empty() && !query.search_fields.is_empty() {
        let pattern = format!("%{}%", escape_like(term));
        builder.push(" AND (");
        for (i, search_field) in query.search_fields.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            match *search_field {
                SearchField::Own(field) => {
                    builder.push("fields ->> ");
                    builder.push_bind(field);
                    push_ilike(builder, &pattern);
                }
                SearchField::Related {
                    reference,
                    resource,
                    field,
                } => {
                    builder.push("EXISTS (SELECT 1 FROM records r WHERE r.resource = ");
                    builder.push_bind(resource);
                    builder.push(" AND r.id = (records.fields ->> ");
                    builder.push_bind(reference);
                    builder.push(")::bigint AND r.fields ->> ");
                    builder.push_bind(field);
                    push_ilike(builder, &pattern);
                    builder.push(")");
                }
            }
        }
        builder.push(")");
    }
}

fn push_ilike(builder: &mut QueryBuilder<'static, Postgres>, pattern: &str) {
    builder.push(" ILIKE ");
    builder.push_bind(pattern.to_string());
    builder.push(" ESCAPE '\\'");
}

fn page_query(schema: &RecordSchema, query: &ListQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM records", RECORD_COLUMNS));
    push_conditions(&mut builder, schema, query);

    builder.push(" ORDER BY ");
    for key in &query.ordering {
        if BUILTIN_COLUMNS.contains(&key.field.as_str()) {
            builder.push(&key.field);
        } else {
            // JSON null sorts with missing values
            builder.push("NULLIF(fields -> ");
            builder.push_bind(key.field.clone());
            builder.push(", 'null'::jsonb)");
        }
        builder.push(if key.descending { " DESC, " } else { " ASC, " });
    }
    builder.push("id ASC");

    builder.push(" LIMIT ");
    builder.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));

    builder
}

fn count_query(schema: &RecordSchema, query: &ListQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM records");
    push_conditions(&mut builder, schema, query);
    builder
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert(&self, schema: &RecordSchema, mut record: Record) -> Result<Record, RecordError> {
        record.id = None;

        let mut tx = self.pool.begin().await?;
        lock_resource(&mut tx, schema.resource).await?;
        check_constraints(&mut tx, schema, &record).await?;

        let row: RecordRow = sqlx::query_as(&format!(
            "INSERT INTO records (resource, slug, fields) VALUES ($1, $2, $3) RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(schema.resource)
        .bind(&record.slug)
        .bind(Value::Object(record.fields.clone()))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(resource = schema.resource, id = row.id, "Inserted record");
        Ok(row.into())
    }

    async fn save(&self, schema: &RecordSchema, record: Record) -> Result<Record, RecordError> {
        let not_found = || RecordError::NotFound {
            resource: schema.resource.to_string(),
            id: record.id.unwrap_or_default(),
        };
        let id = record.id.ok_or_else(not_found)?;

        let mut tx = self.pool.begin().await?;
        lock_resource(&mut tx, schema.resource).await?;
        check_constraints(&mut tx, schema, &record).await?;

        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "UPDATE records SET slug = $1, fields = $2, updated_at = NOW()
             WHERE resource = $3 AND id = $4
             RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(&record.slug)
        .bind(Value::Object(record.fields.clone()))
        .bind(schema.resource)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let row = row.ok_or_else(not_found)?;
        tx.commit().await?;

        let mut saved: Record = row.into();
        saved.relations = record.relations;
        Ok(saved)
    }

    async fn replace_relation(
        &self,
        schema: &RecordSchema,
        id: RecordId,
        field: &str,
        targets: &BTreeSet<RecordId>,
    ) -> Result<(), RecordError> {
        let relation = schema.relation(field).ok_or_else(|| RecordError::Schema {
            resource: schema.resource.to_string(),
            field: field.to_string(),
        })?;
        let targets: Vec<RecordId> = targets.iter().copied().collect();

        let mut tx = self.pool.begin().await?;

        if !exists(&mut tx, schema.resource, id).await? {
            return Err(RecordError::NotFound {
                resource: schema.resource.to_string(),
                id,
            });
        }

        let found: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM records WHERE resource = $1 AND id = ANY($2)")
                .bind(relation.target)
                .bind(&targets)
                .fetch_all(&mut *tx)
                .await?;
        if let Some(missing) = targets.iter().find(|target| !found.contains(target)) {
            return Err(RecordError::validation(
                field,
                Violation::UnknownReference { id: *missing },
            ));
        }

        sqlx::query("DELETE FROM record_relations WHERE record_id = $1 AND field = $2")
            .bind(id)
            .bind(field)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO record_relations (record_id, field, target_id)
             SELECT $1, $2, UNNEST($3::bigint[])",
        )
        .bind(id)
        .bind(field)
        .bind(&targets)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(resource = schema.resource, id, field, count = targets.len(), "Replaced relation");

        Ok(())
    }

    async fn get(&self, schema: &RecordSchema, id: RecordId) -> Result<Option<Record>, RecordError> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM records WHERE resource = $1 AND id = $2",
            RECORD_COLUMNS
        ))
        .bind(schema.resource)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut records = [Record::from(row)];
        self.load_relations(&mut records).await?;
        let [record] = records;
        Ok(Some(record))
    }

    async fn list(&self, schema: &RecordSchema, query: &ListQuery) -> Result<Listing, RecordError> {
        let count: i64 = count_query(schema, query)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<RecordRow> = page_query(schema, query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let mut records: Vec<Record> = rows.into_iter().map(Record::from).collect();
        self.load_relations(&mut records).await?;

        Ok(Listing {
            count: u64::try_from(count).unwrap_or_default(),
            records,
        })
    }

    async fn delete(
        &self,
        schema: &RecordSchema,
        id: RecordId,
        referrers: &[RecordSchema],
    ) -> Result<bool, RecordError> {
        let mut tx = self.pool.begin().await?;
        lock_resource(&mut tx, schema.resource).await?;

        if !delete_row(&mut tx, schema.resource, id).await? {
            return Ok(false);
        }

        let mut pending = vec![(schema.resource, id)];
        while let Some((resource, target)) = pending.pop() {
            for referrer in referrers {
                for (field, on_delete) in referrer.referrers(resource) {
                    lock_resource(&mut tx, referrer.resource).await?;
                    match on_delete {
                        OnDelete::Cascade => {
                            let ids: Vec<i64> = sqlx::query_scalar(
                                "DELETE FROM records
                                 WHERE resource = $1 AND fields -> $2 = to_jsonb($3::bigint)
                                 RETURNING id",
                            )
                            .bind(referrer.resource)
                            .bind(field)
                            .bind(target)
                            .fetch_all(&mut *tx)
                            .await?;
                            pending.extend(ids.into_iter().map(|id| (referrer.resource, id)));
                        }
                        OnDelete::SetNull => {
                            sqlx::query(
                                "UPDATE records SET fields = jsonb_set(fields, ARRAY[$2], 'null'::jsonb)
                                 WHERE resource = $1 AND fields -> $2 = to_jsonb($3::bigint)",
                            )
                            .bind(referrer.resource)
                            .bind(field)
                            .bind(target)
                            .execute(&mut *tx)
                            .await?;
                        }
                    }
                }
            }
        }

        tx.commit().await?;
        debug!(resource = schema.resource, id, "Deleted record");
        Ok(true)
    }
}
