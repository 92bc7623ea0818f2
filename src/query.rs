//! List queries: exact-match filters, substring search, ordering and paging.
//!
//! `ListQuery` is store-neutral. `MemoryStore` evaluates it with the helpers
//! below; `PgStore` translates the same query into SQL.

use serde_json::Value;
use std::cmp::Ordering;

use crate::upsert::{Record, RecordId, SearchField};

/// Columns every record has besides its schema fields.
pub const BUILTIN_COLUMNS: &[&str] = &["id", "slug", "created_at", "updated_at"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

impl OrderKey {
    /// Parse one `ordering` term: `name` ascending, `-name` descending.
    pub fn parse(term: &str) -> Self {
        match term.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: term.to_string(),
                descending: false,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// `(field, value)` pairs; a record matches when the field's text form equals `value`.
    pub filters: Vec<(String, String)>,
    pub search: Option<String>,
    pub search_fields: Vec<SearchField>,
    pub ordering: Vec<OrderKey>,
    pub offset: u64,
    pub limit: u64,
}

/// One page of a listing plus the total number of matches.
#[derive(Debug, Clone)]
pub struct Listing {
    pub count: u64,
    pub records: Vec<Record>,
}

impl ListQuery {
    /// Whether `record` passes the filters and search.
    ///
    /// `related` looks up a record by resource and id, for search fields that
    /// follow a reference.
    pub fn matches<'r, F>(&self, record: &Record, related: F) -> bool
    where
        F: Fn(&str, RecordId) -> Option<&'r Record>,
    {
        let filtered = self.filters.iter().all(|(field, expected)| {
            column_value(record, field)
                .map(|value| text_form(&value) == *expected)
                .unwrap_or(false)
        });

        filtered && self.matches_search(record, related)
    }

    fn matches_search<'r, F>(&self, record: &Record, related: F) -> bool
    where
        F: Fn(&str, RecordId) -> Option<&'r Record>,
    {
        let term = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term.to_lowercase(),
            _ => return true,
        };

        self.search_fields.iter().any(|search_field| {
            let value = match *search_field {
                SearchField::Own(field) => record.get(field),
                SearchField::Related {
                    reference,
                    resource,
                    field,
                } => record
                    .get(reference)
                    .and_then(Value::as_i64)
                    .and_then(|id| related(resource, id))
                    .and_then(|target| target.get(field)),
            };

            value
                .and_then(Value::as_str)
                .map(|text| text.to_lowercase().contains(&term))
                .unwrap_or(false)
        })
    }

    /// Compare two records by the ordering keys, falling back to `id`.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.ordering {
            let left = column_value(a, &key.field);
            let right = column_value(b, &key.field);
            let ordering = compare_values(left.as_ref(), right.as_ref());
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    }
}

/// Value of a built-in column or plain field.
pub fn column_value(record: &Record, field: &str) -> Option<Value> {
    match field {
        "id" => record.id.map(Value::from),
        "slug" => Some(Value::from(record.slug.clone())),
        "created_at" => record.created_at.map(|t| Value::from(t.to_rfc3339())),
        "updated_at" => record.updated_at.map(|t| Value::from(t.to_rfc3339())),
        _ => record.get(field).cloned(),
    }
}

/// Text a filter value is compared against (the JSON scalar without quotes).
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Missing and null values sort last; mixed types order text < number < boolean.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => type_rank(x).cmp(&type_rank(y)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, body: Value) -> Record {
        let mut record = Record::new(body.as_object().cloned().unwrap());
        record.id = Some(id);
        record
    }

    fn unrelated(_: &str, _: RecordId) -> Option<&'static Record> {
        None
    }

    #[test]
    fn test_order_key_parse() {
        assert_eq!(
            OrderKey::parse("-name"),
            OrderKey {
                field: "name".to_string(),
                descending: true
            }
        );
        assert!(!OrderKey::parse("city").descending);
    }

    #[test]
    fn test_filters_compare_text_form() {
        let query = ListQuery {
            filters: vec![
                ("is_active".to_string(), "true".to_string()),
                ("type".to_string(), "2".to_string()),
            ],
            ..Default::default()
        };

        assert!(query.matches(&record(1, json!({"is_active": true, "type": 2})), unrelated));
        assert!(!query.matches(&record(2, json!({"is_active": false, "type": 2})), unrelated));
        assert!(!query.matches(&record(3, json!({"is_active": true})), unrelated));
    }

    #[test]
    fn test_search_is_case_insensitive_substring_over_any_field() {
        let query = ListQuery {
            search: Some("TEHR".to_string()),
            search_fields: vec![SearchField::Own("name"), SearchField::Own("city")],
            ..Default::default()
        };

        assert!(query.matches(&record(1, json!({"name": "Imam", "city": "Tehran"})), unrelated));
        assert!(!query.matches(&record(2, json!({"name": "Imam", "city": "Shiraz"})), unrelated));
    }

    #[test]
    fn test_blank_search_matches_everything() {
        let query = ListQuery {
            search: Some("   ".to_string()),
            search_fields: vec![SearchField::Own("name")],
            ..Default::default()
        };
        assert!(query.matches(&record(1, json!({})), unrelated));
    }

    #[test]
    fn test_search_follows_reference_to_related_title() {
        let query = ListQuery {
            search: Some("hospital".to_string()),
            search_fields: vec![
                SearchField::Own("name"),
                SearchField::Related {
                    reference: "type",
                    resource: "facility_type",
                    field: "title",
                },
            ],
            ..Default::default()
        };
        let hospital = record(7, json!({"title": "General Hospital"}));
        let lookup = |resource: &str, id: RecordId| {
            (resource == "facility_type" && id == 7).then_some(&hospital)
        };

        assert!(query.matches(&record(1, json!({"name": "Imam", "type": 7})), lookup));
        assert!(!query.matches(&record(2, json!({"name": "Imam", "type": 8})), lookup));
        assert!(!query.matches(&record(3, json!({"name": "Imam"})), lookup));
    }

    #[test]
    fn test_compare_uses_keys_then_id() {
        let query = ListQuery {
            ordering: vec![OrderKey::parse("-city"), OrderKey::parse("name")],
            ..Default::default()
        };

        let mut records = vec![
            record(1, json!({"city": "Shiraz", "name": "B"})),
            record(2, json!({"city": "Tehran", "name": "A"})),
            record(3, json!({"city": "Shiraz", "name": "A"})),
            record(4, json!({"city": "Shiraz", "name": "A"})),
        ];
        records.sort_by(|a, b| query.compare(a, b));

        let ids: Vec<_> = records.iter().map(|r| r.id.unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_missing_values_sort_last() {
        let query = ListQuery {
            ordering: vec![OrderKey::parse("name")],
            ..Default::default()
        };
        let named = record(1, json!({"name": "Z"}));
        let unnamed = record(2, json!({}));
        assert_eq!(query.compare(&unnamed, &named), Ordering::Greater);
    }
}
