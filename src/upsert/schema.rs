//! Statically declared record schemas.
//!
//! A schema names every plain field (with its type and constraints), every
//! many-to-many relation field and the ordered list of fields the slug is
//! derived from. Schemas are `const` values so each resource's shape is
//! checked at compile time instead of discovered at runtime.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::error::{RecordError, Violation};
use crate::upsert::RecordId;

/// Field name to value mapping, as proposed by a caller or stored on a record.
pub type Fields = Map<String, Value>;

/// Relation field name to the complete set of foreign identifiers.
pub type Relations = BTreeMap<String, BTreeSet<RecordId>>;

/// Storage type of a plain field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text { max_length: usize },
    Html,
    Email,
    Url,
    Boolean,
    Integer,
    /// Single foreign key to a record of another resource.
    Reference {
        resource: &'static str,
        on_delete: OnDelete,
    },
}

/// What happens to a record when the record its reference points at is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete the referring record too.
    Cascade,
    /// Clear the reference to `null`; only valid on optional fields.
    SetNull,
}

/// A text value matched by list search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// Plain field of the record itself.
    Own(&'static str),
    /// Plain field of the record a reference field points at, e.g. the type's title.
    Related {
        reference: &'static str,
        resource: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<fn() -> Value>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    pub const fn text(name: &'static str, max_length: usize) -> Self {
        Self::new(name, FieldKind::Text { max_length })
    }

    pub const fn reference(name: &'static str, resource: &'static str, on_delete: OnDelete) -> Self {
        Self::new(name, FieldKind::Reference { resource, on_delete })
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn with_default(mut self, default: fn() -> Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Check a single value against this field's type and constraints.
    pub fn check(&self, value: &Value) -> Result<(), Violation> {
        if value.is_null() {
            return if self.required {
                Err(Violation::Required)
            } else {
                Ok(())
            };
        }

        match self.kind {
            FieldKind::Text { max_length } => {
                let text = value.as_str().ok_or(Violation::ExpectedText)?;
                check_blank(self.required, text)?;
                if text.chars().count() > max_length {
                    return Err(Violation::TooLong { max_length });
                }
            }
            FieldKind::Html => {
                let text = value.as_str().ok_or(Violation::ExpectedText)?;
                check_blank(self.required, text)?;
            }
            FieldKind::Email => {
                let text = value.as_str().ok_or(Violation::ExpectedText)?;
                check_blank(self.required, text)?;
                if !text.is_empty() && !email_regex().is_match(text) {
                    return Err(Violation::InvalidEmail);
                }
            }
            FieldKind::Url => {
                let text = value.as_str().ok_or(Violation::ExpectedText)?;
                check_blank(self.required, text)?;
                if !text.is_empty() && !url_regex().is_match(text) {
                    return Err(Violation::InvalidUrl);
                }
            }
            FieldKind::Boolean => {
                value.as_bool().ok_or(Violation::ExpectedBoolean)?;
            }
            FieldKind::Integer | FieldKind::Reference { .. } => {
                value.as_i64().ok_or(Violation::ExpectedInteger)?;
            }
        }

        Ok(())
    }
}

fn check_blank(required: bool, text: &str) -> Result<(), Violation> {
    if required && text.trim().is_empty() {
        Err(Violation::Required)
    } else {
        Ok(())
    }
}

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| Regex::new(r"(?i)^(https?|ftps?)://[^\s/?#]+[^\s]*$").unwrap())
}

/// A many-to-many relation field and the resource its identifiers point at.
#[derive(Debug, Clone, Copy)]
pub struct RelationSpec {
    pub name: &'static str,
    pub target: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub resource: &'static str,
    pub fields: &'static [FieldSpec],
    pub relations: &'static [RelationSpec],
    /// Ordered slug sources; empty disables slug derivation.
    pub slug_fields: &'static [&'static str],
    /// Reject a second record of this resource with the same slug.
    pub unique_slug: bool,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Split proposed values into plain fields and relation memberships.
    ///
    /// Any name the schema does not declare is a `Schema` error. Relation
    /// values must be arrays of integer identifiers.
    pub fn partition(&self, proposed: Fields) -> Result<(Fields, Relations), RecordError> {
        let mut plain = Fields::new();
        let mut relations = Relations::new();

        for (name, value) in proposed {
            if self.relation(&name).is_some() {
                let ids = relation_ids(&value)
                    .ok_or_else(|| RecordError::validation(name.clone(), Violation::ExpectedIdList))?;
                relations.insert(name, ids);
            } else if self.field(&name).is_some() {
                plain.insert(name, value);
            } else {
                return Err(RecordError::Schema {
                    resource: self.resource.to_string(),
                    field: name,
                });
            }
        }

        Ok((plain, relations))
    }

    /// Fill declared defaults for fields the caller did not supply.
    pub fn apply_defaults(&self, fields: &mut Fields) {
        for spec in self.fields {
            if let Some(default) = spec.default {
                fields.entry(spec.name).or_insert_with(default);
            }
        }
    }

    /// First required field absent from `proposed`, if any.
    pub fn missing_required(&self, proposed: &Fields) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|spec| spec.required && spec.default.is_none() && !proposed.contains_key(spec.name))
            .map(|spec| spec.name)
    }

    /// Check every plain field of a record about to be persisted.
    pub fn validate(&self, fields: &Fields) -> Result<(), RecordError> {
        for spec in self.fields {
            let value = fields.get(spec.name).unwrap_or(&Value::Null);
            spec.check(value)
                .map_err(|violation| RecordError::validation(spec.name, violation))?;
        }
        Ok(())
    }

    /// Foreign keys set on a record: `(field, target resource, id)`.
    pub fn references<'a>(
        &'a self,
        fields: &'a Fields,
    ) -> impl Iterator<Item = (&'static str, &'static str, RecordId)> + 'a {
        self.fields.iter().filter_map(move |spec| match spec.kind {
            FieldKind::Reference { resource, .. } => fields
                .get(spec.name)
                .and_then(Value::as_i64)
                .map(|id| (spec.name, resource, id)),
            _ => None,
        })
    }

    /// Reference fields of this schema pointing at `resource`, with their delete rule.
    pub fn referrers<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Iterator<Item = (&'static str, OnDelete)> + 'a {
        self.fields.iter().filter_map(move |spec| match spec.kind {
            FieldKind::Reference { resource: target, on_delete } if target == resource => {
                Some((spec.name, on_delete))
            }
            _ => None,
        })
    }
}

fn relation_ids(value: &Value) -> Option<BTreeSet<RecordId>> {
    value
        .as_array()?
        .iter()
        .map(Value::as_i64)
        .collect::<Option<BTreeSet<_>>>()
}
