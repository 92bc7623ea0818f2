//! Medical facility resources: record schemas and their list behavior.
//!
//! Each `Resource` ties a schema to its URL segment, message event and the
//! fields clients may search, filter and order by.

use serde_json::Value;

use crate::upsert::{FieldKind, FieldSpec, OnDelete, RecordSchema, SearchField};

/// A record schema exposed over HTTP.
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    pub schema: RecordSchema,
    /// Message event for resource-specific text such as not-found errors.
    pub event: &'static str,
    pub search_fields: &'static [SearchField],
    pub filter_fields: &'static [&'static str],
    pub ordering_fields: &'static [&'static str],
    /// Ordering applied when the request names none (`-` prefix for descending).
    pub default_ordering: &'static [&'static str],
}

impl Resource {
    /// URL segment and store key
    pub fn name(&self) -> &'static str {
        self.schema.resource
    }
}

fn active() -> Value {
    Value::Bool(true)
}

// ==================== Schemas ====================

/// High-level classification, e.g. hospital or clinic.
pub const FACILITY_TYPE: RecordSchema = RecordSchema {
    resource: "facility_type",
    fields: &[FieldSpec::text("title", 255).required()],
    relations: &[],
    slug_fields: &["title"],
    unique_slug: true,
};

/// Specialty, e.g. psychiatric hospital.
pub const FACILITY_SUBTYPE: RecordSchema = RecordSchema {
    resource: "facility_subtype",
    fields: &[FieldSpec::text("title", 255).required()],
    relations: &[],
    slug_fields: &["title"],
    unique_slug: true,
};

/// Governance or funding model, e.g. public or charity-based.
pub const OWNERSHIP_TYPE: RecordSchema = RecordSchema {
    resource: "ownership_type",
    fields: &[FieldSpec::text("title", 255).required()],
    relations: &[],
    slug_fields: &["title"],
    unique_slug: true,
};

pub const MEDICAL_FACILITY: RecordSchema = RecordSchema {
    resource: "medical_facility",
    fields: &[
        FieldSpec::text("name", 255).required(),
        FieldSpec::reference("type", "facility_type", OnDelete::Cascade).required(),
        FieldSpec::reference("subtype", "facility_subtype", OnDelete::SetNull),
        FieldSpec::reference("ownership", "ownership_type", OnDelete::SetNull),
        FieldSpec::new("history", FieldKind::Html),
        FieldSpec::new("presentation", FieldKind::Html),
        FieldSpec::new("legal_charters", FieldKind::Html),
        FieldSpec::text("city", 100).required(),
        FieldSpec::text("province", 100).required(),
        FieldSpec::text("postal_code", 20),
        FieldSpec::text("phone_number", 20),
        FieldSpec::new("email", FieldKind::Email),
        FieldSpec::new("website", FieldKind::Url),
        // Stored media path; uploads are handled outside this service
        FieldSpec::text("logo", 255),
        FieldSpec::new("is_active", FieldKind::Boolean).with_default(active),
    ],
    relations: &[],
    slug_fields: &["name", "city"],
    unique_slug: false,
};

/// Every schema, for applying delete rules across resources.
pub const SCHEMAS: &[RecordSchema] = &[MEDICAL_FACILITY, FACILITY_TYPE, FACILITY_SUBTYPE, OWNERSHIP_TYPE];

// ==================== Resources ====================

const TITLE_SEARCH: &[SearchField] = &[SearchField::Own("title")];

const TITLED_ORDERING: &[&str] = &["id", "slug", "title", "created_at", "updated_at"];

pub const RESOURCES: &[Resource] = &[
    Resource {
        schema: MEDICAL_FACILITY,
        event: "FACILITY",
        search_fields: &[
            SearchField::Own("name"),
            SearchField::Related {
                reference: "type",
                resource: "facility_type",
                field: "title",
            },
            SearchField::Related {
                reference: "subtype",
                resource: "facility_subtype",
                field: "title",
            },
            SearchField::Related {
                reference: "ownership",
                resource: "ownership_type",
                field: "title",
            },
            SearchField::Own("city"),
            SearchField::Own("province"),
        ],
        filter_fields: &["type", "subtype", "ownership", "city", "province", "is_active"],
        ordering_fields: &[
            "id",
            "slug",
            "name",
            "city",
            "province",
            "created_at",
            "updated_at",
        ],
        default_ordering: &["slug", "name", "city", "province"],
    },
    Resource {
        schema: FACILITY_TYPE,
        event: "FACILITY_TYPE",
        search_fields: TITLE_SEARCH,
        filter_fields: &["slug"],
        ordering_fields: TITLED_ORDERING,
        default_ordering: &["title"],
    },
    Resource {
        schema: FACILITY_SUBTYPE,
        event: "FACILITY_SUBTYPE",
        search_fields: TITLE_SEARCH,
        filter_fields: &["slug"],
        ordering_fields: TITLED_ORDERING,
        default_ordering: &["title"],
    },
    Resource {
        schema: OWNERSHIP_TYPE,
        event: "OWNERSHIP_TYPE",
        search_fields: TITLE_SEARCH,
        filter_fields: &["slug"],
        ordering_fields: TITLED_ORDERING,
        default_ordering: &["title"],
    },
];

/// Look up a resource by its URL segment.
pub fn find_resource(name: &str) -> Option<&'static Resource> {
    RESOURCES.iter().find(|resource| resource.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{catalog, MessageRegistry};
    use crate::query::BUILTIN_COLUMNS;

    fn declares(schema: &RecordSchema, field: &str) -> bool {
        BUILTIN_COLUMNS.contains(&field) || schema.field(field).is_some()
    }

    #[test]
    fn test_find_resource() {
        assert_eq!(find_resource("medical_facility").map(|r| r.event), Some("FACILITY"));
        assert!(find_resource("patients").is_none());
    }

    #[test]
    fn test_resource_fields_are_declared() {
        for resource in RESOURCES {
            let schema = &resource.schema;
            let ordering = resource
                .default_ordering
                .iter()
                .map(|term| term.trim_start_matches('-'));

            for field in resource
                .filter_fields
                .iter()
                .chain(resource.ordering_fields)
                .copied()
                .chain(ordering)
            {
                assert!(declares(schema, field), "{} has no field {}", resource.name(), field);
            }
            for field in schema.slug_fields {
                assert!(schema.field(field).is_some(), "{} slug source {}", resource.name(), field);
            }
        }
    }

    #[test]
    fn test_search_fields_are_declared() {
        for resource in RESOURCES {
            let schema = &resource.schema;
            for search_field in resource.search_fields {
                match *search_field {
                    SearchField::Own(field) => {
                        assert!(schema.field(field).is_some(), "{} search {}", resource.name(), field)
                    }
                    SearchField::Related {
                        reference,
                        resource: target,
                        field,
                    } => {
                        let kind = schema.field(reference).map(|spec| spec.kind);
                        assert!(
                            matches!(kind, Some(FieldKind::Reference { resource: points_at, .. }) if points_at == target),
                            "{} search through {}",
                            resource.name(),
                            reference
                        );
                        let related = find_resource(target).unwrap();
                        assert!(related.schema.field(field).is_some(), "{} has no {}", target, field);
                    }
                }
            }
        }
    }

    #[test]
    fn test_schemas_cover_resources() {
        assert_eq!(SCHEMAS.len(), RESOURCES.len());
        for resource in RESOURCES {
            assert!(SCHEMAS.iter().any(|schema| schema.resource == resource.name()));
        }
    }

    #[test]
    fn test_set_null_references_are_optional() {
        for schema in SCHEMAS {
            for spec in schema.fields {
                if let FieldKind::Reference { on_delete: OnDelete::SetNull, .. } = spec.kind {
                    assert!(!spec.required, "{}.{} cannot be nulled", schema.resource, spec.name);
                }
            }
        }
    }

    #[test]
    fn test_default_ordering_is_orderable() {
        for resource in RESOURCES {
            for term in resource.default_ordering {
                let field = term.trim_start_matches('-');
                assert!(resource.ordering_fields.contains(&field), "{}", field);
            }
        }
    }

    #[test]
    fn test_every_resource_has_not_found_message() {
        let registry = MessageRegistry::new("fa");
        catalog::install(&registry);

        for resource in RESOURCES {
            for language in catalog::LANGUAGES {
                registry
                    .resolve_in(language, resource.event, "NOT_FOUND", &[1i64.into()])
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_references_point_at_resources() {
        for spec in MEDICAL_FACILITY.fields {
            if let FieldKind::Reference { resource, .. } = spec.kind {
                assert!(find_resource(resource).is_some(), "Dangling reference {}", spec.name);
            }
        }
    }

    #[test]
    fn test_facility_defaults_to_active() {
        let mut fields = crate::upsert::Fields::new();
        MEDICAL_FACILITY.apply_defaults(&mut fields);
        assert_eq!(fields.get("is_active"), Some(&Value::Bool(true)));
    }
}
