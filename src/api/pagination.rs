//! Page-number pagination and list query parameters.
//!
//! `?page=2&page_size=20&search=tehran&ordering=-name&city=Tehran`

use axum::http::{header, HeaderMap, Uri};
use serde::Serialize;
use serde_json::Value;

use crate::api::extractors::Localizer;
use crate::config::Config;
use crate::error::ApiError;
use crate::facilities::Resource;
use crate::query::{ListQuery, OrderKey};
use crate::upsert::FieldKind;

/// Query keys with a fixed meaning; every other key is a filter candidate.
const RESERVED_PARAMS: &[&str] = &["page", "page_size", "search", "ordering", "lang"];

/// Response body of a list request.
#[derive(Debug, Serialize)]
pub struct Page {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Value>,
}

/// Parsed list request: the page number and the store query for that page.
#[derive(Debug)]
pub struct ListRequest {
    pub page: u64,
    pub page_size: u64,
    pub query: ListQuery,
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Build the store query for a list request.
///
/// Unknown query keys are ignored. Empty filter values are skipped.
///
/// # Errors
/// * 404 - `page` is not a positive integer
/// * 400 - an ordering term names an undeclared field, or a filter value
///   does not parse as the field's type
pub fn parse_list_request(
    resource: &Resource,
    params: &[(String, String)],
    config: &Config,
    localizer: &Localizer,
) -> Result<ListRequest, ApiError> {
    let page = match param(params, "page") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|page| *page > 0)
            .ok_or_else(|| localizer.invalid_page())?,
        None => 1,
    };

    // Malformed sizes fall back to the default
    let page_size = param(params, "page_size")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(config.page_size)
        .min(config.max_page_size);

    let ordering = match param(params, "ordering").map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_ordering(resource, raw, localizer)?,
        None => resource
            .default_ordering
            .iter()
            .map(|term| OrderKey::parse(term))
            .collect(),
    };

    let mut filters = Vec::new();
    for (field, raw) in params {
        if RESERVED_PARAMS.contains(&field.as_str()) || raw.is_empty() {
            continue;
        }
        if !resource.filter_fields.contains(&field.as_str()) {
            continue;
        }

        let value = filter_value(resource, field, raw).ok_or_else(|| {
            localizer.bad_request("INVALID_FILTER", &[field.as_str().into()], Some(field.as_str()))
        })?;
        filters.push((field.clone(), value));
    }

    Ok(ListRequest {
        page,
        page_size,
        query: ListQuery {
            filters,
            search: param(params, "search").map(str::to_string),
            search_fields: resource.search_fields.to_vec(),
            ordering,
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        },
    })
}

fn parse_ordering(resource: &Resource, raw: &str, localizer: &Localizer) -> Result<Vec<OrderKey>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let key = OrderKey::parse(term);
            if resource.ordering_fields.contains(&key.field.as_str()) {
                Ok(key)
            } else {
                Err(localizer.bad_request("INVALID_ORDERING", &[term.into()], None))
            }
        })
        .collect()
}

/// Normalize a filter value to the text form stored values are compared by.
fn filter_value(resource: &Resource, field: &str, raw: &str) -> Option<String> {
    let kind = match field {
        "id" => Some(FieldKind::Integer),
        _ => resource.schema.field(field).map(|spec| spec.kind),
    };

    match kind {
        Some(FieldKind::Boolean) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" => Some("true".to_string()),
            "false" | "0" => Some("false".to_string()),
            _ => None,
        },
        Some(FieldKind::Integer | FieldKind::Reference { .. }) => {
            raw.trim().parse::<i64>().ok().map(|id| id.to_string())
        }
        _ => Some(raw.to_string()),
    }
}

/// Absolute (when a `Host` header is present) link to another page of the same listing.
///
/// `page: None` drops the parameter, which is how the first page is linked.
pub fn page_link(uri: &Uri, headers: &HeaderMap, params: &[(String, String)], page: Option<u64>) -> String {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let mut link = match host {
        Some(host) => format!("http://{}{}", host, uri.path()),
        None => uri.path().to_string(),
    };

    let page_param = page.map(|page| ("page".to_string(), page.to_string()));
    let pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| key != "page")
        .chain(page_param.as_ref())
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect();

    if !pairs.is_empty() {
        link.push('?');
        link.push_str(&pairs.join("&"));
    }
    link
}

/// Links around `page`, given the total match count.
pub fn neighbours(
    request: &ListRequest,
    count: u64,
    uri: &Uri,
    headers: &HeaderMap,
    params: &[(String, String)],
) -> (Option<String>, Option<String>) {
    let next = (request.page.saturating_mul(request.page_size) < count)
        .then(|| page_link(uri, headers, params, Some(request.page + 1)));

    let previous = match request.page {
        1 => None,
        2 => Some(page_link(uri, headers, params, None)),
        page => Some(page_link(uri, headers, params, Some(page - 1))),
    };

    (next, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facilities::find_resource;
    use crate::i18n::{catalog, MessageRegistry};
    use crate::upsert::SearchField;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn localizer() -> Localizer {
        let registry = MessageRegistry::new("en");
        catalog::install(&registry);
        Localizer::new(Arc::new(registry), "en")
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse(pairs: &[(&str, &str)]) -> Result<ListRequest, ApiError> {
        let resource = find_resource("medical_facility").unwrap();
        parse_list_request(resource, &params(pairs), &Config::default(), &localizer())
    }

    #[test]
    fn test_defaults() {
        let request = parse(&[]).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.query.limit, 10);
        assert_eq!(request.query.offset, 0);
        assert_eq!(request.query.search_fields.first(), Some(&SearchField::Own("name")));
        assert!(request.query.search_fields.contains(&SearchField::Related {
            reference: "type",
            resource: "facility_type",
            field: "title",
        }));
        let fields: Vec<_> = request.query.ordering.iter().map(|k| k.field.as_str()).collect();
        assert_eq!(fields, vec!["slug", "name", "city", "province"]);
    }

    #[test]
    fn test_page_size_is_capped_and_offset_follows_page() {
        let request = parse(&[("page", "3"), ("page_size", "500")]).unwrap();
        assert_eq!(request.query.limit, 100);
        assert_eq!(request.query.offset, 200);

        let request = parse(&[("page_size", "abc")]).unwrap();
        assert_eq!(request.query.limit, 10);
    }

    #[test]
    fn test_invalid_page_is_not_found() {
        assert!(matches!(parse(&[("page", "0")]), Err(ApiError::NotFound(_))));
        assert!(matches!(parse(&[("page", "two")]), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_ordering_is_restricted() {
        let request = parse(&[("ordering", "-city, name")]).unwrap();
        assert_eq!(request.query.ordering[0], OrderKey::parse("-city"));
        assert_eq!(request.query.ordering[1], OrderKey::parse("name"));

        let err = parse(&[("ordering", "email")]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { detail, .. } if detail == "Invalid ordering field: email"));
    }

    #[test]
    fn test_filters_are_normalized() {
        let request = parse(&[
            ("is_active", "False"),
            ("type", " 3 "),
            ("city", "Tehran"),
            ("province", ""),
            ("email", "ignored@example.com"),
            ("lang", "en"),
        ])
        .unwrap();

        assert_eq!(
            request.query.filters,
            vec![
                ("is_active".to_string(), "false".to_string()),
                ("type".to_string(), "3".to_string()),
                ("city".to_string(), "Tehran".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_filter_is_rejected() {
        let err = parse(&[("type", "hospital")]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { field, .. } if field.as_deref() == Some("type")));
    }

    #[test]
    fn test_page_links() {
        let uri: Uri = "/medical_facility/?search=central%20hospital&page=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("api.example.com"));
        let params = params(&[("search", "central hospital"), ("page", "2")]);

        assert_eq!(
            page_link(&uri, &headers, &params, Some(3)),
            "http://api.example.com/medical_facility/?search=central%20hospital&page=3"
        );
        assert_eq!(
            page_link(&uri, &HeaderMap::new(), &params, None),
            "/medical_facility/?search=central%20hospital"
        );
    }

    #[test]
    fn test_neighbours() {
        let uri: Uri = "/facility_type/".parse().unwrap();
        let headers = HeaderMap::new();
        let request = |page| ListRequest {
            page,
            page_size: 10,
            query: ListQuery::default(),
        };

        assert_eq!(neighbours(&request(1), 5, &uri, &headers, &[]), (None, None));
        assert_eq!(
            neighbours(&request(1), 25, &uri, &headers, &[]),
            (Some("/facility_type/?page=2".to_string()), None)
        );
        assert_eq!(
            neighbours(&request(2), 25, &uri, &headers, &[]),
            (
                Some("/facility_type/?page=3".to_string()),
                Some("/facility_type/".to_string())
            )
        );
        assert_eq!(
            neighbours(&request(3), 25, &uri, &headers, &[]),
            (None, Some("/facility_type/?page=2".to_string()))
        );
    }
}
