//! CRUD handlers shared by every resource.

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::extractors::{Localizer, WriteAccess};
use crate::api::pagination::{neighbours, parse_list_request, Page};
use crate::api::AppState;
use crate::error::{ApiError, Violation};
use crate::facilities::{find_resource, Resource, SCHEMAS};
use crate::query::BUILTIN_COLUMNS;
use crate::upsert::{Fields, Record, RecordId};

type ApiResult<T> = Result<T, ApiError>;

fn resource(name: &str, localizer: &Localizer) -> ApiResult<&'static Resource> {
    find_resource(name).ok_or_else(|| localizer.not_found_generic())
}

/// Parse a path id; anything that is not an integer cannot name a record.
fn record_id(raw: &str, localizer: &Localizer) -> ApiResult<RecordId> {
    raw.parse::<RecordId>()
        .map_err(|_| localizer.not_found_generic())
}

/// Decode a write body into proposed fields, dropping read-only keys.
fn proposed_fields(body: &Bytes, localizer: &Localizer) -> ApiResult<Fields> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| localizer.bad_request("INVALID_JSON", &[e.to_string().into()], None))?;

    let Value::Object(mut fields) = value else {
        return Err(localizer.bad_request("EXPECTED_OBJECT", &[], None));
    };

    for column in BUILTIN_COLUMNS {
        fields.remove(*column);
    }
    Ok(fields)
}

async fn load(
    state: &AppState,
    resource: &Resource,
    id: RecordId,
    localizer: &Localizer,
) -> ApiResult<Record> {
    state
        .engine
        .store()
        .get(&resource.schema, id)
        .await
        .map_err(|err| localizer.record_error(resource, err))?
        .ok_or_else(|| localizer.not_found(resource.event, &[id.into()]))
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "hcore-api"
    }))
}

pub async fn list_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    localizer: Localizer,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Page>> {
    let resource = resource(&name, &localizer)?;
    let request = parse_list_request(resource, &params, &state.config, &localizer)?;

    let listing = state
        .engine
        .store()
        .list(&resource.schema, &request.query)
        .await
        .map_err(|err| localizer.record_error(resource, err))?;

    // The first page of an empty listing is valid; any later page must have rows
    if request.page > 1 && listing.records.is_empty() {
        return Err(localizer.invalid_page());
    }

    let (next, previous) = neighbours(&request, listing.count, &uri, &headers, &params);
    Ok(Json(Page {
        count: listing.count,
        next,
        previous,
        results: listing
            .records
            .iter()
            .map(|record| record.to_json(&resource.schema))
            .collect(),
    }))
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(name): Path<String>,
    localizer: Localizer,
    _access: WriteAccess,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let resource = resource(&name, &localizer)?;
    let proposed = proposed_fields(&body, &localizer)?;

    let record = state
        .engine
        .create(&resource.schema, proposed)
        .await
        .map_err(|err| localizer.record_error(resource, err))?;
    info!(resource = resource.name(), id = ?record.id, slug = %record.slug, "Created record");

    Ok((StatusCode::CREATED, Json(record.to_json(&resource.schema))))
}

pub async fn retrieve_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    localizer: Localizer,
) -> ApiResult<Json<Value>> {
    let resource = resource(&name, &localizer)?;
    let id = record_id(&id, &localizer)?;

    let record = load(&state, resource, id, &localizer).await?;
    Ok(Json(record.to_json(&resource.schema)))
}

async fn update(
    state: &AppState,
    name: &str,
    id: &str,
    localizer: &Localizer,
    body: &Bytes,
    partial: bool,
) -> ApiResult<Json<Value>> {
    let resource = resource(name, localizer)?;
    let id = record_id(id, localizer)?;
    let existing = load(state, resource, id, localizer).await?;
    let proposed = proposed_fields(body, localizer)?;

    if !partial {
        if let Some(field) = resource.schema.missing_required(&proposed) {
            let violation = Violation::Required;
            return Err(localizer.bad_request(violation.code(), &violation.args(field), Some(field)));
        }
    }

    let record = state
        .engine
        .update(&resource.schema, existing, proposed)
        .await
        .map_err(|err| localizer.record_error(resource, err))?;
    info!(resource = resource.name(), id, partial, "Updated record");

    Ok(Json(record.to_json(&resource.schema)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    localizer: Localizer,
    _access: WriteAccess,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    update(&state, &name, &id, &localizer, &body, false).await
}

pub async fn partial_update_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    localizer: Localizer,
    _access: WriteAccess,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    update(&state, &name, &id, &localizer, &body, true).await
}

pub async fn destroy_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    localizer: Localizer,
    _access: WriteAccess,
) -> ApiResult<StatusCode> {
    let resource = resource(&name, &localizer)?;
    let id = record_id(&id, &localizer)?;

    let deleted = state
        .engine
        .store()
        .delete(&resource.schema, id, SCHEMAS)
        .await
        .map_err(|err| localizer.record_error(resource, err))?;
    if !deleted {
        return Err(localizer.not_found(resource.event, &[id.into()]));
    }

    info!(resource = resource.name(), id, "Deleted record");
    Ok(StatusCode::NO_CONTENT)
}
