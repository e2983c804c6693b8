//! The deployment actions. Each one takes the storage handle and already parsed request input explicitly and
//! returns the status and body to answer with; the endpoints only translate to and from http.

use super::{Deployment, DeploymentRequest, ListDeploymentsQueryArgs};
use crate::{
    api::{
        pagination::{generate_metadata, ListLink, PageCounts, PaginatedData},
        validate::validate_deployment,
        ActionError, ActionResponse,
    },
    storage::{self, StorageError},
};
use http::StatusCode;
use tracing::debug;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;

const NOT_FOUND_MESSAGE: &str = "Deployment not found";
const INVALID_PAYLOAD_MESSAGE: &str = "Invalid payload provided";

/// Reads the leading integer of a query value: leading whitespace and an optional sign, then every digit up to
/// the first non digit. `"2.5"` is 2 and `"3abc"` is 3.
fn leading_integer(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (sign, rest) = match value.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, value.strip_prefix('+').unwrap_or(value)),
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();

    rest[..digits].parse::<i64>().ok().map(|parsed| sign * parsed)
}

/// Anything that does not start with a positive integer yields the default.
pub fn from_query_or_default(value: Option<&str>, default: u64) -> u64 {
    value
        .and_then(leading_integer)
        .and_then(|parsed| u64::try_from(parsed).ok())
        .filter(|parsed| *parsed > 0)
        .unwrap_or(default)
}

fn not_found(err: StorageError) -> ActionError {
    match err {
        StorageError::NotFound => ActionError::NotFound(NOT_FOUND_MESSAGE.into()),
        _ => ActionError::Storage(err),
    }
}

fn valid_payload(request: DeploymentRequest) -> Result<storage::deployments::Payload, ActionError> {
    let payload = storage::deployments::Payload::from(request);

    let errors = validate_deployment(&payload);
    if !errors.is_empty() {
        return Err(ActionError::Validation {
            message: INVALID_PAYLOAD_MESSAGE.into(),
            errors,
        });
    }

    Ok(payload)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|value| !value.is_empty())
}

/// Lists a page of deployments. A page with no deployments answers 404 but still carries the pagination
/// metadata so clients can find their way back.
pub async fn list(
    db: &storage::Db,
    query: &ListDeploymentsQueryArgs,
    link: &ListLink,
) -> Result<ActionResponse<PaginatedData<Deployment>>, ActionError> {
    let current = from_query_or_default(query.page.as_deref(), DEFAULT_PAGE);
    let limit = from_query_or_default(query.limit.as_deref(), DEFAULT_LIMIT);
    let filter = storage::deployments::Filter {
        organization_guid: non_empty(&query.organization),
        space_guid: non_empty(&query.space),
    };

    // Each query acquires and releases its own connection so a request never holds one while waiting on another.
    let (results, storage_deployments) = tokio::try_join!(
        async {
            let mut conn = db.read_conn().await?;
            storage::deployments::count(&mut conn, &filter).await
        },
        async {
            let mut conn = db.read_conn().await?;
            storage::deployments::list(&mut conn, &filter, current, limit).await
        },
    )?;

    let pages = results.div_ceil(limit);

    let mut deployments: Vec<Deployment> = vec![];

    for storage_deployment in storage_deployments {
        deployments.push(Deployment::try_from(storage_deployment)?);
    }

    let status = if results > 0 && pages >= current {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    let pagination = generate_metadata(
        link,
        PageCounts {
            current,
            limit,
            pages,
            results,
        },
    );

    Ok(ActionResponse::new(
        status,
        PaginatedData {
            pagination,
            data: deployments,
        },
    ))
}

pub async fn get(db: &storage::Db, guid: &str) -> Result<ActionResponse<Deployment>, ActionError> {
    let mut conn = db.read_conn().await?;

    let storage_deployment = storage::deployments::get(&mut conn, guid)
        .await
        .map_err(not_found)?;

    Ok(ActionResponse::new(
        StatusCode::OK,
        Deployment::try_from(storage_deployment)?,
    ))
}

pub async fn create(
    db: &storage::Db,
    request: DeploymentRequest,
) -> Result<ActionResponse<Deployment>, ActionError> {
    let payload = valid_payload(request)?;

    let mut conn = db.write_conn().await?;

    let storage_deployment = storage::deployments::insert(&mut conn, &payload).await?;

    debug!(guid = %storage_deployment.guid, "Created deployment");

    Ok(ActionResponse::new(
        StatusCode::ACCEPTED,
        Deployment::try_from(storage_deployment)?,
    ))
}

/// Replaces every field of an existing deployment. The payload is validated before storage is touched.
pub async fn update(
    db: &storage::Db,
    guid: &str,
    request: DeploymentRequest,
) -> Result<ActionResponse<Deployment>, ActionError> {
    let payload = valid_payload(request)?;

    let mut conn = db.write_conn().await?;

    storage::deployments::get(&mut conn, guid)
        .await
        .map_err(not_found)?;

    // The update itself only matches active rows, so a delete landing between the lookup above and this
    // statement still surfaces as not found.
    let storage_deployment = storage::deployments::update(&mut conn, guid, &payload)
        .await
        .map_err(not_found)?;

    debug!(guid = %storage_deployment.guid, "Updated deployment");

    Ok(ActionResponse::new(
        StatusCode::OK,
        Deployment::try_from(storage_deployment)?,
    ))
}

pub async fn delete(db: &storage::Db, guid: &str) -> Result<ActionResponse<()>, ActionError> {
    let mut conn = db.write_conn().await?;

    let storage_deployment = storage::deployments::soft_delete(&mut conn, guid)
        .await
        .map_err(not_found)?;

    debug!(guid = %storage_deployment.guid, "Deleted deployment");

    Ok(ActionResponse::empty(StatusCode::NO_CONTENT))
}
