use crate::storage::{map_sqlx_error, StorageError, NOW_EPOCH_MILLI};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, QueryBuilder, Sqlite, SqliteConnection};

const COLUMNS: &str = "guid, repository, branch, \"trigger\", organization_guid, space_guid, created_at, \
updated_at, deleted_at";

#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct Deployment {
    pub guid: String,
    pub repository: String,
    pub branch: String,
    pub trigger: String,
    pub organization_guid: String,
    pub space_guid: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

/// The user controlled portion of a deployment. Inserts and updates always write every field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    pub repository: String,
    pub branch: String,
    pub trigger: String,
    pub organization_guid: String,
    pub space_guid: String,
}

/// Narrows list and count queries. A `None` dimension leaves the query unconstrained on it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    pub organization_guid: Option<String>,
    pub space_guid: Option<String>,
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    query.push(" WHERE deleted_at IS NULL");

    if let Some(organization_guid) = &filter.organization_guid {
        query.push(" AND organization_guid = ");
        query.push_bind(organization_guid.clone());
    }

    if let Some(space_guid) = &filter.space_guid {
        query.push(" AND space_guid = ");
        query.push_bind(space_guid.clone());
    }
}

pub async fn count(conn: &mut SqliteConnection, filter: &Filter) -> Result<u64, StorageError> {
    let mut count_query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(guid) FROM deployments");
    push_filter(&mut count_query, filter);
    count_query.push(";");

    let count_query = count_query.build_query_scalar::<i64>();

    let sql = count_query.sql();

    let total = count_query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await?;

    Ok(total.try_into().unwrap_or_default())
}

/// Returns a single page of active deployments in storage order. Pages start at 1.
pub async fn list(
    conn: &mut SqliteConnection,
    filter: &Filter,
    page: u64,
    limit: u64,
) -> Result<Vec<Deployment>, StorageError> {
    let offset = page.saturating_sub(1).saturating_mul(limit);

    let mut list_query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {COLUMNS} FROM deployments"));
    push_filter(&mut list_query, filter);
    list_query.push(" LIMIT ");
    list_query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    list_query.push(" OFFSET ");
    list_query.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
    list_query.push(";");

    let list_query = list_query.build_query_as::<Deployment>();

    let sql = list_query.sql();

    list_query
        .fetch_all(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get(conn: &mut SqliteConnection, guid: &str) -> Result<Deployment, StorageError> {
    let query_str =
        format!("SELECT {COLUMNS} FROM deployments WHERE guid = ? AND deleted_at IS NULL;");

    let query = sqlx::query_as::<_, Deployment>(&query_str).bind(guid);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

/// Stores a new deployment under a freshly generated guid and returns it as persisted.
pub async fn insert(
    conn: &mut SqliteConnection,
    payload: &Payload,
) -> Result<Deployment, StorageError> {
    let guid = uuid::Uuid::now_v7().to_string();

    let query_str = format!(
        "INSERT INTO deployments (guid, repository, branch, \"trigger\", organization_guid, space_guid) \
        VALUES (?, ?, ?, ?, ?, ?) RETURNING {COLUMNS};"
    );

    let query = sqlx::query_as::<_, Deployment>(&query_str)
        .bind(&guid)
        .bind(&payload.repository)
        .bind(&payload.branch)
        .bind(&payload.trigger)
        .bind(&payload.organization_guid)
        .bind(&payload.space_guid);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

/// Replaces every payload field of an active deployment. Returns [`StorageError::NotFound`] if the deployment
/// does not exist or has been deleted.
pub async fn update(
    conn: &mut SqliteConnection,
    guid: &str,
    payload: &Payload,
) -> Result<Deployment, StorageError> {
    let query_str = format!(
        "UPDATE deployments SET repository = ?, branch = ?, \"trigger\" = ?, organization_guid = ?, space_guid = ?, \
        updated_at = MAX(created_at, {NOW_EPOCH_MILLI}) WHERE guid = ? AND deleted_at IS NULL RETURNING {COLUMNS};"
    );

    let query = sqlx::query_as::<_, Deployment>(&query_str)
        .bind(&payload.repository)
        .bind(&payload.branch)
        .bind(&payload.trigger)
        .bind(&payload.organization_guid)
        .bind(&payload.space_guid)
        .bind(guid);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

/// Marks an active deployment as deleted. The row is kept but becomes invisible to every other query.
pub async fn soft_delete(
    conn: &mut SqliteConnection,
    guid: &str,
) -> Result<Deployment, StorageError> {
    let query_str = format!(
        "UPDATE deployments SET deleted_at = {NOW_EPOCH_MILLI} WHERE guid = ? AND deleted_at IS NULL \
        RETURNING {COLUMNS};"
    );

    let query = sqlx::query_as::<_, Deployment>(&query_str).bind(guid);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
