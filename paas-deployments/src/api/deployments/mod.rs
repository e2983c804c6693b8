mod actions;

use crate::{
    api::{pagination::ListLink, respond, ApiState},
    storage,
};
use anyhow::{Context, Result};
use dropshot::{endpoint, Body, HttpError, Path, Query, RequestContext, UntypedBody};
use http::Response;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};
use strum::{Display, EnumString};

pub use actions::*;

const DEFAULT_BRANCH: &str = "master";

/// What caused a deployment to be created.
#[derive(
    Debug, Clone, Display, Default, PartialEq, EnumString, Eq, Serialize, Deserialize, JsonSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[schemars(rename = "deployment_trigger")]
pub enum Trigger {
    /// Requested by a person.
    #[default]
    Manual,

    /// A push to the tracked branch.
    Branch,

    /// A release being cut.
    Release,
}

/// A deployment ties a source repository to the organization and space it is deployed into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Unique identifier for the deployment.
    pub guid: String,

    /// Location of the source repository.
    pub repository: String,

    /// Branch of the repository that is deployed.
    pub branch: String,

    /// What causes new deployments.
    pub trigger: Trigger,

    /// Unique identifier of the owning organization.
    #[serde(rename = "organizationGUID")]
    pub organization_guid: String,

    /// Unique identifier of the space deployed into.
    #[serde(rename = "spaceGUID")]
    pub space_guid: String,

    /// Time of creation in epoch milliseconds.
    pub created_at: u64,

    /// Time of last modification in epoch milliseconds.
    pub updated_at: u64,

    /// Time of deletion in epoch milliseconds. Always empty for deployments that can still be retrieved.
    pub deleted_at: Option<u64>,
}

impl TryFrom<storage::deployments::Deployment> for Deployment {
    type Error = anyhow::Error;

    fn try_from(value: storage::deployments::Deployment) -> Result<Self> {
        let trigger = Trigger::from_str(&value.trigger).with_context(|| {
            format!(
                "Could not parse field 'trigger' from storage value '{}'",
                value.trigger
            )
        })?;

        let created_at = value.created_at.try_into().with_context(|| {
            format!(
                "Could not parse field 'created_at' from storage value '{}'",
                value.created_at
            )
        })?;

        let updated_at = value.updated_at.try_into().with_context(|| {
            format!(
                "Could not parse field 'updated_at' from storage value '{}'",
                value.updated_at
            )
        })?;

        let deleted_at = value
            .deleted_at
            .map(u64::try_from)
            .transpose()
            .with_context(|| {
                format!(
                    "Could not parse field 'deleted_at' from storage value '{:?}'",
                    value.deleted_at
                )
            })?;

        Ok(Deployment {
            guid: value.guid,
            repository: value.repository,
            branch: value.branch,
            trigger,
            organization_guid: value.organization_guid,
            space_guid: value.space_guid,
            created_at,
            updated_at,
            deleted_at,
        })
    }
}

/// Body accepted by create and update. Every field is optional at the wire level; missing values are filled
/// in with defaults and then validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentRequest {
    /// Location of the source repository. Required.
    pub repository: Option<String>,

    /// Branch to deploy. Defaults to 'master'.
    pub branch: Option<String>,

    /// One of 'manual', 'branch' or 'release'. Defaults to 'manual'.
    pub trigger: Option<String>,

    /// Unique identifier of the owning organization. Required.
    #[serde(rename = "organizationGUID")]
    pub organization_guid: Option<String>,

    /// Unique identifier of the space deployed into. Required.
    #[serde(rename = "spaceGUID")]
    pub space_guid: Option<String>,
}

impl From<DeploymentRequest> for storage::deployments::Payload {
    fn from(value: DeploymentRequest) -> Self {
        Self {
            repository: value.repository.unwrap_or_default(),
            branch: value
                .branch
                .filter(|branch| !branch.is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.into()),
            trigger: value
                .trigger
                .filter(|trigger| !trigger.is_empty())
                .unwrap_or_else(|| Trigger::default().to_string()),
            organization_guid: value.organization_guid.unwrap_or_default(),
            space_guid: value.space_guid.unwrap_or_default(),
        }
    }
}

/// An absent or blank body is read as an empty object so it reaches validation like any other incomplete
/// payload.
pub fn request_from_body(body: &[u8]) -> Result<DeploymentRequest, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeploymentRequest::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        HttpError::for_bad_request(None, format!("Could not parse request body; {e}"))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentPathArgs {
    /// The unique identifier for the target deployment.
    pub deployment_guid: String,
}

/// Page and limit are taken as raw strings so that malformed values fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ListDeploymentsQueryArgs {
    /// Page to return, starting at 1. Defaults to 1.
    pub page: Option<String>,

    /// Maximum amount of deployments per page. Defaults to 10.
    pub limit: Option<String>,

    /// Only return deployments belonging to this organization.
    pub organization: Option<String>,

    /// Only return deployments deployed into this space.
    pub space: Option<String>,
}

/// List all deployments.
///
/// Answers with 404 alongside the pagination metadata when the requested page holds no deployments.
#[endpoint(
    method = GET,
    path = "/deployments",
    tags = ["Deployments"],
)]
pub async fn list_deployments(
    rqctx: RequestContext<Arc<ApiState>>,
    query_params: Query<ListDeploymentsQueryArgs>,
) -> Result<Response<Body>, HttpError> {
    let api_state = rqctx.context();
    let query = query_params.into_inner();
    let uri = rqctx.request.uri();
    let link = ListLink::new(uri.path(), uri.query());

    respond(list(&api_state.storage, &query, &link).await)
}

/// Get deployment by guid.
#[endpoint(
    method = GET,
    path = "/deployments/{deployment_guid}",
    tags = ["Deployments"],
)]
pub async fn get_deployment(
    rqctx: RequestContext<Arc<ApiState>>,
    path_params: Path<DeploymentPathArgs>,
) -> Result<Response<Body>, HttpError> {
    let api_state = rqctx.context();
    let path = path_params.into_inner();

    respond(get(&api_state.storage, &path.deployment_guid).await)
}

/// Create a new deployment.
#[endpoint(
    method = POST,
    path = "/deployments",
    tags = ["Deployments"],
)]
pub async fn create_deployment(
    rqctx: RequestContext<Arc<ApiState>>,
    body: UntypedBody,
) -> Result<Response<Body>, HttpError> {
    let api_state = rqctx.context();
    let body = request_from_body(body.as_bytes())?;

    respond(create(&api_state.storage, body).await)
}

/// Replace every field of an existing deployment.
#[endpoint(
    method = PUT,
    path = "/deployments/{deployment_guid}",
    tags = ["Deployments"],
)]
pub async fn update_deployment(
    rqctx: RequestContext<Arc<ApiState>>,
    path_params: Path<DeploymentPathArgs>,
    body: UntypedBody,
) -> Result<Response<Body>, HttpError> {
    let api_state = rqctx.context();
    let path = path_params.into_inner();
    let body = request_from_body(body.as_bytes())?;

    respond(update(&api_state.storage, &path.deployment_guid, body).await)
}

/// Delete deployment by guid.
///
/// Deployments are only marked as deleted and stay in storage.
#[endpoint(
    method = DELETE,
    path = "/deployments/{deployment_guid}",
    tags = ["Deployments"],
)]
pub async fn delete_deployment(
    rqctx: RequestContext<Arc<ApiState>>,
    path_params: Path<DeploymentPathArgs>,
) -> Result<Response<Body>, HttpError> {
    let api_state = rqctx.context();
    let path = path_params.into_inner();

    respond(delete(&api_state.storage, &path.deployment_guid).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::TestServer;
    use pretty_assertions::assert_eq;

    const ORGANIZATION_A: &str = "aa000a0a-a000-000a-aa00-a0a00a0a0a00";
    const ORGANIZATION_B: &str = "bb111b1b-b111-111b-bb11-b1b11b1b1b11";

    fn request(organization_guid: &str) -> DeploymentRequest {
        DeploymentRequest {
            repository: Some("https://example.com/".into()),
            branch: None,
            trigger: None,
            organization_guid: Some(organization_guid.into()),
            space_guid: Some(organization_guid.into()),
        }
    }

    fn error_fields(body: &serde_json::Value) -> Vec<String> {
        body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|error| error["field"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn blank_body_is_an_empty_request() {
        assert_eq!(request_from_body(b"").unwrap(), DeploymentRequest::default());
        assert_eq!(
            request_from_body(b" \n").unwrap(),
            DeploymentRequest::default()
        );
        assert_eq!(
            request_from_body(br#"{"branch":"develop"}"#).unwrap().branch,
            Some("develop".into())
        );
    }

    #[test]
    fn malformed_body_is_a_bad_request() {
        assert!(request_from_body(b"{not json").is_err());
        assert!(request_from_body(br#"{"repository":123}"#).is_err());
    }

    #[tokio::test]
    async fn list_endpoint_links_from_request_uri() {
        let server = TestServer::new().await;
        for organization_guid in [ORGANIZATION_A, ORGANIZATION_A, ORGANIZATION_A, ORGANIZATION_B] {
            create(&server.harness, request(organization_guid))
                .await
                .unwrap();
        }

        let response = reqwest::get(format!(
            "{}/deployments?limit=1&organization={ORGANIZATION_A}&page=2",
            server.url
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(
            body["pagination"],
            serde_json::json!({
                "current": 2,
                "limit": 1,
                "next": format!("/deployments?limit=1&organization={ORGANIZATION_A}&page=3"),
                "pages": 3,
                "previous": format!("/deployments?limit=1&organization={ORGANIZATION_A}"),
                "results": 3,
            })
        );
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["organizationGUID"], ORGANIZATION_A);

        server.close().await;
    }

    #[tokio::test]
    async fn empty_bodies_reach_validation() {
        let server = TestServer::new().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/deployments", server.url))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Invalid payload provided");
        assert_eq!(
            error_fields(&body),
            vec!["repository", "organizationGUID", "spaceGUID"]
        );

        let response = client
            .put(format!("{}/deployments/{ORGANIZATION_A}", server.url))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

        let response = client
            .post(format!("{}/deployments", server.url))
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        server.close().await;
    }

    #[tokio::test]
    async fn create_over_http_responds_accepted() {
        let server = TestServer::new().await;

        let response = reqwest::Client::new()
            .post(format!("{}/deployments", server.url))
            .json(&request(ORGANIZATION_A))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["repository"], "https://example.com/");
        assert_eq!(body["trigger"], "manual");
        assert_eq!(body["branch"], "master");

        server.close().await;
    }

    #[test]
    fn request_defaults_branch_and_trigger() {
        let payload: storage::deployments::Payload = DeploymentRequest {
            repository: Some("https://example.com/".into()),
            branch: None,
            trigger: Some(String::new()),
            organization_guid: Some("aa000a0a-a000-000a-aa00-a0a00a0a0a00".into()),
            space_guid: None,
        }
        .into();

        assert_eq!(
            payload,
            storage::deployments::Payload {
                repository: "https://example.com/".into(),
                branch: "master".into(),
                trigger: "manual".into(),
                organization_guid: "aa000a0a-a000-000a-aa00-a0a00a0a0a00".into(),
                space_guid: String::new(),
            }
        );
    }

    #[test]
    fn request_reads_wire_field_names() {
        let request: DeploymentRequest = serde_json::from_str(
            r#"{"repository":"https://example.com/","trigger":"branch","organizationGUID":"org","spaceGUID":"space"}"#,
        )
        .unwrap();

        assert_eq!(request.organization_guid.as_deref(), Some("org"));
        assert_eq!(request.space_guid.as_deref(), Some("space"));
        assert_eq!(request.branch, None);
    }

    #[test]
    fn deployment_serializes_wire_field_names() {
        let deployment = Deployment::try_from(storage::deployments::Deployment {
            guid: "aa000a0a-a000-000a-aa00-a0a00a0a0a00".into(),
            repository: "https://example.com/".into(),
            branch: "master".into(),
            trigger: "release".into(),
            organization_guid: "org".into(),
            space_guid: "space".into(),
            created_at: 1,
            updated_at: 2,
            deleted_at: None,
        })
        .unwrap();

        let serialized = serde_json::to_value(&deployment).unwrap();

        assert_eq!(
            serialized,
            serde_json::json!({
                "guid": "aa000a0a-a000-000a-aa00-a0a00a0a0a00",
                "repository": "https://example.com/",
                "branch": "master",
                "trigger": "release",
                "organizationGUID": "org",
                "spaceGUID": "space",
                "createdAt": 1,
                "updatedAt": 2,
                "deletedAt": null,
            })
        );
    }

    #[test]
    fn deployment_rejects_unknown_stored_trigger() {
        let err = Deployment::try_from(storage::deployments::Deployment {
            trigger: "nightly".into(),
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.to_string().contains("trigger"));
    }
}
