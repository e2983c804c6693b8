use crate::api::{respond, ActionError, ActionResponse, ApiState};
use dropshot::{endpoint, Body, HttpError, RequestContext};
use http::{Response, StatusCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HealthcheckResponse {
    pub status: String,
}

pub fn status() -> ActionResponse<HealthcheckResponse> {
    ActionResponse::new(
        StatusCode::OK,
        HealthcheckResponse {
            status: "OK".into(),
        },
    )
}

/// Liveness check. Does not touch storage.
#[endpoint(
    method = GET,
    path = "/healthcheck",
    tags = ["System"],
)]
pub async fn get_healthcheck(
    _rqctx: RequestContext<Arc<ApiState>>,
) -> Result<Response<Body>, HttpError> {
    respond(Ok::<_, ActionError>(status()))
}
