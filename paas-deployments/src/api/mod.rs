mod deployments;
mod healthcheck;
mod pagination;
mod validate;

use crate::{conf, storage};
use anyhow::{anyhow, Context, Result};
use dropshot::{
    ApiDescription, Body, ConfigDropshot, ConfigLogging, ConfigLoggingLevel, HttpError,
    HttpServer, ServerBuilder,
};
use http::{header::CONTENT_TYPE, Response, StatusCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info};

pub use validate::FieldError;

/// Prefix for the reference attached to every error response so log lines and client reports can be
/// correlated.
const ERROR_REFERENCE_PREFIX: &str = "paas-deployments";

/// Return the current epoch time in milliseconds.
pub fn epoch_milli() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

pub fn error_reference() -> String {
    format!("{ERROR_REFERENCE_PREFIX}-{}", epoch_milli())
}

/// Shared state handed to every endpoint through dropshot's request context.
#[derive(Debug)]
pub struct ApiState {
    /// Various configurations needed by the api.
    pub config: conf::api::ApiConfig,

    /// The main backend storage implementation. All deployment records live here.
    pub storage: storage::Db,
}

impl ApiState {
    pub async fn new(config: conf::api::ApiConfig) -> Result<Self> {
        let storage = storage::Db::new(
            &config.server.storage_path,
            Duration::from_secs(config.server.storage_busy_timeout),
        )
        .await?;

        Ok(Self { config, storage })
    }
}

/// The outcome of a single action: the status to answer with and an optional body to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse<T> {
    pub status: StatusCode,
    pub body: Option<T>,
}

impl<T> ActionResponse<T> {
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }
}

/// Business level failures raised by actions. Translated into http responses by [`respond`].
#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("storage error; {0}")]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorResponse {
    /// Human readable description of what went wrong.
    pub message: String,

    /// Unique tag for this occurrence; matches the server side log line.
    pub reference: String,

    /// Individual field failures. Only present for validation errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ActionError {
    /// Maps the error onto the status and body the client receives. Internal details never leave the server;
    /// they are logged under the same reference instead.
    pub fn to_response(&self) -> (StatusCode, ErrorResponse) {
        let reference = error_reference();

        match self {
            ActionError::NotFound(message) => {
                debug!(message = %message, reference = %reference, "Resource not found");

                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        message: message.clone(),
                        reference,
                        errors: vec![],
                    },
                )
            }
            ActionError::Validation { message, errors } => {
                debug!(message = %message, reference = %reference, errors = ?errors, "Payload failed validation");

                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse {
                        message: message.clone(),
                        reference,
                        errors: errors.clone(),
                    },
                )
            }
            ActionError::Storage(_) | ActionError::Internal(_) => {
                error!(error = %self, reference = %reference, "Internal server error");

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "Internal server error".into(),
                        reference,
                        errors: vec![],
                    },
                )
            }
        }
    }
}

fn json_response<T: Serialize>(
    status: StatusCode,
    body: Option<&T>,
) -> Result<Response<Body>, HttpError> {
    let builder = Response::builder().status(status);

    let response = match body {
        Some(body) => {
            let content = serde_json::to_vec(body).map_err(|e| {
                error!(error = %e, "Could not serialize response body");
                HttpError::for_internal_error(format!("Could not serialize response body; {e}"))
            })?;

            builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::with_content(content))
        }
        None => builder.body(Body::empty()),
    };

    response.map_err(|e| {
        HttpError::for_internal_error(format!("Could not construct http response; {e}"))
    })
}

/// The http boundary for every action: successful responses are serialized as is and errors are rendered
/// with a fresh reference.
pub fn respond<T: Serialize>(
    result: Result<ActionResponse<T>, ActionError>,
) -> Result<Response<Body>, HttpError> {
    match result {
        Ok(action_response) => json_response(action_response.status, action_response.body.as_ref()),
        Err(err) => {
            let (status, body) = err.to_response();
            json_response(status, Some(&body))
        }
    }
}

fn logging_level(level: &str) -> ConfigLoggingLevel {
    match level.to_lowercase().as_str() {
        "trace" => ConfigLoggingLevel::Trace,
        "debug" => ConfigLoggingLevel::Debug,
        "warn" => ConfigLoggingLevel::Warn,
        "error" => ConfigLoggingLevel::Error,
        _ => ConfigLoggingLevel::Info,
    }
}

pub fn api_description() -> Result<ApiDescription<Arc<ApiState>>> {
    let mut api = ApiDescription::new();

    /* /healthcheck */
    api.register(healthcheck::get_healthcheck)
        .map_err(|e| anyhow!("could not register endpoint 'get_healthcheck'; {:?}", e))?;

    /* /deployments */
    api.register(deployments::list_deployments)
        .map_err(|e| anyhow!("could not register endpoint 'list_deployments'; {:?}", e))?;
    api.register(deployments::create_deployment)
        .map_err(|e| anyhow!("could not register endpoint 'create_deployment'; {:?}", e))?;

    /* /deployments/{deployment_guid} */
    api.register(deployments::get_deployment)
        .map_err(|e| anyhow!("could not register endpoint 'get_deployment'; {:?}", e))?;
    api.register(deployments::update_deployment)
        .map_err(|e| anyhow!("could not register endpoint 'update_deployment'; {:?}", e))?;
    api.register(deployments::delete_deployment)
        .map_err(|e| anyhow!("could not register endpoint 'delete_deployment'; {:?}", e))?;

    Ok(api)
}

fn build_server(
    api_state: Arc<ApiState>,
    bind_address: std::net::SocketAddr,
    level: ConfigLoggingLevel,
) -> Result<HttpServer<Arc<ApiState>>> {
    let log = ConfigLogging::StderrTerminal { level }
        .to_logger("paas-deployments")
        .map_err(|error| anyhow!("failed to create http logger: {}", error))?;

    let dropshot_conf = ConfigDropshot {
        bind_address,
        ..Default::default()
    };

    let api = api_description()?;

    ServerBuilder::new(api, api_state, log)
        .config(dropshot_conf)
        .start()
        .map_err(|error| anyhow!("failed to create server: {}", error))
}

pub async fn start_web_services(config: conf::api::ApiConfig) -> Result<()> {
    let bind_address = std::net::SocketAddr::from_str(&config.server.bind_address).with_context(|| {
        format!(
            "Could not parse url '{}' while trying to bind binary to port; \
    should be in format '<ip>:<port>'; Please be sure to use an ip instead of something like 'localhost', \
    when attempting to bind",
            &config.server.bind_address
        )
    })?;

    let level = logging_level(&config.general.log_level);

    let api_state = Arc::new(ApiState::new(config).await?);
    let storage_path = api_state.config.server.storage_path.clone();

    let server = build_server(api_state, bind_address, level)?;

    info!(
        message = "Started paas-deployments http service",
        host = %bind_address.ip(),
        port = %bind_address.port(),
        storage_path = %storage_path,
    );

    server
        .await
        .map_err(|error| anyhow!("Server encountered errors while running; {:#?}", error))
}
