//! # Client
//!
//! Seams between the target and the remote metrics service

use super::datum::{PutMetricDataRequest, PutMetricDataResponse};
use super::Error;
use std::fmt;

/// Synchronous handle to the remote metrics service
///
/// One handle is shared by every thread writing through the target, implementations must be safe
/// for concurrent use
pub trait MetricsClient: Send + Sync {
    /// Submit one request, blocking the calling thread until the service responds
    fn put_metric_data(&self, request: &PutMetricDataRequest) -> Result<PutMetricDataResponse, SubmitError>;
}

/// Constructs a [MetricsClient] during target initialization
pub trait ClientFactory: Send + Sync {
    /// Build a client with credentials resolved from the environment (env vars, profile, instance role)
    fn ambient(&self, region: &str, endpoint_url: Option<&str>) -> Result<Box<dyn MetricsClient>, Error>;

    /// Build a client with an explicit access key pair
    fn explicit(
        &self,
        credentials: &Credentials,
        region: &str,
        endpoint_url: Option<&str>,
    ) -> Result<Box<dyn MetricsClient>, Error>;
}

/// Static access key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .finish()
    }
}

/// Why a single write did not reach the service
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The service answered with a modeled error response
    #[error("{error_type}: {message}")]
    Service {
        request_id: Option<String>,
        error_type: String,
        status_code: Option<u16>,
        message: String,
    },

    #[error("target has not been initialized")]
    Uninitialized,

    #[error("no metrics client, initialization failed")]
    ClientUnavailable,

    #[error("failed to render layout")]
    Render(#[source] Error),

    #[error("failed to submit metric data")]
    Transport(#[source] Error),
}
