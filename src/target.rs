//! # Target
//!
//! Metric forwarding target returned from tracing_cloudwatch_metric::Builder

use super::client::{ClientFactory, Credentials, MetricsClient, SubmitError};
use super::datum::{MetricDatum, PutMetricDataRequest, PutMetricDataResponse};
use super::layout::{Layout, LogEvent};
use super::unit::Unit;
use super::{suppress, Error};
use chrono::Utc;
use serde::Deserialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{debug, error, info, trace};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

/// Configuration via Builder, or deserialized from the host configuration
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub namespace: String,
    pub metric_name: String,
    #[serde(default)]
    pub unit: Unit,
    pub value: f64,
}

impl Config {
    /// Required field checks, run before a target is ever constructed
    pub fn validate(&self) -> Result<(), Error> {
        if self.namespace.is_empty() {
            return Err("namespace missing".into());
        }
        if self.metric_name.is_empty() {
            return Err("metric_name missing".into());
        }
        if !self.value.is_finite() {
            return Err(format!("value must be finite, got {}", self.value).into());
        }
        Ok(())
    }

    /// The explicit key pair, only when both halves are non-empty
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.access_key_id.as_deref(), self.secret_access_key.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Credentials::new(id, secret)),
            _ => None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "** redacted **"))
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("namespace", &self.namespace)
            .field("metric_name", &self.metric_name)
            .field("unit", &self.unit)
            .field("value", &self.value)
            .finish()
    }
}

/// Lifecycle of a [MetricTarget]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    /// Initialization ran, `client` is false if the client failed to build
    Ready { client: bool },
}

/// Forwards every log event as one CloudWatch metric data point
///
/// Use [Builder](super::Builder) to construct. Stacking the target onto a tracing subscriber runs
/// [initialize](MetricTarget::initialize) for you.
///
/// # Example
/// ```no_run
/// use tracing_subscriber::layer::SubscriberExt;
/// use tracing_subscriber::Layer;
///
/// let target = tracing_cloudwatch_metric::Builder::new()
///     .namespace("MyApplication")
///     .metric_name("Errors")
///     .unit(tracing_cloudwatch_metric::Unit::Count)
///     .value(1.0)
///     .build_target()
///     .unwrap();
///
/// let subscriber = tracing_subscriber::registry()
///     .with(target.with_filter(tracing_subscriber::filter::LevelFilter::ERROR));
/// tracing::subscriber::set_global_default(subscriber).unwrap();
///
/// tracing::error!("something broke");
/// ```
pub struct MetricTarget {
    config: Config,
    layout: Box<dyn Layout>,
    factory: Box<dyn ClientFactory>,
    client: OnceLock<Option<Box<dyn MetricsClient>>>,
}

impl MetricTarget {
    pub fn new(config: Config, layout: Box<dyn Layout>, factory: Box<dyn ClientFactory>) -> Self {
        Self {
            config,
            layout,
            factory,
            client: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> State {
        match self.client.get() {
            None => State::Uninitialized,
            Some(client) => State::Ready {
                client: client.is_some(),
            },
        }
    }

    /// Build the metrics client, runs at most once
    ///
    /// A client construction failure is logged and swallowed, the target stays usable but every
    /// write will fail with [SubmitError::ClientUnavailable]
    pub fn initialize(&self) {
        let _guard = suppress::enter();
        if self.client.get().is_some() {
            debug!("CloudWatch metric target already initialized");
            return;
        }
        self.client.get_or_init(|| {
            panic::catch_unwind(AssertUnwindSafe(|| self.create_client())).unwrap_or_else(|panic| {
                error!(
                    panic = panic_message(panic.as_ref()),
                    "CloudWatch client failed to be configured and won't send any metrics"
                );
                None
            })
        });
    }

    fn create_client(&self) -> Option<Box<dyn MetricsClient>> {
        let region = self.config.region.as_str();
        let endpoint_url = self.config.endpoint_url.as_deref();
        debug!(region, namespace = %self.config.namespace, "Initializing CloudWatch metric target");

        let client = match self.config.credentials() {
            None => {
                info!("AWS access keys are not specified, using credentials from the environment");
                self.factory.ambient(region, endpoint_url)
            }
            Some(credentials) => self.factory.explicit(&credentials, region, endpoint_url),
        };

        match client {
            Ok(client) => {
                debug!(region, "CloudWatch metric target initialized");
                Some(client)
            }
            Err(err) => {
                error!(
                    error = %err,
                    chain = %source_chain(err.as_ref()),
                    "CloudWatch client failed to be configured and won't send any metrics"
                );
                None
            }
        }
    }

    /// Submit one data point for `event`, never fails and never panics
    pub fn write(&self, event: &LogEvent) {
        let _guard = suppress::enter();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_write(event)));

        match outcome {
            Ok(Ok(response)) => {
                debug!(
                    status_code = response.status_code,
                    request_id = response.request_id.as_deref().unwrap_or("-"),
                    "Metric data sent to CloudWatch"
                );
            }
            Ok(Err(SubmitError::Service {
                request_id,
                error_type,
                status_code,
                message,
            })) => {
                error!(
                    request_id = request_id.as_deref().unwrap_or("-"),
                    error_type = %error_type,
                    status_code,
                    "Failed to send metric to CloudWatch: {message}"
                );
            }
            Ok(Err(err)) => {
                error!(
                    error = %err,
                    chain = %source_chain(&err),
                    "Failed to write log to CloudWatch"
                );
            }
            Err(panic) => {
                error!(panic = panic_message(panic.as_ref()), "Failed to write log to CloudWatch");
            }
        }
    }

    fn try_write(&self, event: &LogEvent) -> Result<PutMetricDataResponse, SubmitError> {
        // The metric carries no part of the rendered message
        let rendered = self.layout.render(event).map_err(SubmitError::Render)?;
        trace!(rendered = %rendered, "Rendered log event");

        let request = self.request();
        if let Ok(json) = serde_json::to_string(&request) {
            trace!(request = %json, "PutMetricData request");
        }

        let client = match self.client.get() {
            None => return Err(SubmitError::Uninitialized),
            Some(None) => return Err(SubmitError::ClientUnavailable),
            Some(Some(client)) => client,
        };

        debug!(namespace = %request.namespace, "Sending metric data to CloudWatch");
        client.put_metric_data(&request)
    }

    /// Build the single datum request, only the timestamp varies between calls
    pub fn request(&self) -> PutMetricDataRequest {
        PutMetricDataRequest::single(
            self.config.namespace.clone(),
            MetricDatum {
                metric_name: self.config.metric_name.clone(),
                timestamp: Utc::now(),
                unit: self.config.unit,
                value: self.config.value,
            },
        )
    }
}

/// `outer: inner: root` rendering of an error and its sources
fn source_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
