//! # AWS
//!
//! [MetricsClient] backed by aws-sdk-cloudwatch
//!
//! *this module requires the `aws` feature flag*

use super::client::{ClientFactory, Credentials, MetricsClient, SubmitError};
use super::datum::{MetricDatum, PutMetricDataRequest, PutMetricDataResponse};
use super::{suppress, Error};
use aws_sdk_cloudwatch::config::interceptors::BeforeDeserializationInterceptorContextRef;
use aws_sdk_cloudwatch::config::{ConfigBag, Intercept, Region, RuntimeComponents};
use aws_sdk_cloudwatch::error::{BoxError, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatch::operation::put_metric_data::{PutMetricDataError, PutMetricDataOutput};
use aws_sdk_cloudwatch::operation::RequestId;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{self, StandardUnit};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use std::future::Future;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

/// Builds [CloudWatchClient]s from the SDK default configuration chain
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsClientFactory;

impl AwsClientFactory {
    fn build(
        &self,
        credentials: Option<&Credentials>,
        region: &str,
        endpoint_url: Option<&str>,
    ) -> Result<Box<dyn MetricsClient>, Error> {
        validate_region(region)?;
        let runtime = ClientRuntime::new()?;

        // Without explicit credentials the loader falls back to the default chain:
        //
        // - Environment variables: AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY
        // - The shared credentials and config files in ~/.aws
        // - Web Identity Token credentials
        // - ECS container credentials
        // - EC2 instance metadata (instance profile)
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(Region::new(region.to_owned()));
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(aws_sdk_cloudwatch::config::Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "tracing-cloudwatch-metric",
            ));
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = runtime.block_on(loader.load())?;
        debug!(region, explicit_credentials = credentials.is_some(), "Loaded AWS SDK configuration");

        Ok(Box::new(CloudWatchClient {
            client: aws_sdk_cloudwatch::Client::new(&sdk_config),
            runtime,
        }))
    }
}

impl ClientFactory for AwsClientFactory {
    fn ambient(&self, region: &str, endpoint_url: Option<&str>) -> Result<Box<dyn MetricsClient>, Error> {
        self.build(None, region, endpoint_url)
    }

    fn explicit(
        &self,
        credentials: &Credentials,
        region: &str,
        endpoint_url: Option<&str>,
    ) -> Result<Box<dyn MetricsClient>, Error> {
        self.build(Some(credentials), region, endpoint_url)
    }
}

/// Region names look like `us-east-1` or `cn-northwest-1`
fn validate_region(region: &str) -> Result<(), Error> {
    let valid = !region.is_empty()
        && region.contains('-')
        && !region.starts_with('-')
        && !region.ends_with('-')
        && region.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    match valid {
        true => Ok(()),
        false => Err(format!("invalid AWS region {region:?}").into()),
    }
}

/// Dedicated runtime driving the SDK futures
///
/// Callers block on a spawned task rather than the runtime itself, so writes issued from inside
/// another tokio runtime don't panic
struct ClientRuntime {
    runtime: Option<Runtime>,
}

impl ClientRuntime {
    fn new() -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("cloudwatch-metric-client")
            .on_thread_start(suppress::mark_thread)
            .enable_all()
            .build()?;
        Ok(Self { runtime: Some(runtime) })
    }

    fn block_on<F>(&self, future: F) -> Result<F::Output, Error>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let runtime = self.runtime.as_ref().ok_or("client runtime shut down")?;
        Ok(futures::executor::block_on(runtime.spawn(future))?)
    }
}

impl Drop for ClientRuntime {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// CloudWatch PutMetricData client, safe to share between threads
pub struct CloudWatchClient {
    client: aws_sdk_cloudwatch::Client,
    runtime: ClientRuntime,
}

impl MetricsClient for CloudWatchClient {
    fn put_metric_data(&self, request: &PutMetricDataRequest) -> Result<PutMetricDataResponse, SubmitError> {
        let status = StatusCapture::default();
        let send = self
            .client
            .put_metric_data()
            .namespace(request.namespace.clone())
            .set_metric_data(Some(request.metric_data.iter().map(to_sdk_datum).collect()))
            .customize()
            .interceptor(status.clone())
            .send();

        let result = self.runtime.block_on(send).map_err(SubmitError::Transport)?;
        classify(result, status.get())
    }
}

/// Records the HTTP status of the last transmitted attempt, the SDK output doesn't carry it
#[derive(Clone, Debug, Default)]
struct StatusCapture(Arc<AtomicU16>);

impl StatusCapture {
    fn get(&self) -> Option<u16> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            status => Some(status),
        }
    }
}

impl Intercept for StatusCapture {
    fn name(&self) -> &'static str {
        "StatusCapture"
    }

    fn read_after_transmit(
        &self,
        context: &BeforeDeserializationInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        self.0.store(context.response().status().as_u16(), Ordering::Release);
        Ok(())
    }
}

/// Modeled service error responses become [SubmitError::Service], everything else is transport
fn classify(
    result: Result<PutMetricDataOutput, SdkError<PutMetricDataError, HttpResponse>>,
    status_code: Option<u16>,
) -> Result<PutMetricDataResponse, SubmitError> {
    match result {
        Ok(output) => Ok(PutMetricDataResponse {
            status_code,
            request_id: output.request_id().map(str::to_owned),
        }),
        Err(SdkError::ServiceError(context)) => {
            let err = context.err();
            Err(SubmitError::Service {
                request_id: err.request_id().map(str::to_owned),
                error_type: err.code().unwrap_or("Unknown").to_owned(),
                status_code: Some(context.raw().status().as_u16()),
                message: err.message().unwrap_or_default().to_owned(),
            })
        }
        Err(err) => Err(SubmitError::Transport(err.into())),
    }
}

fn to_sdk_datum(datum: &MetricDatum) -> types::MetricDatum {
    types::MetricDatum::builder()
        .metric_name(datum.metric_name.clone())
        .timestamp(DateTime::from_millis(datum.timestamp.timestamp_millis()))
        .unit(StandardUnit::from(datum.unit.as_str()))
        .value(datum.value)
        .build()
}
