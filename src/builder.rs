use super::client::ClientFactory;
use super::layout::{Layout, SimpleLayout};
use super::target::{self, Config, MetricTarget};
use super::unit::Unit;
use super::Error;
use serde::Deserialize;

/// Builder for the CloudWatch metric target
///
/// # Example
/// ```no_run
///  let target = tracing_cloudwatch_metric::Builder::new()
///      .namespace("MyApplication")
///      .metric_name("Errors")
///      .value(1.0)
///      .init()
///      .unwrap();
/// ```
pub struct Builder {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    region: Option<String>,
    endpoint_url: Option<String>,
    namespace: Option<String>,
    metric_name: Option<String>,
    unit: Unit,
    value: Option<f64>,
    layout: Option<Box<dyn Layout>>,
    client_factory: Option<Box<dyn ClientFactory>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            access_key_id: None,
            secret_access_key: None,
            region: None,
            endpoint_url: None,
            namespace: None,
            metric_name: None,
            unit: Unit::None,
            value: None,
            layout: None,
            client_factory: None,
        }
    }

    /// Starts from a deserialized [Config], all values can still be overridden
    pub fn from_config(config: Config) -> Self {
        Builder {
            access_key_id: config.access_key_id,
            secret_access_key: config.secret_access_key,
            region: Some(config.region),
            endpoint_url: config.endpoint_url,
            namespace: Some(config.namespace),
            metric_name: Some(config.metric_name),
            unit: config.unit,
            value: Some(config.value),
            ..Self::new()
        }
    }

    /// Starts from a JSON configuration object
    ///
    /// ```
    /// let builder = tracing_cloudwatch_metric::Builder::from_json(&serde_json::json!({
    ///     "namespace": "App",
    ///     "metric_name": "Errors",
    ///     "unit": "Count",
    ///     "value": 1.0
    /// }))
    /// .unwrap();
    /// ```
    pub fn from_json(config: &serde_json::Value) -> Result<Self, Error> {
        let config = Config::deserialize(config)?;
        Ok(Self::from_config(config))
    }

    /// Sets an explicit access key pair
    /// * If either half is empty the credentials are resolved from the environment instead
    pub fn credentials(self, access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
            ..self
        }
    }

    /// Sets the AWS region, defaults to us-east-1
    pub fn region(self, region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..self
        }
    }

    /// Overrides the service endpoint, e.g. a local CloudWatch emulator
    pub fn endpoint_url(self, endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
            ..self
        }
    }

    /// Sets the CloudWatch namespace for the metric
    /// * Must be set or build() will return Err("namespace missing")
    pub fn namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..self
        }
    }

    /// Sets the metric name
    /// * Must be set or build() will return Err("metric_name missing")
    pub fn metric_name(self, metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: Some(metric_name.into()),
            ..self
        }
    }

    pub fn unit(self, unit: impl Into<Unit>) -> Self {
        Self {
            unit: unit.into(),
            ..self
        }
    }

    /// Sets the constant value submitted for every event
    /// * Must be set and finite or build() will return an error
    pub fn value(self, value: f64) -> Self {
        Self {
            value: Some(value),
            ..self
        }
    }

    /// Replaces the default [SimpleLayout]
    pub fn layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Some(Box::new(layout));
        self
    }

    /// Replaces the default AWS SDK client factory
    pub fn client_factory(mut self, factory: impl ClientFactory + 'static) -> Self {
        self.client_factory = Some(Box::new(factory));
        self
    }

    /// Validates and returns the target configuration
    pub fn build(&self) -> Result<Config, Error> {
        let config = Config {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            region: self.region.clone().unwrap_or_else(|| target::DEFAULT_REGION.to_owned()),
            endpoint_url: self.endpoint_url.clone(),
            namespace: self.namespace.clone().ok_or("namespace missing")?,
            metric_name: self.metric_name.clone().ok_or("metric_name missing")?,
            unit: self.unit,
            value: self.value.ok_or("value missing")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Construct the target without initializing it, stacking it onto a subscriber initializes it
    pub fn build_target(mut self) -> Result<MetricTarget, Error> {
        let config = self.build()?;
        let layout = self.layout.take().unwrap_or_else(|| Box::new(SimpleLayout));
        let factory = match self.client_factory.take() {
            Some(factory) => factory,
            None => default_factory()?,
        };
        Ok(MetricTarget::new(config, layout, factory))
    }

    /// Construct and initialize the target
    /// * Only configuration errors are returned, client construction failures are logged
    pub fn init(self) -> Result<MetricTarget, Error> {
        let target = self.build_target()?;
        target.initialize();
        Ok(target)
    }
}

#[cfg(feature = "aws")]
fn default_factory() -> Result<Box<dyn ClientFactory>, Error> {
    Ok(Box::new(super::aws::AwsClientFactory))
}

#[cfg(not(feature = "aws"))]
fn default_factory() -> Result<Box<dyn ClientFactory>, Error> {
    Err("client_factory missing, enable the aws feature or supply one".into())
}
