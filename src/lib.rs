//! A [tracing_subscriber::Layer] that forwards every log event as a single CloudWatch metric data
//! point
//!
//! Each event submits one PutMetricData call carrying the configured namespace, metric name, unit
//! and value stamped with the current UTC time. Failures never reach the application, they are
//! reported through `tracing` diagnostics only.
//!
//! # Example
//! ```no_run
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::Layer;
//!
//! let target = tracing_cloudwatch_metric::Builder::new()
//!     .namespace("MyApplication")
//!     .metric_name("Errors")
//!     .unit(tracing_cloudwatch_metric::Unit::Count)
//!     .value(1.0)
//!     .build_target()
//!     .unwrap();
//!
//! let subscriber = tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(target.with_filter(tracing_subscriber::filter::LevelFilter::ERROR));
//! tracing::subscriber::set_global_default(subscriber).unwrap();
//!
//! tracing::error!("payment failed");
//! ```

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use {
    builder::Builder,
    client::{ClientFactory, Credentials, MetricsClient, SubmitError},
    datum::{MetricDatum, PutMetricDataRequest, PutMetricDataResponse},
    layout::{Layout, LogEvent, SimpleLayout},
    registry::{TargetRegistry, TARGET_NAME},
    target::{Config, MetricTarget, State},
    unit::{ParseUnitError, Unit},
};

#[cfg(feature = "aws")]
pub use aws::{AwsClientFactory, CloudWatchClient};

#[cfg(feature = "aws")]
mod aws;
mod builder;
mod client;
mod datum;
mod layer;
mod layout;
mod registry;
mod suppress;
mod target;
#[cfg(test)]
mod test;
mod unit;
