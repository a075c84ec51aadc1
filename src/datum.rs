//! # Datum
//!
//! PutMetricData request and response model, serializable into the CloudWatch JSON shape via serde_json
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/APIReference/API_PutMetricData.html>

use super::unit::Unit;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PutMetricDataRequest {
    #[serde(rename = "Namespace")]
    pub namespace: String,
    // This crate always submits exactly one datum per request
    #[serde(rename = "MetricData")]
    pub metric_data: Vec<MetricDatum>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricDatum {
    #[serde(rename = "MetricName")]
    pub metric_name: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Unit")]
    pub unit: Unit,
    #[serde(rename = "Value")]
    pub value: f64,
}

/// Outcome of a successful PutMetricData call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutMetricDataResponse {
    /// HTTP status of the response, `None` when the client could not observe it
    pub status_code: Option<u16>,
    pub request_id: Option<String>,
}

impl PutMetricDataRequest {
    /// Single datum batch tagged with `namespace`
    pub fn single(namespace: impl Into<String>, datum: MetricDatum) -> Self {
        Self {
            namespace: namespace.into(),
            metric_data: vec![datum],
        }
    }
}
