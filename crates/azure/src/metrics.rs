//! Rate-limit counts from Azure Monitor

use async_trait::async_trait;
use keyguard_core::{ResourceDescriptor, UpstreamError};
use keyguard_credential::MetricsSource;
use serde::Deserialize;
use std::sync::Arc;

use crate::client::ArmClient;
use crate::resource::{METRICS_API_VERSION, resource_id};

const METRIC_NAME: &str = "TotalRequests";

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    value: Vec<Metric>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    name: MetricName,
    #[serde(default)]
    timeseries: Vec<TimeSeries>,
}

#[derive(Debug, Deserialize)]
struct MetricName {
    value: String,
}

#[derive(Debug, Deserialize)]
struct TimeSeries {
    #[serde(default)]
    data: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
struct DataPoint {
    #[serde(default)]
    count: Option<f64>,
}

impl MetricsResponse {
    /// `count` of the newest point in the first series of the request metric
    fn latest_count(&self) -> u64 {
        self.value
            .iter()
            .find(|m| m.name.value == METRIC_NAME)
            .and_then(|m| m.timeseries.first())
            .and_then(|series| series.data.last())
            .and_then(|point| point.count)
            .map_or(0, |count| count.max(0.0).round() as u64)
    }
}

/// [`MetricsSource`] reading `TotalRequests` filtered to HTTP 429
#[derive(Debug, Clone)]
pub struct AzureMetricsSource {
    client: Arc<ArmClient>,
}

impl AzureMetricsSource {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsSource for AzureMetricsSource {
    async fn error_count(&self, resource: &ResourceDescriptor) -> Result<u64, UpstreamError> {
        let path = format!("{}/providers/microsoft.insights/metrics", resource_id(resource));
        let response: MetricsResponse = self
            .client
            .get_json(
                "query_metrics",
                &path,
                &[
                    ("api-version", METRICS_API_VERSION),
                    ("metricnames", METRIC_NAME),
                    ("filter", "ResultCode eq '429'"),
                    ("timespan", "PT1M"),
                    ("aggregation", "Count"),
                    ("interval", "PT1M"),
                ],
            )
            .await?;

        let count = response.latest_count();
        tracing::debug!(resource = %resource, count, "Rate-limit count fetched");
        Ok(count)
    }
}
