use crate::normalizers::parse_response;
use crate::types::*;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Request outcomes reported by `/health`
#[derive(Debug, Default)]
struct HealthLog {
    successes: u64,
    failures: u64,
    last_success: Option<DateTime<Utc>>,
    /// Cleared by the next success
    last_error: Option<String>,
    last_latency_ms: u64,
}

impl HealthLog {
    fn success_rate(&self) -> f64 {
        match self.successes + self.failures {
            0 => 1.0,
            total => self.successes as f64 / total as f64,
        }
    }
}

/// Client for the strategy results API
pub struct ResultsApiClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    health: Mutex<HealthLog>,
}

impl ResultsApiClient {
    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            health: Mutex::new(HealthLog::default()),
        })
    }

    /// `{base}/api/v1/results/monthly/{strategy}-{year}`
    pub fn monthly_url(&self, strategy_id: &str, year: &str) -> String {
        format!(
            "{}/api/v1/results/monthly/{}-{}",
            self.base_url, strategy_id, year
        )
    }

    /// Fetch one strategy/year key. No retries: every failure is final.
    ///
    /// The timeout covers the whole exchange, body included.
    pub async fn fetch_monthly(&self, strategy_id: &str, year: &str) -> Result<MonthlyResults> {
        let request_start = Instant::now();
        info!("Fetching monthly results {}-{}", strategy_id, year);

        let request_future = self.request(strategy_id, year);
        let result = match tokio::time::timeout(self.request_timeout, request_future).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Results request for {} timed out", year);
                Err(DataError::Network(format!(
                    "request for {}-{} timed out after {}ms",
                    strategy_id,
                    year,
                    self.request_timeout.as_millis()
                )))
            }
        };

        let mut health = self.health.lock().await;
        match &result {
            Ok(_) => {
                health.successes += 1;
                health.last_success = Some(Utc::now());
                health.last_error = None;
                health.last_latency_ms = request_start.elapsed().as_millis() as u64;
            }
            Err(e) => {
                health.failures += 1;
                health.last_error = Some(e.to_string());
            }
        }

        result
    }

    async fn request(&self, strategy_id: &str, year: &str) -> Result<MonthlyResults> {
        let response = self
            .client
            .get(self.monthly_url(strategy_id, year))
            .send()
            .await
            .map_err(|e| {
                warn!("Results request for {} failed: {}", year, e);
                DataError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Results API returned {} for {}-{}", status, strategy_id, year);
            return Err(DataError::Fetch {
                year: year.to_string(),
                reason: HTTP_ERROR.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            warn!("Reading results body for {} failed: {}", year, e);
            DataError::Network(e.to_string())
        })?;

        parse_response(&body).map_err(|e| {
            warn!("Malformed results payload for {}: {}", year, e);
            e
        })
    }

    /// Health from recorded outcomes (no API call)
    pub async fn health(&self) -> SourceHealth {
        let health = self.health.lock().await;

        SourceHealth {
            source: self.name().to_string(),
            is_healthy: health.last_success.is_some() && health.last_error.is_none(),
            last_success: health.last_success,
            last_error: health.last_error.clone(),
            success_rate: health.success_rate(),
            avg_latency_ms: health.last_latency_ms,
        }
    }

    pub fn name(&self) -> &str {
        "results_api"
    }
}

#[async_trait::async_trait]
impl ResultsSource for ResultsApiClient {
    async fn fetch_monthly(&self, strategy_id: &str, year: &str) -> Result<MonthlyResults> {
        ResultsApiClient::fetch_monthly(self, strategy_id, year).await
    }

    async fn health(&self) -> SourceHealth {
        ResultsApiClient::health(self).await
    }

    fn name(&self) -> &str {
        ResultsApiClient::name(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ResultsApiClient {
        ResultsApiClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_monthly_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/results/monthly/rasta-trendier-2023"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "monthly_results": [
                    {"month": "2023-01", "balance": 1000},
                    {"month": "2023-02", "balance": 1052.5}
                ],
                "win_rate": 33.5,
                "profit_factor": 1.5,
                "win_count": 67,
                "loss_count": 133
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        let results = api.fetch_monthly("rasta-trendier", "2023").await.unwrap();
        assert_eq!(results.records.len(), 2);
        assert_eq!(results.records[1].balance, dec!(1052.5));
        assert_eq!(results.stats.win_count, 67);

        let health = api.health().await;
        assert!(health.is_healthy);
        assert!(health.last_success.is_some());
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let api = client(&server);
        let err = api.fetch_monthly("rasta-trendier", "2022").await.unwrap_err();
        assert_eq!(
            err,
            DataError::Fetch {
                year: "2022".into(),
                reason: HTTP_ERROR.into(),
                status: 503,
            }
        );

        let health = api.health().await;
        assert!(!health.is_healthy);
        assert_eq!(health.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_monthly("rasta-trendier", "2023")
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Decode(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let api = ResultsApiClient::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = api.fetch_monthly("rasta-trendier", "2023").await.unwrap_err();
        assert!(matches!(err, DataError::Network(_)));
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"monthly_results\": [",
                )
                .await
                .unwrap();
            // Headers sent, body never finishes
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let api =
            ResultsApiClient::new(&format!("http://{}", addr), Duration::from_millis(200)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            api.fetch_monthly("rasta-trendier", "2023"),
        )
        .await
        .expect("fetch should give up on its own");

        assert!(matches!(result, Err(DataError::Network(_))));
        let health = api.health().await;
        assert!(!health.is_healthy);
        assert!(health.last_error.is_some());
    }

    #[test]
    fn test_monthly_url_trims_trailing_slash() {
        let api = ResultsApiClient::new("http://localhost:3003/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.monthly_url("rasta-trendier", "2024"),
            "http://localhost:3003/api/v1/results/monthly/rasta-trendier-2024"
        );
    }
}
