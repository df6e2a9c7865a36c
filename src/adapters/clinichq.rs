use crate::adapters::{ensure_success, http_client};
use crate::config::toml_config::ClinicHqConfig;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;

const SERVICE: &str = "clinichq";

/// Downloads appointments from the ClinicHQ API.
pub struct ClinicHqClient {
    client: Client,
    endpoint: String,
    api_key: String,
    date_from: String,
    date_to: String,
}

impl ClinicHqClient {
    pub fn from_config(config: &ClinicHqConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "clinichq.api_key (CLINICHQ_API_KEY)".to_string(),
            })?;
        let date_to = config.date_to.clone().unwrap_or_else(|| {
            chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string()
        });

        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            endpoint: config.endpoint.clone(),
            api_key,
            date_from: config.date_from.clone(),
            date_to,
        })
    }

    /// Raw response body; parsing is left to the record processor.
    pub async fn fetch_appointments(&self) -> Result<Vec<u8>> {
        tracing::info!(
            "📡 Fetching ClinicHQ appointments from {} to {}",
            self.date_from,
            self.date_to
        );

        let response = self
            .client
            .get(&self.endpoint)
            .header("accept", "application/json")
            .query(&[
                ("code", self.api_key.as_str()),
                ("dateFrom", self.date_from.as_str()),
                ("dateTo", self.date_to.as_str()),
            ])
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let body = response.bytes().await?;

        tracing::debug!("ClinicHQ returned {} bytes", body.len());
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_fetch_sends_code_and_date_range() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/appointments")
                .query_param("code", "secret")
                .query_param("dateFrom", "2013-01-01T08:00:00.000Z")
                .query_param("dateTo", "2025-01-20T08:00:00.000Z")
                .header("accept", "application/json");
            then.status(200).body("[]");
        });

        let config = ClinicHqConfig {
            endpoint: server.url("/appointments"),
            api_key: Some("secret".to_string()),
            date_to: Some("2025-01-20T08:00:00.000Z".to_string()),
            ..Default::default()
        };
        let client = ClinicHqClient::from_config(&config).unwrap();
        let body = client.fetch_appointments().await.unwrap();

        mock.assert();
        assert_eq!(body, b"[]");
    }

    #[tokio::test]
    async fn test_fetch_unauthorized_is_http_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/appointments");
            then.status(401).body("invalid code");
        });

        let config = ClinicHqConfig {
            endpoint: server.url("/appointments"),
            api_key: Some("wrong".to_string()),
            ..Default::default()
        };
        let client = ClinicHqClient::from_config(&config).unwrap();
        let err = client.fetch_appointments().await.unwrap_err();

        assert!(matches!(err, EtlError::HttpStatusError { status: 401, .. }));
    }

    #[test]
    fn test_missing_api_key() {
        let err = ClinicHqClient::from_config(&ClinicHqConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, EtlError::MissingConfigError { .. }));
    }
}
