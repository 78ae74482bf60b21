//! HTTP backend for the SAP gateway.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, trace, warn};

use investo_core::defaults::{SAP_API_URL, SAP_COMMITMENTS_PATH, SAP_COSTS_PATH, SAP_TIMEOUT_SECS};
use investo_core::{
    parse_amount, sap::zero_amount, Error, Result, SapBackend, SapFetch, SapLineItem, SapWindow,
};

/// Connection settings for the SAP gateway.
#[derive(Debug, Clone)]
pub struct SapConfig {
    pub base_url: String,
    /// Cost endpoint template with `{sap_id}`, `{start}` and `{end}` placeholders.
    pub costs_path: String,
    /// Commitment endpoint template, same placeholders.
    pub commitments_path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SapConfig {
    fn default() -> Self {
        Self {
            base_url: SAP_API_URL.to_string(),
            costs_path: SAP_COSTS_PATH.to_string(),
            commitments_path: SAP_COMMITMENTS_PATH.to_string(),
            username: None,
            password: None,
            timeout_secs: SAP_TIMEOUT_SECS,
        }
    }
}

impl SapConfig {
    /// Create from environment variables, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SAP_API_URL") {
            config.base_url = url;
        }
        if let Ok(path) = std::env::var("SAP_COSTS_PATH") {
            config.costs_path = path;
        }
        if let Ok(path) = std::env::var("SAP_COMMITMENTS_PATH") {
            config.commitments_path = path;
        }
        config.username = std::env::var("SAP_USERNAME").ok().filter(|u| !u.is_empty());
        config.password = std::env::var("SAP_PASSWORD").ok();
        if let Ok(raw) = std::env::var("SAP_TIMEOUT_SECS") {
            config.timeout_secs = raw
                .parse()
                .map_err(|_| Error::Config(format!("SAP_TIMEOUT_SECS is not a number: {}", raw)))?;
        }
        Ok(config)
    }

    /// Full URL of `template` for one project and window.
    ///
    /// The SAP id is percent-encoded; the window strings are inserted as is.
    pub fn render(&self, template: &str, sap_id: &str, window: &SapWindow) -> String {
        let path = template
            .replace("{sap_id}", &urlencoding::encode(sap_id))
            .replace("{start}", &window.start_str())
            .replace("{end}", &window.end_str());
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct ODataEnvelope {
    d: ODataResults,
}

#[derive(Debug, Deserialize)]
struct ODataResults {
    #[serde(default)]
    results: Vec<RawLineItem>,
}

#[derive(Debug, Deserialize)]
struct RawLineItem {
    #[serde(rename = "Posid")]
    posid: String,
    #[serde(rename = "Wkgbtr")]
    amount: serde_json::Value,
}

/// Convert raw items, counting amounts that fail to parse as zero.
fn to_line_items(sap_id: &str, raw: Vec<RawLineItem>) -> Vec<SapLineItem> {
    raw.into_iter()
        .map(|item| {
            let parsed = match &item.amount {
                serde_json::Value::String(s) => parse_amount(s),
                serde_json::Value::Number(n) => parse_amount(&n.to_string()),
                _ => None,
            };
            let amount = parsed.unwrap_or_else(|| {
                warn!(
                    subsystem = "sap",
                    component = "client",
                    sap_id = %sap_id,
                    posid = %item.posid,
                    raw = %item.amount,
                    "Unparseable SAP amount, counting as zero"
                );
                zero_amount()
            });
            trace!(sap_id = %sap_id, posid = %item.posid, amount = %amount, "SAP line item");
            SapLineItem::new(item.posid, amount)
        })
        .collect()
}

/// Log a call that produced no usable line items and degrade it to zero.
///
/// `status` is 0 when no response arrived at all.
fn failed(
    endpoint: &str,
    sap_id: &str,
    url: &str,
    status: u16,
    headers: &str,
    body: &str,
) -> SapFetch {
    error!(
        subsystem = "sap",
        component = "client",
        op = "fetch",
        endpoint = endpoint,
        sap_id = %sap_id,
        status = status,
        url = %url,
        headers = %headers,
        body = %body,
        "SAP request failed, counting as zero"
    );
    SapFetch::Failed { status }
}

/// [`SapBackend`] over the SAP gateway's OData endpoints.
#[derive(Clone)]
pub struct HttpSapBackend {
    client: Client,
    config: SapConfig,
}

impl HttpSapBackend {
    pub fn new(config: SapConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create SAP HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SapConfig {
        &self.config
    }

    async fn fetch(
        &self,
        endpoint: &str,
        template: &str,
        sap_id: &str,
        window: &SapWindow,
    ) -> Result<SapFetch> {
        let start = Instant::now();
        let url = self.config.render(template, sap_id, window);

        let mut request = self.client.get(&url);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
                return Ok(failed(endpoint, sap_id, &url, status, "", &e.to_string()));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let headers = format!("{:?}", response.headers());
            let body = response.text().await.unwrap_or_default();
            return Ok(failed(endpoint, sap_id, &url, status.as_u16(), &headers, &body));
        }

        let headers = format!("{:?}", response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(failed(endpoint, sap_id, &url, status.as_u16(), &headers, &e.to_string()));
            }
        };
        let envelope: ODataEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                let detail = format!("invalid OData body ({}): {}", e, body);
                return Ok(failed(endpoint, sap_id, &url, status.as_u16(), &headers, &detail));
            }
        };
        let items = to_line_items(sap_id, envelope.d.results);

        debug!(
            subsystem = "sap",
            component = "client",
            op = "fetch",
            endpoint = endpoint,
            sap_id = %sap_id,
            result_count = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched SAP line items"
        );

        Ok(SapFetch::Items(items))
    }
}

#[async_trait]
impl SapBackend for HttpSapBackend {
    async fn fetch_costs(&self, sap_id: &str, window: &SapWindow) -> Result<SapFetch> {
        self.fetch("costs", &self.config.costs_path, sap_id, window).await
    }

    async fn fetch_commitments(&self, sap_id: &str, window: &SapWindow) -> Result<SapFetch> {
        self.fetch("commitments", &self.config.commitments_path, sap_id, window)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use investo_core::SapCostScope;
    use std::str::FromStr;

    fn window() -> SapWindow {
        SapWindow::for_scope(
            SapCostScope::CurrentYear,
            2026,
            NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_render_fills_placeholders() {
        let config = SapConfig {
            base_url: "http://sap.local/".to_string(),
            costs_path: "/costs/{sap_id}?from={start}&to={end}".to_string(),
            ..SapConfig::default()
        };
        assert_eq!(
            config.render(&config.costs_path, "2814I00708", &window()),
            "http://sap.local/costs/2814I00708?from=2026-01-01T00:00:00&to=2026-12-31T23:59:59"
        );
    }

    #[test]
    fn test_render_encodes_sap_id() {
        let config = SapConfig {
            base_url: "http://sap.local".to_string(),
            costs_path: "/costs/{sap_id}?from={start}".to_string(),
            ..SapConfig::default()
        };
        assert_eq!(
            config.render(&config.costs_path, "28#14&I?7", &window()),
            "http://sap.local/costs/28%2314%26I%3F7?from=2026-01-01T00:00:00"
        );
    }

    #[test]
    fn test_bad_amount_counts_as_zero() {
        let raw: ODataEnvelope = serde_json::from_value(serde_json::json!({
            "d": {"results": [
                {"Posid": "2814I00708.01", "Wkgbtr": "12,5"},
                {"Posid": "2814I00708.02", "Wkgbtr": 40.5},
                {"Posid": "2814I00708.03", "Wkgbtr": null}
            ]}
        }))
        .unwrap();
        let items = to_line_items("2814I00708", raw.d.results);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].amount, zero_amount());
        assert_eq!(items[1].amount, BigDecimal::from_str("40.5").unwrap());
        assert_eq!(items[2].amount, zero_amount());
    }
}
