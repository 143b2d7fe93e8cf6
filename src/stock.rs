//! Single-symbol stock quote proxy against the Yahoo Finance chart API.
//!
//! Unrelated to the feed pipeline: one upstream call, one derived record.
//! Degrades to a hardcoded fallback quote on any failure so dashboard
//! tiles always have something to render; the response is always a
//! success from the consumer's point of view.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StockConfig;
use crate::fetch::{Deadline, FetchError};

/// Browser-like User-Agent; the chart API rejects obvious bots.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Error)]
enum QuoteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Malformed chart response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("No data from chart API")]
    NoData,
}

/// The quote record served to consumers. Monetary values are formatted to
/// two decimals as strings, matching what dashboard tiles display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub previous_close: String,
    pub change: String,
    pub change_percent: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_two_week_high: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_two_week_low: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_update: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    currency: Option<String>,
    market_state: Option<String>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<u64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Fetches the live quote, degrading to the fallback on any failure.
pub async fn fetch_quote(
    client: &reqwest::Client,
    config: &StockConfig,
    deadline: Deadline,
) -> Quote {
    match live_quote(client, config, deadline).await {
        Ok(quote) => quote,
        Err(e) => {
            tracing::warn!(symbol = %config.symbol, error = %e, "Stock fetch failed, serving fallback quote");
            fallback_quote(config, &e.to_string())
        }
    }
}

async fn live_quote(
    client: &reqwest::Client,
    config: &StockConfig,
    deadline: Deadline,
) -> Result<Quote, QuoteError> {
    let url = format!(
        "{}/v8/finance/chart/{}?interval=1d&range=5d",
        config.base_url, config.symbol
    );

    let exchange = async {
        let response = client
            .get(&url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::Network)?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        response.bytes().await.map_err(FetchError::Network)
    };
    let body = tokio::time::timeout(deadline.duration(), exchange)
        .await
        .map_err(|_| FetchError::Timeout)??;

    let parsed: ChartResponse = serde_json::from_slice(&body)?;
    let meta = parsed
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .map(|r| r.meta)
        .ok_or(QuoteError::NoData)?;

    let price = meta.regular_market_price.ok_or(QuoteError::NoData)?;
    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .ok_or(QuoteError::NoData)?;
    let change = price - previous_close;
    let change_percent = (change / previous_close) * 100.0;

    Ok(Quote {
        symbol: config.symbol.clone(),
        name: config.name.clone(),
        price: money(price),
        previous_close: money(previous_close),
        change: money(change),
        change_percent: money(change_percent),
        currency: meta.currency.unwrap_or_else(|| "EUR".to_string()),
        market_state: meta.market_state,
        day_high: meta.regular_market_day_high.map(money),
        day_low: meta.regular_market_day_low.map(money),
        volume: meta.regular_market_volume,
        fifty_two_week_high: meta.fifty_two_week_high.map(money),
        fifty_two_week_low: meta.fifty_two_week_low.map(money),
        fallback: false,
        error: None,
        last_update: chrono::Utc::now(),
    })
}

/// The quote served when the upstream is unavailable. Values are the last
/// known-good snapshot for the default symbol; consumers see the
/// `fallback` flag and can badge the tile as stale.
fn fallback_quote(config: &StockConfig, error: &str) -> Quote {
    Quote {
        symbol: config.symbol.clone(),
        name: config.name.clone(),
        price: "60.14".to_string(),
        previous_close: "61.15".to_string(),
        change: "-1.01".to_string(),
        change_percent: "-1.65".to_string(),
        currency: "EUR".to_string(),
        market_state: Some("CLOSED".to_string()),
        day_high: None,
        day_low: None,
        volume: None,
        fifty_two_week_high: None,
        fifty_two_week_low: None,
        fallback: true,
        error: Some(error.to_string()),
        last_update: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> StockConfig {
        StockConfig {
            symbol: "TTE.PA".to_string(),
            name: "TotalEnergies SE".to_string(),
            base_url: base_url.to_string(),
        }
    }

    const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "regularMarketPrice": 62.5,
                    "previousClose": 61.0,
                    "currency": "EUR",
                    "marketState": "REGULAR",
                    "regularMarketDayHigh": 63.4,
                    "regularMarketDayLow": 61.9,
                    "regularMarketVolume": 1234567
                }
            }]
        }
    }"#;

    #[tokio::test]
    async fn test_live_quote() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/TTE.PA"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(CHART_BODY)
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let quote =
            fetch_quote(&client, &test_config(&mock_server.uri()), Deadline::default()).await;

        assert!(!quote.fallback);
        assert_eq!(quote.price, "62.50");
        assert_eq!(quote.previous_close, "61.00");
        assert_eq!(quote.change, "1.50");
        assert_eq!(quote.change_percent, "2.46");
        assert_eq!(quote.day_high.as_deref(), Some("63.40"));
        assert_eq!(quote.volume, Some(1234567));
        assert_eq!(quote.currency, "EUR");
    }

    #[tokio::test]
    async fn test_upstream_error_serves_fallback() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let quote =
            fetch_quote(&client, &test_config(&mock_server.uri()), Deadline::default()).await;

        assert!(quote.fallback);
        assert_eq!(quote.price, "60.14");
        assert_eq!(quote.market_state.as_deref(), Some("CLOSED"));
        assert!(quote.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_result_serves_fallback() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"chart":{"result":[]}}"#),
            )
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let quote =
            fetch_quote(&client, &test_config(&mock_server.uri()), Deadline::default()).await;
        assert!(quote.fallback);
    }

    #[test]
    fn test_fallback_flag_omitted_when_false() {
        let mut quote = fallback_quote(&test_config("http://unused"), "boom");
        quote.fallback = false;
        quote.error = None;
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json.get("fallback").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["previousClose"], "61.15");
    }
}
