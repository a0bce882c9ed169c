//! [EnergyZero](https://www.energyzero.nl) daily gas prices over GraphQL.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::{
    api::PriceSource,
    core::{
        document::{AdditionalCost, PriceDocument, PriceInterval, slugify},
        error::{FetchError, ParseError},
        interval::Interval,
        schedule::Window,
    },
    prelude::*,
    quantity::CubicMeterPrice,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.energyzero.nl/v1/gql";

pub struct Api {
    client: Client,
    endpoint: Url,
}

impl Api {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PriceSource for Api {
    #[instrument(skip_all, fields(window = ?window))]
    async fn fetch(&self, window: &Window) -> Result<PriceDocument, FetchError> {
        info!("fetching…");
        let body = self
            .client
            .post(self.endpoint.clone())
            .json(&Request::new(window))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let document = parse(&body)?;
        info!(n_intervals = document.intervals().len(), "fetched");
        Ok(document)
    }
}

/// Parse the raw GraphQL response body into a validated document.
pub fn parse(body: &str) -> Result<PriceDocument, ParseError> {
    let response: Response = serde_json::from_str(body)?;
    let Some(current) = response.data.and_then(|data| data.current) else {
        return Err(ParseError::NoData(
            response.errors.into_iter().map(|error| error.message).collect(),
        ));
    };
    current.try_into()
}

#[derive(Serialize)]
struct Request {
    #[serde(rename = "operationName")]
    operation_name: &'static str,

    query: &'static str,

    variables: Variables,
}

impl Request {
    const QUERY: &'static str = "query EnergyMarketPricesGas($windowStart: Time!, $windowEnd: Time!) { current: energyMarketPrices(input: {from: $windowStart, till: $windowEnd, intervalType: Daily, type: Gas}) { averageIncl averageExcl prices { energyPriceExcl energyPriceIncl from isAverage till type vat additionalCosts { name priceExcl priceIncl } } } }";

    fn new(window: &Window) -> Self {
        let (window_start, window_end) = window.fixed_offset();
        Self {
            operation_name: "EnergyMarketPricesGas",
            query: Self::QUERY,
            variables: Variables { window_start, window_end },
        }
    }
}

#[derive(Serialize)]
struct Variables {
    #[serde(rename = "windowStart")]
    window_start: DateTime<FixedOffset>,

    #[serde(rename = "windowEnd")]
    window_end: DateTime<FixedOffset>,
}

#[derive(Deserialize)]
struct Response {
    data: Option<Data>,

    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct Data {
    current: Option<MarketPrices>,
}

#[derive(Deserialize)]
struct MarketPrices {
    #[serde(rename = "averageIncl")]
    average_incl: CubicMeterPrice,

    #[serde(rename = "averageExcl")]
    average_excl: CubicMeterPrice,

    prices: Vec<MarketPrice>,
}

impl TryFrom<MarketPrices> for PriceDocument {
    type Error = ParseError;

    fn try_from(prices: MarketPrices) -> Result<Self, Self::Error> {
        let intervals = prices
            .prices
            .into_iter()
            .map(PriceInterval::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::try_new(prices.average_incl, prices.average_excl, intervals)
    }
}

#[derive(Deserialize)]
struct MarketPrice {
    #[serde(rename = "energyPriceExcl")]
    energy_price_excl: Option<CubicMeterPrice>,

    #[serde(rename = "energyPriceIncl")]
    energy_price_incl: Option<CubicMeterPrice>,

    from: DateTime<FixedOffset>,
    till: DateTime<FixedOffset>,

    #[serde(rename = "isAverage")]
    is_average: bool,

    #[serde(rename = "type")]
    kind: String,

    vat: f64,

    #[serde(rename = "additionalCosts")]
    additional_costs: Vec<MarketPriceCost>,
}

impl TryFrom<MarketPrice> for PriceInterval {
    type Error = ParseError;

    fn try_from(price: MarketPrice) -> Result<Self, Self::Error> {
        let additional_costs = price
            .additional_costs
            .into_iter()
            .map(AdditionalCost::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::builder()
            .interval(Interval::new(price.from, price.till))
            .maybe_price_excl_vat(price.energy_price_excl)
            .maybe_price_incl_vat(price.energy_price_incl)
            .vat_rate(price.vat)
            .is_average(price.is_average)
            .kind(price.kind)
            .additional_costs(additional_costs)
            .build())
    }
}

#[derive(Deserialize)]
struct MarketPriceCost {
    name: String,

    #[serde(rename = "priceExcl")]
    price_excl: CubicMeterPrice,

    #[serde(rename = "priceIncl")]
    price_incl: CubicMeterPrice,
}

impl TryFrom<MarketPriceCost> for AdditionalCost {
    type Error = ParseError;

    fn try_from(cost: MarketPriceCost) -> Result<Self, Self::Error> {
        if slugify(&cost.name).is_empty() {
            return Err(ParseError::BlankCostName(cost.name));
        }
        Ok(Self { name: cost.name, price_excl_vat: cost.price_excl, price_incl_vat: cost.price_incl })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::Utc;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::*;
    use crate::core::{
        error::ErrorKind,
        registry::{ALL_IN, MARKET_INCL, Registry},
        schedule::ScheduleClock,
    };

    /// Accept a single connection, read the whole request and reply with the raw `response`.
    async fn serve_once(response: &'static str) -> Result<Url> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await
                && read_request(&mut stream).await.is_ok()
            {
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        Ok(format!("http://{address}/v1/gql").parse()?)
    }

    async fn read_request(stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut request = Vec::new();
        let mut buffer = [0; 1024];
        loop {
            let n_read = stream.read(&mut buffer).await?;
            if n_read == 0 {
                return Ok(request);
            }
            request.extend_from_slice(&buffer[..n_read]);
            let Some(header_end) = request.windows(4).position(|window| window == b"\r\n\r\n")
            else {
                continue;
            };
            let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map_or(Ok(0), |value| value.trim().parse::<usize>())?;
            if request.len() >= header_end + 4 + content_length {
                return Ok(request);
            }
        }
    }

    async fn fetch_from(endpoint: Url, timeout: Duration) -> Result<PriceDocument, FetchError> {
        let clock = ScheduleClock::try_new("Europe/Amsterdam", 6).unwrap();
        let window = clock.window(Utc::now()).unwrap();
        Api::new(endpoint, timeout).unwrap().fetch(&window).await
    }

    // language=json
    const BODY: &str = r#"{
        "data": {
            "current": {
                "averageIncl": 1.28,
                "averageExcl": 1.0578,
                "prices": [
                    {
                        "energyPriceExcl": 0.7025,
                        "energyPriceIncl": 0.85,
                        "from": "2024-03-10T05:00:00.000Z",
                        "till": "2024-03-11T05:00:00.000Z",
                        "isAverage": false,
                        "type": "Gas",
                        "vat": 21,
                        "additionalCosts": [
                            { "name": "Energiebelasting", "priceExcl": 0.1653, "priceIncl": 0.20 },
                            { "name": "Opslag", "priceExcl": 0.0413, "priceIncl": 0.05 }
                        ]
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn parse_ok() -> Result {
        let document = parse(BODY)?;
        assert_abs_diff_eq!(document.average_incl_vat().0, 1.28);
        assert_eq!(document.intervals().len(), 1);

        let interval = document.current_interval().context("no current interval")?;
        assert_eq!(interval.kind, "Gas");
        assert_eq!(interval.interval.start.to_rfc3339(), "2024-03-10T05:00:00+00:00");
        assert_eq!(interval.additional_costs.len(), 2);

        let registry = Registry::from_document(&document);
        assert_abs_diff_eq!(registry.resolve(MARKET_INCL).context("no market")?.0, 0.85);
        assert_abs_diff_eq!(registry.resolve(ALL_IN).context("no all-in")?.0, 1.10, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn null_market_price_ok() -> Result {
        // language=json
        let body = r#"{
            "data": {
                "current": {
                    "averageIncl": 1.28,
                    "averageExcl": 1.0578,
                    "prices": [
                        {
                            "energyPriceExcl": null,
                            "energyPriceIncl": null,
                            "from": "2024-03-10T05:00:00Z",
                            "till": "2024-03-11T05:00:00Z",
                            "isAverage": false,
                            "type": "Gas",
                            "vat": 0.21,
                            "additionalCosts": []
                        }
                    ]
                }
            }
        }"#;
        let registry = Registry::from_document(&parse(body)?);
        assert_eq!(registry.resolve(MARKET_INCL), None);
        assert_eq!(registry.resolve(ALL_IN), None);
        Ok(())
    }

    #[test]
    fn graphql_errors_are_parse_errors() {
        // language=json
        let body = r#"{ "data": null, "errors": [{ "message": "Variable \"$windowStart\" is invalid" }] }"#;
        let error = parse(body).unwrap_err();
        assert!(matches!(&error, ParseError::NoData(messages) if messages.len() == 1));
    }

    #[test]
    fn missing_field_is_parse_error() {
        // language=json
        let body = r#"{ "data": { "current": { "averageIncl": 1.28, "prices": [] } } }"#;
        assert!(matches!(parse(body), Err(ParseError::Json(_))));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        // language=json
        let body = r#"{ "data": { "current": { "averageIncl": "high", "averageExcl": 1.0, "prices": [] } } }"#;
        assert!(matches!(parse(body), Err(ParseError::Json(_))));
    }

    #[test]
    fn empty_intervals_are_parse_error() {
        // language=json
        let body = r#"{ "data": { "current": { "averageIncl": 1.28, "averageExcl": 1.0578, "prices": [] } } }"#;
        assert!(matches!(parse(body), Err(ParseError::NoIntervals)));
    }

    #[test]
    fn blank_cost_name_is_parse_error() {
        let body = BODY.replace("\"Opslag\"", "\"  \"");
        assert!(matches!(parse(&body), Err(ParseError::BlankCostName(_))));
    }

    #[test]
    fn request_ok() -> Result {
        let clock = ScheduleClock::try_new("Europe/Amsterdam", 6)?;
        let now = DateTime::parse_from_rfc3339("2024-03-30T07:00:00+01:00")?.with_timezone(&Utc);
        let request = serde_json::to_value(Request::new(&clock.window(now)?))?;
        assert_eq!(request["operationName"], "EnergyMarketPricesGas");
        assert_eq!(request["variables"]["windowStart"], "2024-03-30T06:00:00+01:00");
        assert_eq!(request["variables"]["windowEnd"], "2024-03-31T06:00:00+02:00");
        Ok(())
    }

    #[tokio::test]
    async fn server_error_is_transport_error() -> Result {
        let endpoint = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await?;
        let error = fetch_from(endpoint, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Transport);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() -> Result {
        let endpoint = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
        )
        .await?;
        let error = fetch_from(endpoint, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Parse);
        assert!(matches!(error, FetchError::Parse(ParseError::Json(_))));
        Ok(())
    }

    #[tokio::test]
    async fn valid_body_is_fetched() -> Result {
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{BODY}",
            BODY.len(),
        );
        let endpoint = serve_once(response.leak()).await?;
        let document = fetch_from(endpoint, Duration::from_secs(5)).await?;
        assert_abs_diff_eq!(document.average_incl_vat().0, 1.28);
        Ok(())
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() -> Result {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        drop(listener);
        let endpoint: Url = format!("http://{address}/v1/gql").parse()?;
        let error = fetch_from(endpoint, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Transport);
        Ok(())
    }

    #[tokio::test]
    async fn timeout_is_transport_error() -> Result {
        // Accepted by the kernel backlog, never answered.
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let endpoint: Url = format!("http://{}/v1/gql", listener.local_addr()?).parse()?;
        let error = fetch_from(endpoint, Duration::from_millis(200)).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Transport);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "makes the API request"]
    async fn fetch_ok() -> Result {
        let clock = ScheduleClock::try_new("Europe/Amsterdam", 6)?;
        let api = Api::new(DEFAULT_ENDPOINT.parse()?, Duration::from_secs(10))?;
        let document = api.fetch(&clock.window(Utc::now())?).await?;
        assert!(document.current_interval().is_some());
        Ok(())
    }
}
