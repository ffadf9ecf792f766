use reqwest::Client;
use std::time::Duration;

use super::CoordinateService;
use crate::error::ConvertError;
use crate::model::Coordinate;

/// AMap coordinate conversion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://restapi.amap.com/v3/assistant/coordinate/convert";

/// Source coordinate system tag for raw satellite positions.
const COORDSYS_GPS: &str = "gps";

pub struct AmapService {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl AmapService {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: Client::new(),
        }
    }

    /// Use a different endpoint and a per-request timeout.
    pub fn with_endpoint(
        api_key: String,
        endpoint: String,
        timeout: Duration,
    ) -> Result<Self, ConvertError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }
}

#[async_trait::async_trait]
impl CoordinateService for AmapService {
    fn name(&self) -> &str {
        "AMap"
    }

    async fn convert(&self, raw: Coordinate) -> Result<Coordinate, ConvertError> {
        let locations = format!("{},{}", raw.longitude, raw.latitude);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("locations", locations.as_str()),
                ("coordsys", COORDSYS_GPS),
                ("output", "json"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ConvertError::Status { status, body: text });
        }

        log::debug!("AMap response for {locations}: {text}");
        parse_locations(&text)
    }
}

/// Extract the converted pair from an AMap response body.
///
/// The service answers `{"status":"1","info":"ok","locations":"lng,lat"}`; when
/// several pairs are present (`;`-separated) only the first is used.
pub fn parse_locations(body: &str) -> Result<Coordinate, ConvertError> {
    let json: serde_json::Value = serde_json::from_str(body)?;

    if json["status"].as_str() == Some("0") {
        let info = json["info"].as_str().unwrap_or("unknown error");
        return Err(ConvertError::Rejected(info.to_string()));
    }

    let locations = json["locations"]
        .as_str()
        .ok_or(ConvertError::MissingLocations)?;

    let first = locations.split(';').next().unwrap_or_default();
    let mut parts = first.split(',').map(str::trim);
    let (Some(lng), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ConvertError::BadPair(locations.to_string()));
    };
    match (lng.parse::<f64>(), lat.parse::<f64>()) {
        (Ok(lng), Ok(lat)) if lng.is_finite() && lat.is_finite() => Ok(Coordinate::new(lat, lng)),
        _ => Err(ConvertError::BadPair(locations.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer exactly one HTTP request with `status` and `body`; yields the request head.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/convert", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (url, handle)
    }

    /// Talks to the local responder directly, whatever proxy the environment sets.
    fn local_service(api_key: &str, endpoint: String) -> AmapService {
        AmapService {
            api_key: api_key.to_string(),
            endpoint,
            client: Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[test]
    fn parses_location_pair() {
        let body = r#"{"status":"1","info":"ok","infocode":"10000","locations":"120.160148,30.271964"}"#;
        let c = parse_locations(body).unwrap();
        assert_eq!(c.longitude, 120.160148);
        assert_eq!(c.latitude, 30.271964);
    }

    #[test]
    fn uses_first_of_several_pairs() {
        let c = parse_locations(r#"{"locations":"1.5,2.5;3.5,4.5"}"#).unwrap();
        assert_eq!(c, Coordinate::new(2.5, 1.5));
    }

    #[test]
    fn rejected_request_reports_info() {
        let err = parse_locations(r#"{"status":"0","info":"INVALID_USER_KEY","locations":[]}"#).unwrap_err();
        assert!(matches!(err, ConvertError::Rejected(ref info) if info == "INVALID_USER_KEY"));
    }

    #[test]
    fn malformed_bodies() {
        assert!(matches!(parse_locations("<html>"), Err(ConvertError::Body(_))));
        assert!(matches!(parse_locations(r#"{"status":"1"}"#), Err(ConvertError::MissingLocations)));
        assert!(matches!(parse_locations(r#"{"locations":42}"#), Err(ConvertError::MissingLocations)));
        assert!(matches!(parse_locations(r#"{"locations":"120.1"}"#), Err(ConvertError::BadPair(_))));
        assert!(matches!(parse_locations(r#"{"locations":"a,b"}"#), Err(ConvertError::BadPair(_))));
        assert!(matches!(parse_locations(r#"{"locations":"1,2,3"}"#), Err(ConvertError::BadPair(_))));
    }

    #[test]
    fn with_endpoint_builds_client() {
        let service =
            AmapService::with_endpoint("k".into(), "http://localhost/x".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(service.name(), "AMap");
        assert_eq!(service.endpoint, "http://localhost/x");
    }

    #[tokio::test]
    async fn convert_sends_query_and_parses_reply() {
        let (url, server) =
            one_shot_server("200 OK", r#"{"status":"1","info":"ok","locations":"120.5,30.25"}"#).await;
        let service = local_service("test-key", url);

        let converted = service.convert(Coordinate::new(30.0, 120.0)).await.unwrap();
        assert_eq!(converted, Coordinate::new(30.25, 120.5));

        let head = server.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with("GET /convert?"));
        assert!(request_line.contains("locations=120%2C30"));
        assert!(request_line.contains("coordsys=gps"));
        assert!(request_line.contains("output=json"));
        assert!(request_line.contains("key=test-key"));
    }

    #[tokio::test]
    async fn http_error_is_a_conversion_error() {
        let (url, server) = one_shot_server("503 Service Unavailable", r#"{"busy":true}"#).await;
        let service = local_service("k", url);

        let err = service.convert(Coordinate::new(30.0, 120.0)).await.unwrap_err();
        assert!(matches!(err, ConvertError::Status { status, .. } if status.as_u16() == 503));
        server.await.unwrap();
    }
}
