/// Matchday Hub - HTTP server
///
/// Serves one aggregation cycle per request:
///   GET /health                      plain "ok", never gated
///   GET /api/matches?sort=&competition=&status=&includeUpcoming=
///   GET /state                       cache + token diagnostics
///
/// Basic auth guards everything except /health when HUB_BASIC_AUTH_USER/PASS are set.
///
/// Run:
///   cargo run --bin matchday-hub

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dotenv::dotenv;
use match_aggregator::{Aggregator, EventQuery, HubConfig, ServerConfig};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

const TEXT: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json; charset=utf-8";

struct HttpResponse {
    status_line: &'static str,
    content_type: &'static str,
    extra_headers: String,
    body: String,
}

impl HttpResponse {
    fn new(status_line: &'static str, content_type: &'static str, body: String) -> Self {
        Self { status_line, content_type, extra_headers: String::new(), body }
    }

    fn unauthorized() -> Self {
        Self {
            extra_headers: "WWW-Authenticate: Basic realm=\"matchday-hub\"\r\n".to_string(),
            ..Self::new("HTTP/1.1 401 Unauthorized", TEXT, "unauthorized".to_string())
        }
    }

    fn into_wire(self) -> String {
        format!(
            "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
            self.status_line,
            self.content_type,
            self.body.len(),
            self.extra_headers,
            self.body
        )
    }
}

#[derive(Clone)]
struct AppState {
    aggregator: Aggregator,
    basic_auth: Option<Arc<(String, String)>>,
}

/// `Authorization: Basic <base64(user:pass)>` against the configured pair.
fn is_authorized(headers: &[(&str, &str)], expected: &(String, String)) -> bool {
    let Some(value) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, v)| v.trim())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    match decoded.split_once(':') {
        Some((user, pass)) => user == expected.0 && pass == expected.1,
        None => false,
    }
}

fn parse_headers(req: &str) -> Vec<(&str, &str)> {
    req.lines()
        .skip(1)
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

async fn route(state: &AppState, method: &str, target: &str, headers: &[(&str, &str)]) -> HttpResponse {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if (method, path) == ("GET", "/health") {
        return HttpResponse::new("HTTP/1.1 200 OK", TEXT, "ok".to_string());
    }

    if let Some(expected) = &state.basic_auth {
        if !is_authorized(headers, expected) {
            return HttpResponse::unauthorized();
        }
    }

    match (method, path) {
        ("GET", "/api/matches") => {
            let q = EventQuery::from_query(query);
            match state.aggregator.aggregate_json(&q).await {
                Ok(body) => HttpResponse::new("HTTP/1.1 200 OK", JSON, body),
                Err(e) => {
                    error!("aggregation failed: {}", e);
                    HttpResponse::new(
                        "HTTP/1.1 500 Internal Server Error",
                        JSON,
                        json!({ "error": e.to_string() }).to_string(),
                    )
                }
            }
        }
        ("GET", "/state") => {
            let snap = state.aggregator.state().await;
            let body = serde_json::to_string_pretty(&snap).unwrap_or_else(|_| "{}".to_string());
            HttpResponse::new("HTTP/1.1 200 OK", JSON, body)
        }
        _ => HttpResponse::new("HTTP/1.1 404 Not Found", TEXT, "not found".to_string()),
    }
}

async fn handle_http_connection(mut stream: TcpStream, state: AppState) -> Result<()> {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await.context("http read")?;
    if n == 0 {
        return Ok(());
    }

    let req = String::from_utf8_lossy(&buf[..n]);
    let first_line = req.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let headers = parse_headers(&req);

    let resp = route(&state, method, target, &headers).await;
    debug!("{} {} → {}", method, target, resp.status_line);
    stream.write_all(resp.into_wire().as_bytes()).await.context("http write")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = ServerConfig::from_env()?;
    let config = HubConfig::from_env();
    info!(
        "matchday-hub: sport={} batch={} max_in_flight={} logs={:?}",
        config.sport_id, config.batch_size, config.max_in_flight, config.log_dir
    );

    let state = AppState {
        aggregator: Aggregator::new(config).context("aggregator init")?,
        basic_auth: server.basic_auth.map(Arc::new),
    };
    if state.basic_auth.is_none() {
        info!("basic auth disabled (HUB_BASIC_AUTH_USER/PASS not set)");
    }

    let listener = TcpListener::bind(server.bind).await.context("http bind")?;
    info!("matchday-hub listening on http://{} (GET /health, /api/matches, /state)", server.bind);

    loop {
        let (stream, peer) = listener.accept().await.context("http accept")?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_http_connection(stream, state).await {
                debug!("http handler err {}: {}", peer, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> (String, String) {
        ("ops".to_string(), "s3cret".to_string())
    }

    #[test]
    fn basic_auth_accepts_only_matching_pair() {
        let good = format!("Basic {}", STANDARD.encode("ops:s3cret"));
        let bad = format!("Basic {}", STANDARD.encode("ops:nope"));

        assert!(is_authorized(&[("Authorization", good.as_str())], &creds()));
        assert!(is_authorized(&[("authorization", good.as_str())], &creds()));
        assert!(!is_authorized(&[("Authorization", bad.as_str())], &creds()));
        assert!(!is_authorized(&[("Authorization", "Bearer xyz")], &creds()));
        assert!(!is_authorized(&[], &creds()));
    }

    #[test]
    fn headers_stop_at_blank_line() {
        let req = "GET /state HTTP/1.1\r\nHost: x\r\nAuthorization: Basic abc\r\n\r\nbody: no";
        let headers = parse_headers(req);
        assert_eq!(headers, vec![("Host", "x"), ("Authorization", "Basic abc")]);
    }

    #[test]
    fn unauthorized_response_carries_challenge() {
        let wire = HttpResponse::unauthorized().into_wire();
        assert!(wire.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(wire.contains("WWW-Authenticate: Basic"));
    }
}
