use anyhow::{Context, Result};
use dotabuff_scraper::PageFetcher;
use prediction_engine::{EngineError, PredictionEngine, ROSTER_SIZE};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Browser callers (the scoreboard plugin) come from arbitrary origins.
const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
Access-Control-Allow-Headers: Content-Type\r\n";

/// A draft to push to a Telegram chat as scores plus heat map.
#[derive(Debug, Clone, PartialEq)]
pub struct PicklineRequest {
    pub chat_id: i64,
    pub names: Vec<String>,
}

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<PredictionEngine>,
    pub fetcher: Arc<PageFetcher>,
    /// `None` when the chat bot is disabled.
    pub pickline: Option<mpsc::Sender<PicklineRequest>>,
}

#[derive(Debug, Deserialize)]
struct PickRequest {
    radiant: Vec<String>,
    dire: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PickResponse {
    radiant_winrate: f64,
    dire_winrate: f64,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    ready: bool,
    status: &'static str,
}

#[derive(Debug, PartialEq)]
pub struct HttpResponse {
    pub status_line: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn text(status_line: &'static str, body: &str) -> Self {
        Self {
            status_line,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
        }
    }

    fn json<T: Serialize>(status_line: &'static str, value: &T) -> Self {
        Self {
            status_line,
            content_type: "application/json; charset=utf-8",
            body: serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    fn error(status_line: &'static str, message: impl std::fmt::Display) -> Self {
        Self::json(status_line, &serde_json::json!({ "error": message.to_string() }))
    }

    fn engine_error(e: &EngineError) -> Self {
        let status_line = match e {
            EngineError::NotReady => "HTTP/1.1 503 Service Unavailable",
            EngineError::NotFound { .. } => "HTTP/1.1 404 Not Found",
            EngineError::InvalidRoster { .. } | EngineError::Parse(_) => "HTTP/1.1 400 Bad Request",
            EngineError::Fetch(_) => "HTTP/1.1 502 Bad Gateway",
            EngineError::InternalConsistency { .. } => "HTTP/1.1 500 Internal Server Error",
        };
        Self::error(status_line, e)
    }
}

/// Dispatches one parsed request. `target` is the raw request target,
/// query string included.
pub async fn route(state: &ApiState, method: &str, target: &str, body: &[u8]) -> HttpResponse {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    match (method, path) {
        ("OPTIONS", _) => HttpResponse::text("HTTP/1.1 204 No Content", ""),
        ("GET", "/health") => HttpResponse::text("HTTP/1.1 200 OK", "ok"),
        ("GET", "/status") => {
            let status = state.engine.status();
            HttpResponse::json(
                "HTTP/1.1 200 OK",
                &StatusResponse {
                    ready: state.engine.is_ready(),
                    status: status.as_str(),
                },
            )
        }
        ("POST", "/pick-winrate_v1") => {
            let req: PickRequest = match serde_json::from_slice(body) {
                Ok(r) => r,
                Err(e) => return HttpResponse::error("HTTP/1.1 400 Bad Request", format!("invalid body: {e}")),
            };
            for side in [&req.radiant, &req.dire] {
                if side.len() != ROSTER_SIZE {
                    return HttpResponse::engine_error(&EngineError::InvalidRoster {
                        expected: ROSTER_SIZE,
                        found: side.len(),
                    });
                }
            }
            let names: Vec<String> = req.radiant.into_iter().chain(req.dire).collect();
            match state.engine.predict_from_names(&names) {
                Ok(p) => HttpResponse::json(
                    "HTTP/1.1 200 OK",
                    &PickResponse {
                        radiant_winrate: p.radiant,
                        dire_winrate: p.dire,
                    },
                ),
                Err(e) => HttpResponse::engine_error(&e),
            }
        }
        ("GET", "/predict-match") => {
            let Some(url) = query_param(query, "url") else {
                return HttpResponse::error("HTTP/1.1 400 Bad Request", "missing url parameter");
            };
            match state.engine.predict_from_match_url(&state.fetcher, &url).await {
                Ok((record, p)) => HttpResponse::json(
                    "HTTP/1.1 200 OK",
                    &serde_json::json!({
                        "radiant_winrate": p.radiant,
                        "dire_winrate": p.dire,
                        "match": record,
                    }),
                ),
                Err(e) => HttpResponse::engine_error(&e),
            }
        }
        ("GET", "/owl-esports/pickline") => pickline(state, query),
        _ => HttpResponse::text("HTTP/1.1 404 Not Found", "not found"),
    }
}

/// `line` is ten comma-separated names, with `_` standing for spaces as the
/// plugin sends them; `tg` is the chat to answer in.
fn pickline(state: &ApiState, query: &str) -> HttpResponse {
    let Some(line) = query_param(query, "line").filter(|l| !l.trim().is_empty()) else {
        return HttpResponse::error("HTTP/1.1 400 Bad Request", "line is required");
    };
    let Some(tg) = query_param(query, "tg").filter(|t| !t.trim().is_empty()) else {
        return HttpResponse::error("HTTP/1.1 400 Bad Request", "tg is required");
    };
    let Ok(chat_id) = tg.trim().parse::<i64>() else {
        return HttpResponse::error("HTTP/1.1 400 Bad Request", "tg is invalid");
    };

    let names: Vec<String> = line.split(',').map(|n| n.replace('_', " ").trim().to_string()).collect();
    if names.len() != 2 * ROSTER_SIZE {
        return HttpResponse::error("HTTP/1.1 400 Bad Request", "line is invalid");
    }
    if let Err(e) = state.engine.resolve_heroes(&names) {
        return HttpResponse::engine_error(&e);
    }

    let Some(tx) = &state.pickline else {
        return HttpResponse::error("HTTP/1.1 503 Service Unavailable", "telegram bot is disabled");
    };
    if let Err(e) = tx.try_send(PicklineRequest { chat_id, names }) {
        warn!(chat_id, "pickline queue rejected draft: {e}");
        return HttpResponse::error("HTTP/1.1 503 Service Unavailable", "bot is busy, try again");
    }

    HttpResponse::json(
        "HTTP/1.1 200 OK",
        &serde_json::json!({ "message": "Sending pick winrates to user" }),
    )
}

fn render_response(resp: &HttpResponse) -> String {
    format!(
        "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{CORS_HEADERS}Connection: close\r\n\r\n{}",
        resp.status_line,
        resp.content_type,
        resp.body.len(),
        resp.body
    )
}

fn query_param(query: &str, key: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(&format!("http://localhost/?{query}")).ok()?;
    let value = parsed
        .query_pairs()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.into_owned());
    value
}

/// Reads until the header block is complete and `Content-Length` bytes of
/// body have arrived. Returns `None` when the peer closed early.
async fn read_request(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = vec![0u8; 8192];

    loop {
        let n = stream.read(&mut chunk).await.context("http read")?;
        if n == 0 {
            return Ok(if buf.is_empty() { None } else { Some(buf) });
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find_header_end(&buf) {
            let wanted = header_end + content_length(&buf[..header_end]);
            if buf.len() >= wanted {
                return Ok(Some(buf));
            }
        }
        if buf.len() > MAX_REQUEST_BYTES {
            anyhow::bail!("request too large");
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn content_length(headers: &[u8]) -> usize {
    String::from_utf8_lossy(headers)
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

async fn handle_http_connection(mut stream: TcpStream, state: ApiState) -> Result<()> {
    let Some(raw) = read_request(&mut stream).await? else {
        return Ok(());
    };

    let (head, body) = match find_header_end(&raw) {
        Some(end) => raw.split_at(end),
        None => (raw.as_slice(), &[][..]),
    };
    let head = String::from_utf8_lossy(head);
    let first_line = head.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    let resp = route(&state, method, target, body).await;
    debug!(method, target, status = resp.status_line, "http request");

    let out = render_response(&resp);
    stream.write_all(out.as_bytes()).await.context("http write")?;
    Ok(())
}

pub async fn serve(state: ApiState, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await.context("http bind")?;
    info!(
        "http api listening on http://{} (GET /health, /status, /predict-match, /owl-esports/pickline; POST /pick-winrate_v1)",
        bind
    );

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("http accept failed: {e}");
                continue;
            }
        };
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
    use dotabuff_scraper::{hero_from_link, Counter, FetcherConfig, Hero};
    use prediction_engine::Dataset;

    const SLUGS: [&str; 10] = [
        "axe", "lion", "tiny", "muerta", "tusk", "snapfire", "shadow-fiend", "gyrocopter", "underlord", "ursa",
    ];

    const PICKLINE: &str = "Axe,Lion,Tiny,Muerta,Tusk,Snapfire,Shadow_Fiend,Gyrocopter,Underlord,Ursa";

    fn state(loaded: bool) -> ApiState {
        let engine = PredictionEngine::new();
        if loaded {
            let heroes: Vec<Hero> = SLUGS.iter().map(|s| hero_from_link(&format!("/heroes/{s}"))).collect();
            let pages: Vec<(String, Vec<Counter>)> = heroes
                .iter()
                .map(|page| {
                    let rows = heroes
                        .iter()
                        .filter(|h| h.name != page.name)
                        .map(|h| Counter {
                            hero: h.clone(),
                            disadvantage: 0.0,
                            win_rate: 52.0,
                            matches_played: 10,
                        })
                        .collect();
                    (page.name.clone(), rows)
                })
                .collect();
            engine.install(Dataset::build(heroes, pages, Vec::new()));
        }
        ApiState {
            engine: Arc::new(engine),
            fetcher: Arc::new(PageFetcher::new(FetcherConfig::default())),
            pickline: None,
        }
    }

    fn state_with_bot() -> (ApiState, mpsc::Receiver<PicklineRequest>) {
        let (tx, rx) = mpsc::channel(4);
        let mut s = state(true);
        s.pickline = Some(tx);
        (s, rx)
    }

    fn pick_body(dire_last: &str) -> Vec<u8> {
        serde_json::json!({
            "radiant": ["Axe", "Lion", "Tiny", "Muerta", "Tusk"],
            "dire": ["Snapfire", "Shadow Fiend", "Gyrocopter", "Underlord", dire_last],
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn health_and_status() {
        let s = state(false);
        assert_eq!(route(&s, "GET", "/health", b"").await.body, "ok");

        let resp = route(&s, "GET", "/status", b"").await;
        let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(v["ready"], false);
        assert_eq!(v["status"], "empty");
    }

    #[tokio::test]
    async fn pick_winrate_ok() {
        let s = state(true);
        let resp = route(&s, "POST", "/pick-winrate_v1", &pick_body("Ursa")).await;
        assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
        let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(v["radiant_winrate"], 52.0);
        assert_eq!(v["dire_winrate"], 52.0);
    }

    #[tokio::test]
    async fn pick_winrate_error_statuses() {
        let empty = state(false);
        let resp = route(&empty, "POST", "/pick-winrate_v1", &pick_body("Ursa")).await;
        assert_eq!(resp.status_line, "HTTP/1.1 503 Service Unavailable");

        let s = state(true);
        let resp = route(&s, "POST", "/pick-winrate_v1", &pick_body("Pudge")).await;
        assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
        assert!(resp.body.contains("Pudge"));

        let resp = route(&s, "POST", "/pick-winrate_v1", b"{not json").await;
        assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");

        let short = br#"{"radiant":["Axe"],"dire":["Lion"]}"#;
        let resp = route(&s, "POST", "/pick-winrate_v1", short).await;
        assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
    }

    #[tokio::test]
    async fn pick_winrate_rejects_uneven_sides() {
        let s = state(true);
        let uneven = serde_json::json!({
            "radiant": ["Axe", "Lion", "Tiny", "Muerta"],
            "dire": ["Tusk", "Snapfire", "Shadow Fiend", "Gyrocopter", "Underlord", "Ursa"],
        })
        .to_string();
        let resp = route(&s, "POST", "/pick-winrate_v1", uneven.as_bytes()).await;
        assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
        assert!(resp.body.contains("expected 5"), "{}", resp.body);
    }

    #[tokio::test]
    async fn pickline_validates_query() {
        let (s, mut rx) = state_with_bot();
        let cases = [
            ("/owl-esports/pickline?tg=7".to_string(), "line is required"),
            (format!("/owl-esports/pickline?line={PICKLINE}"), "tg is required"),
            (format!("/owl-esports/pickline?line={PICKLINE}&tg=abc"), "tg is invalid"),
            ("/owl-esports/pickline?line=Axe,Lion,Tiny&tg=7".to_string(), "line is invalid"),
        ];
        for (target, message) in cases {
            let resp = route(&s, "GET", &target, b"").await;
            assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request", "{target}");
            let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
            assert_eq!(v["error"], message, "{target}");
        }

        let unknown = PICKLINE.replace("Ursa", "Pudge");
        let resp = route(&s, "GET", &format!("/owl-esports/pickline?line={unknown}&tg=7"), b"").await;
        assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pickline_queues_draft_for_chat() {
        let (s, mut rx) = state_with_bot();
        let resp = route(&s, "GET", &format!("/owl-esports/pickline?line={PICKLINE}&tg=-1001234"), b"").await;
        assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
        let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(v["message"], "Sending pick winrates to user");

        let req = rx.try_recv().unwrap();
        assert_eq!(req.chat_id, -1001234);
        assert_eq!(req.names.len(), 10);
        assert_eq!(req.names[6], "Shadow Fiend");
    }

    #[tokio::test]
    async fn pickline_without_bot_is_unavailable() {
        let s = state(true);
        let resp = route(&s, "GET", &format!("/owl-esports/pickline?line={PICKLINE}&tg=7"), b"").await;
        assert_eq!(resp.status_line, "HTTP/1.1 503 Service Unavailable");
    }

    #[tokio::test]
    async fn preflight_and_cors_headers() {
        let s = state(false);
        let resp = route(&s, "OPTIONS", "/owl-esports/pickline", b"").await;
        assert_eq!(resp.status_line, "HTTP/1.1 204 No Content");
        assert!(resp.body.is_empty());

        let out = render_response(&route(&s, "GET", "/health", b"").await);
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("\r\nAccess-Control-Allow-Origin: *\r\n"));
        assert!(out.ends_with("\r\n\r\nok"));
    }

    #[tokio::test]
    async fn predict_match_requires_url() {
        let s = state(true);
        let resp = route(&s, "GET", "/predict-match", b"").await;
        assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
    }

    #[test]
    fn query_param_is_decoded() {
        assert_eq!(
            query_param("url=https%3A%2F%2Fwww.dotabuff.com%2Fmatches%2F42&x=1", "url").as_deref(),
            Some("https://www.dotabuff.com/matches/42")
        );
        assert_eq!(query_param("x=1", "url"), None);
    }

    #[test]
    fn content_length_is_case_insensitive() {
        let raw = b"POST /x HTTP/1.1\r\ncontent-length: 12\r\n\r\n";
        let end = find_header_end(raw).unwrap();
        assert_eq!(end, raw.len());
        assert_eq!(content_length(&raw[..end]), 12);
    }
}
