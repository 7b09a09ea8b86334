//! In-memory fakes for detector and monitor tests, plus a loopback HTTP
//! stub for the request-building code.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::api::{self, CampaignApi, Endpoint, REQUEST_TIMEOUT, StreamItem};
use crate::error::ApiError;
use crate::messages::CampaignContext;
use crate::notify::Notifier;
use crate::store::StateStore;
use crate::types::{Account, Campaign, Notification, Perk};

/// RFC 3339 rendering of an epoch timestamp.
pub fn iso(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0).unwrap().to_rfc3339()
}

pub fn comment(id: u64, ts: i64) -> Value {
    json!({
        "id": id,
        "text": format!("comment {id}"),
        "created_at": iso(ts),
        "account": {"avatar_url": format!("https://example.com/avatar/{id}.png")}
    })
}

pub fn contribution(id: u64, ts: i64) -> Value {
    json!({
        "id": id,
        "by": format!("backer {id}"),
        "amount": 50,
        "created_at": iso(ts),
        "perk": {"label": "Early Bird"}
    })
}

pub fn campaign(goal: u64, collected: u64) -> Value {
    json!({
        "id": 1234,
        "title": "Smart Mug",
        "slug": "smart-mug",
        "goal": goal,
        "collected_funds": collected,
        "preview_url": "https://example.com/preview",
        "thumbnail_image_url": "https://example.com/thumb.jpg"
    })
}

pub fn perk(id: u64, claimed: u32, available: Option<u32>) -> Value {
    json!({
        "id": id,
        "label": format!("Perk {id}"),
        "number_claimed": claimed,
        "number_available": available
    })
}

pub fn context() -> CampaignContext {
    CampaignContext {
        campaign_id: 1234,
        slug: "smart-mug".into(),
        account_id: 77,
        preview_url: "https://example.com/preview".into(),
        thumbnail_url: "https://example.com/thumb.jpg".into(),
    }
}

/// Store in a fresh temp directory. Keep the `TempDir` alive for the test.
pub fn temp_store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(&dir.path().join("data.json")).unwrap();
    (dir, store)
}

/// Canned API: pages are served in order, anything past the last page is
/// empty. Endpoints listed in `failing` return a 500.
#[derive(Default)]
pub struct FakeApi {
    pub campaign: Value,
    pub perks: Value,
    pub comments: Vec<Vec<Value>>,
    pub contributions: Vec<Vec<Value>>,
    pub failing: HashSet<Endpoint>,
    pub requests: RefCell<Vec<(Endpoint, u32)>>,
}

impl FakeApi {
    fn serve<T: DeserializeOwned>(&self, endpoint: Endpoint, page: u32, body: Value) -> Result<T, ApiError> {
        self.requests.borrow_mut().push((endpoint, page));
        if self.failing.contains(&endpoint) {
            return Err(ApiError::Status {
                endpoint: endpoint.name().to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        serde_json::from_value(body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.name().to_string(),
            source,
        })
    }

    pub fn pages_requested(&self, endpoint: Endpoint) -> Vec<u32> {
        self.requests
            .borrow()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, p)| *p)
            .collect()
    }
}

impl CampaignApi for FakeApi {
    async fn campaign(&self) -> Result<Campaign, ApiError> {
        self.serve(Endpoint::Campaign, 0, self.campaign.clone())
    }

    async fn perks(&self) -> Result<Vec<Perk>, ApiError> {
        self.serve(Endpoint::Perks, 0, self.perks.clone())
    }

    async fn fetch_page<T: StreamItem>(&self, page: u32) -> Result<Vec<T>, ApiError> {
        let pages = match T::ENDPOINT {
            Endpoint::Comments => &self.comments,
            Endpoint::Contributions => &self.contributions,
            _ => unreachable!("not a stream endpoint"),
        };
        let items = pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        self.serve(T::ENDPOINT, page, Value::Array(items))
    }

    async fn current_account(&self) -> Result<Account, ApiError> {
        self.serve(Endpoint::Me, 0, json!({"id": 77}))
    }
}

/// Notifier that keeps everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<&'static str> {
        self.sent.borrow().iter().map(|n| n.trigger.event).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .map(|n| n.trigger.text.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) {
        self.sent.borrow_mut().push(notification.clone());
    }
}

/// Client with the production timeout that ignores proxy environment
/// variables, so stub traffic stays on loopback.
pub fn client() -> reqwest::Client {
    api::client_builder(REQUEST_TIMEOUT).no_proxy().build().unwrap()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// e.g. `GET /1.1/me.json?api_token=t HTTP/1.1`
    pub request_line: String,
    pub body: String,
}

/// One-shot-per-connection HTTP/1.1 server on 127.0.0.1. Records every
/// request and answers each with the same canned status and body.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    connections: Arc<AtomicUsize>,
}

impl StubServer {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        Self::spawn(Some((status, body.into()))).await
    }

    /// Accepts connections but never answers.
    pub async fn silent() -> Self {
        Self::spawn(None).await
    }

    async fn spawn(reply: Option<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let (recorded, accepted) = (requests.clone(), connections.clone());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                let Some((status, body)) = &reply else {
                    held.push(socket);
                    continue;
                };
                if let Some(request) = read_request(&mut socket).await {
                    recorded.lock().unwrap().push(request);
                }
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            url,
            requests,
            connections,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(head_end + content_length);

    Some(RecordedRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[head_end..body_end]).into_owned(),
    })
}
