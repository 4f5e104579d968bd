//! In-process fake registry and relay
//!
//! One axum server on `127.0.0.1:0` serves both APIs. Every request is
//! recorded so tests can assert on headers, form fields and multipart parts.
//! Reply statuses are scripted per test; once the script runs out the reply
//! endpoint answers 404.

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequest, Multipart, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const REPORT_ID: i64 = 555;

#[derive(Debug, Clone)]
pub struct RecordedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub path: String,
    pub user_agent: Option<String>,
    pub authorization: Option<String>,
    pub fields: HashMap<String, String>,
    pub files: Vec<RecordedFile>,
    pub json: Option<Value>,
}

impl RecordedRequest {
    /// Parse a form field holding a JSON document
    pub fn json_field(&self, name: &str) -> Value {
        serde_json::from_str(&self.fields[name]).unwrap()
    }
}

pub struct FakeServices {
    replies: Mutex<VecDeque<(u16, Value)>>,
    requests: Mutex<Vec<RecordedRequest>>,
    values: Value,
    relay_response: Mutex<(u16, Value)>,
}

impl FakeServices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            values: json!({
                "groups": {"0": "None", "48": "ZTF", "66": "SAGUARO"},
                "filters": {"21": "g-Sloan", "22": "r-Sloan"},
                "instruments": {"0": "Other", "172": "LCO1m - Sinistro"},
                "object_types": {"1": "SN", "3": "SN Ia"},
                "spectra_types": ["Object", "Host", "Sky"],
                "at_types": ["Other", "PSN", "PNV"],
                "archives": {"1": "DSS", "2": "SDSS"},
                "units": {"1": "ABMag", "3": "VegaMag"}
            }),
            relay_response: Mutex::new((200, json!({}))),
        })
    }

    /// Queue reply endpoint responses, answered in order
    pub fn script_replies(&self, replies: impl IntoIterator<Item = (u16, Value)>) {
        self.replies.lock().unwrap().extend(replies);
    }

    pub fn set_relay_response(&self, status: u16, body: Value) {
        *self.relay_response.lock().unwrap() = (status, body);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    fn record(&self, request: RecordedRequest) {
        self.requests.lock().unwrap().push(request);
    }

    /// Start serving; returns the server root URL (`http://127.0.0.1:<port>`)
    pub async fn spawn(self: &Arc<Self>) -> String {
        let app = Router::new()
            .route("/api/values/", get(values))
            .route("/api/file-upload", post(file_upload))
            .route("/api/bulk-report", post(bulk_report))
            .route("/api/bulk-report-reply", post(bulk_report_reply))
            .route("/api/v0/submit_message/", post(relay_submit))
            .with_state(Arc::clone(self));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }
}

/// A reply body carrying `feedback`
pub fn feedback_reply(feedback: Value) -> Value {
    json!({ "data": { "feedback": feedback } })
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn base_record(path: &str, headers: &HeaderMap) -> RecordedRequest {
    RecordedRequest {
        path: path.to_string(),
        user_agent: header_value(headers, header::USER_AGENT),
        authorization: header_value(headers, header::AUTHORIZATION),
        ..Default::default()
    }
}

async fn read_multipart(mut multipart: Multipart, record: &mut RecordedRequest) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        match file_name {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let contents = field.bytes().await.unwrap().to_vec();
                record.files.push(RecordedFile {
                    field: name,
                    file_name,
                    content_type,
                    contents,
                });
            }
            None => {
                let text = field.text().await.unwrap();
                record.fields.insert(name, text);
            }
        }
    }
}

async fn values(
    State(state): State<Arc<FakeServices>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let record = base_record("/api/values/", &headers);
    let browser = record
        .user_agent
        .as_deref()
        .map(|ua| ua.starts_with("Mozilla/5.0"))
        .unwrap_or(false);
    state.record(record);

    if !browser {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "Forbidden"})));
    }
    (StatusCode::OK, Json(json!({ "data": state.values })))
}

async fn file_upload(
    State(state): State<Arc<FakeServices>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Json<Value> {
    let mut record = base_record("/api/file-upload", &headers);
    read_multipart(multipart, &mut record).await;

    let names: Vec<String> = record
        .files
        .iter()
        .map(|f| format!("srv_{}", f.file_name))
        .collect();
    state.record(record);

    Json(json!({ "data": names }))
}

async fn bulk_report(
    State(state): State<Arc<FakeServices>>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Json<Value> {
    let mut record = base_record("/api/bulk-report", &headers);
    record.fields = fields;
    state.record(record);

    Json(json!({ "data": { "report_id": REPORT_ID } }))
}

async fn bulk_report_reply(
    State(state): State<Arc<FakeServices>>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let mut record = base_record("/api/bulk-report-reply", &headers);
    record.fields = fields;
    state.record(record);

    let (status, body) = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((404, json!({"message": "Report not processed yet"})));
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn relay_submit(
    State(state): State<Arc<FakeServices>>,
    request: Request<Body>,
) -> (StatusCode, Json<Value>) {
    let headers = request.headers().clone();
    let mut record = base_record("/api/v0/submit_message/", &headers);

    let is_multipart = header_value(&headers, header::CONTENT_TYPE)
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);
    if is_multipart {
        let multipart = Multipart::from_request(request, &()).await.unwrap();
        read_multipart(multipart, &mut record).await;
    } else {
        let bytes = to_bytes(request.into_body(), usize::MAX).await.unwrap();
        record.json = serde_json::from_slice(&bytes).ok();
    }
    state.record(record);

    let (status, body) = state.relay_response.lock().unwrap().clone();
    (StatusCode::from_u16(status).unwrap(), Json(body))
}
