//! In-memory stand-in for the lexoffice endpoints used by `lexoffice-core`.
//!
//! Contacts and invoices are stored as raw JSON so the mock stays independent
//! of the client's DTOs. Error responses use the same two body shapes as the
//! real API: the legacy `IssueList` shape for contacts and files, the regular
//! `details` shape for invoices.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const TIMESTAMP: &str = "2023-06-29T15:15:09.447+02:00";
pub const ORGANIZATION_ID: &str = "aa93e8a8-2aa3-470b-b914-caad8a255dd8";

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Bearer token every request must carry. `None` accepts anything.
    pub token: Option<String>,
    /// Contacts per page when the request has no `size`.
    pub page_size: usize,
    /// Number of upcoming requests answered with 429.
    pub rate_limit_hits: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            token: None,
            page_size: 25,
            rate_limit_hits: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub file_name: String,
    pub kind: String,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
pub struct MockState {
    token: Option<String>,
    page_size: usize,
    rate_limit_hits: AtomicU32,
    requests: AtomicUsize,
    next_number: AtomicU64,
    contacts: RwLock<Vec<Value>>,
    invoices: RwLock<Vec<Value>>,
    files: RwLock<Vec<UploadedFile>>,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            token: config.token,
            page_size: config.page_size.max(1),
            rate_limit_hits: AtomicU32::new(config.rate_limit_hits),
            requests: AtomicUsize::new(0),
            next_number: AtomicU64::new(0),
            contacts: RwLock::new(Vec::new()),
            invoices: RwLock::new(Vec::new()),
            files: RwLock::new(Vec::new()),
        }
    }

    pub fn set_rate_limit_hits(&self, hits: u32) {
        self.rate_limit_hits.store(hits, Ordering::SeqCst);
    }

    /// Requests that reached the mock, rejected ones included.
    pub fn requests_served(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn contact_count(&self) -> usize {
        self.contacts.read().await.len()
    }

    pub async fn uploaded_files(&self) -> Vec<UploadedFile> {
        self.files.read().await.clone()
    }

    fn take_rate_limit_hit(&self) -> bool {
        self.rate_limit_hits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |hits| hits.checked_sub(1))
            .is_ok()
    }

    fn next_number(&self) -> u64 {
        self.next_number.fetch_add(1, Ordering::SeqCst)
    }
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    router(Arc::new(MockState::new(config)))
}

/// Router over caller-owned state, so tests can inspect it afterwards.
pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/v1/contacts", get(list_contacts).post(create_contact))
        .route("/v1/contacts/", post(create_contact))
        .route("/v1/contacts/{id}", get(get_contact).put(update_contact))
        .route("/v1/invoices", post(create_invoice))
        .route("/v1/invoices/{id}", get(get_invoice))
        .route("/v1/files", post(upload_file))
        .route("/v1/files/", post(upload_file))
        .layer(middleware::from_fn_with_state(state.clone(), guard))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, state: Arc<MockState>) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

type Shared = State<Arc<MockState>>;

/// Bearer auth, then the configured rate limit.
async fn guard(State(state): Shared, request: Request, next: Next) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    debug!(method = %request.method(), uri = %request.uri(), "mock request");

    if let Some(token) = &state.token {
        let expected = format!("Bearer {token}");
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response();
        }
    }

    if state.take_rate_limit_hit() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": 429,
                "error": "Too Many Requests",
                "message": "Rate limit exceeded"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

// --- error bodies ---

struct Detail {
    violation: &'static str,
    field: String,
    message: &'static str,
}

impl Detail {
    fn not_null(field: impl Into<String>) -> Self {
        Self {
            violation: "NOTNULL",
            field: field.into(),
            message: "darf nicht leer sein",
        }
    }
}

fn legacy_error(status: StatusCode, issues: &[(&str, &str, &str)]) -> Response {
    let issues: Vec<Value> = issues
        .iter()
        .map(|(key, source, kind)| json!({"i18nKey": key, "source": source, "type": kind}))
        .collect();
    (status, Json(json!({"requestId": Uuid::new_v4(), "IssueList": issues}))).into_response()
}

fn regular_error(status: StatusCode, path: &str, message: &str, details: &[Detail]) -> Response {
    let mut trace_id = Uuid::new_v4().simple().to_string();
    trace_id.truncate(12);
    let mut body = json!({
        "timestamp": TIMESTAMP,
        "status": status.as_u16(),
        "error": status.canonical_reason().unwrap_or_default(),
        "path": path,
        "traceId": trace_id,
        "message": message,
    });
    if !details.is_empty() {
        body["details"] = details
            .iter()
            .map(|d| json!({"violation": d.violation, "field": d.field, "message": d.message}))
            .collect();
    }
    (status, Json(body)).into_response()
}

fn reference(collection: &str, id: &str, version: i64) -> Value {
    json!({
        "id": id,
        "resourceUri": format!("https://api.lexoffice.io/v1/{collection}/{id}"),
        "createdDate": TIMESTAMP,
        "updatedDate": TIMESTAMP,
        "version": version
    })
}

fn non_blank<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn present<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key).filter(|value| !value.is_null())
}

// --- contacts ---

#[derive(Debug, Deserialize)]
struct PageParams {
    #[serde(default)]
    page: usize,
    size: Option<usize>,
}

async fn list_contacts(State(state): Shared, Query(params): Query<PageParams>) -> Json<Value> {
    let contacts = state.contacts.read().await;
    let size = params.size.unwrap_or(state.page_size).max(1);
    let total = contacts.len();
    let total_pages = total.div_ceil(size);
    let content: Vec<Value> = contacts
        .iter()
        .skip(params.page.saturating_mul(size))
        .take(size)
        .cloned()
        .collect();
    let number_of_elements = content.len();

    Json(json!({
        "content": content,
        "first": params.page == 0,
        "last": params.page + 1 >= total_pages,
        "totalPages": total_pages,
        "totalElements": total,
        "numberOfElements": number_of_elements,
        "size": size,
        "number": params.page,
        "sort": [{
            "property": "name",
            "direction": "ASC",
            "ignoreCase": true,
            "nullHandling": "NATIVE",
            "ascending": true
        }]
    }))
}

fn contact_issues(body: &Value) -> Vec<(&'static str, &'static str, &'static str)> {
    let mut issues = Vec::new();
    let has_role = present(body, "roles")
        .is_some_and(|roles| present(roles, "customer").is_some() || present(roles, "vendor").is_some());
    if !has_role {
        issues.push(("missing_entity", "roles", "validation_failure"));
    }
    match (present(body, "company"), present(body, "person")) {
        (Some(_), Some(_)) => issues.push(("invalid_value", "company and person", "validation_failure")),
        (None, None) => issues.push(("missing_entity", "company and person", "validation_failure")),
        (Some(_), None) if non_blank(body, "/company/name").is_none() => {
            issues.push(("missing_entity", "company.name", "validation_failure"));
        }
        (None, Some(_)) if non_blank(body, "/person/lastName").is_none() => {
            issues.push(("missing_entity", "person.lastName", "validation_failure"));
        }
        _ => {}
    }
    issues
}

/// Give every role without a number the next free one.
fn assign_role_numbers(state: &MockState, body: &mut Value) {
    for (role, base) in [("customer", 10_000), ("vendor", 70_000)] {
        if let Some(role) = body.pointer_mut(&format!("/roles/{role}")) {
            if role.is_object() && role.get("number").is_none() {
                role["number"] = json!(base + state.next_number());
            }
        }
    }
}

async fn create_contact(State(state): Shared, Json(mut body): Json<Value>) -> Response {
    let issues = contact_issues(&body);
    if !issues.is_empty() {
        return legacy_error(StatusCode::BAD_REQUEST, &issues);
    }

    let id = Uuid::new_v4().to_string();
    assign_role_numbers(&state, &mut body);
    body["id"] = json!(id);
    body["organizationId"] = json!(ORGANIZATION_ID);
    body["version"] = json!(0);
    state.contacts.write().await.push(body);

    info!(%id, "contact created");
    (StatusCode::OK, Json(reference("contacts", &id, 0))).into_response()
}

async fn get_contact(State(state): Shared, Path(id): Path<String>) -> Response {
    let contacts = state.contacts.read().await;
    match contacts.iter().find(|contact| contact["id"] == id.as_str()) {
        Some(contact) => Json(contact.clone()).into_response(),
        None => legacy_error(StatusCode::NOT_FOUND, &[("missing_entity", "id", "not_found")]),
    }
}

async fn update_contact(State(state): Shared, Path(id): Path<String>, Json(mut body): Json<Value>) -> Response {
    let mut contacts = state.contacts.write().await;
    let Some(stored) = contacts.iter_mut().find(|contact| contact["id"] == id.as_str()) else {
        return legacy_error(StatusCode::NOT_FOUND, &[("missing_entity", "id", "not_found")]);
    };

    let current = stored["version"].as_i64().unwrap_or_default();
    if body.get("version").and_then(Value::as_i64) != Some(current) {
        return legacy_error(StatusCode::CONFLICT, &[("conflict", "version", "optimistic_locking_failure")]);
    }
    let issues = contact_issues(&body);
    if !issues.is_empty() {
        return legacy_error(StatusCode::BAD_REQUEST, &issues);
    }

    assign_role_numbers(&state, &mut body);
    body["id"] = json!(id);
    body["organizationId"] = json!(ORGANIZATION_ID);
    body["version"] = json!(current + 1);
    *stored = body;

    Json(reference("contacts", &id, current + 1)).into_response()
}

// --- invoices ---

#[derive(Debug, Deserialize)]
struct FinalizeParams {
    #[serde(default)]
    finalize: bool,
}

fn invoice_details(body: &Value) -> Vec<Detail> {
    let mut details = Vec::new();
    if non_blank(body, "/voucherDate").is_none() {
        details.push(Detail::not_null("voucherDate"));
    }
    match body.get("lineItems").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => {
            for (index, item) in items.iter().enumerate() {
                if item["type"] == "text" {
                    continue;
                }
                match present(item, "unitPrice") {
                    None => details.push(Detail::not_null(format!("lineItems[{index}].unitPrice"))),
                    Some(price) if present(price, "taxRatePercentage").is_none() => details.push(
                        Detail::not_null(format!("lineItems[{index}].unitPrice.taxRatePercentage")),
                    ),
                    Some(_) => {}
                }
            }
        }
        _ => details.push(Detail::not_null("lineItems")),
    }
    details
}

async fn create_invoice(
    State(state): Shared,
    Query(params): Query<FinalizeParams>,
    Json(mut body): Json<Value>,
) -> Response {
    const PATH: &str = "/v1/invoices";

    if body.get("voucherStatus").is_some() {
        return regular_error(
            StatusCode::BAD_REQUEST,
            PATH,
            "Unrecognized field \"voucherStatus\"",
            &[],
        );
    }
    let details = invoice_details(&body);
    if !details.is_empty() {
        return regular_error(
            StatusCode::NOT_ACCEPTABLE,
            PATH,
            "Validation failed for request. Please see details list for specific causes.",
            &details,
        );
    }

    let id = Uuid::new_v4().to_string();
    body["id"] = json!(id);
    body["organizationId"] = json!(ORGANIZATION_ID);
    body["version"] = json!(0);
    body["createdDate"] = json!(TIMESTAMP);
    body["updatedDate"] = json!(TIMESTAMP);
    if params.finalize {
        body["voucherStatus"] = json!("open");
        body["voucherNumber"] = json!(format!("RE{}", 1000 + state.next_number()));
    } else {
        body["voucherStatus"] = json!("draft");
    }
    state.invoices.write().await.push(body);

    info!(%id, finalize = params.finalize, "invoice created");
    (StatusCode::CREATED, Json(reference("invoices", &id, 0))).into_response()
}

async fn get_invoice(State(state): Shared, Path(id): Path<String>) -> Response {
    let invoices = state.invoices.read().await;
    match invoices.iter().find(|invoice| invoice["id"] == id.as_str()) {
        Some(invoice) => Json(invoice.clone()).into_response(),
        None => regular_error(
            StatusCode::NOT_FOUND,
            &format!("/v1/invoices/{id}"),
            "Requested resource does not exist.",
            &[],
        ),
    }
}

// --- files ---

async fn upload_file(State(state): Shared, mut multipart: Multipart) -> Response {
    let mut file = None;
    let mut kind = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return legacy_error(StatusCode::BAD_REQUEST, &[("invalid_value", "body", "validation_failure")]),
        };
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, bytes.to_vec())),
                    Err(_) => return legacy_error(StatusCode::BAD_REQUEST, &[("invalid_value", "file", "validation_failure")]),
                }
            }
            Some("type") => match field.text().await {
                Ok(text) => kind = Some(text),
                Err(_) => return legacy_error(StatusCode::BAD_REQUEST, &[("invalid_value", "type", "validation_failure")]),
            },
            _ => {}
        }
    }

    let Some((file_name, contents)) = file else {
        return legacy_error(StatusCode::NOT_ACCEPTABLE, &[("missing_entity", "file", "validation_failure")]);
    };
    let Some(kind) = kind else {
        return legacy_error(StatusCode::NOT_ACCEPTABLE, &[("missing_entity", "type", "validation_failure")]);
    };

    let id = Uuid::new_v4().to_string();
    info!(%id, %file_name, size = contents.len(), "file uploaded");
    state.files.write().await.push(UploadedFile {
        id: id.clone(),
        file_name,
        kind,
        contents,
    });
    (StatusCode::ACCEPTED, Json(json!({"id": id}))).into_response()
}
