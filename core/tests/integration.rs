//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and talks to it over
//! real HTTP through the default `UreqTransport`, so request building,
//! transport, retry and response classification are exercised together.

use std::sync::Arc;
use std::time::Duration;

use lexoffice_core::http::JSON_CONTENT_TYPE;
use lexoffice_core::{
    ApiError, ClientConfig, Contact, HttpMethod, Invoice, InvoiceAddress, LexofficeClient,
    LineItem, RetryConfig, ShippingConditions, TaxConditions, TotalPrice, UnitPrice,
    VoucherStatus,
};
use mock_server::{MockConfig, MockState};

const TOKEN: &str = "integration-token";

/// Serve a fresh mock on a random port. Returns its base URL and state.
fn spawn(config: MockConfig) -> (String, Arc<MockState>) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = Arc::new(MockState::new(config));
    let served = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, served).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

fn spawn_default() -> (String, Arc<MockState>) {
    spawn(MockConfig {
        token: Some(TOKEN.to_string()),
        ..MockConfig::default()
    })
}

fn client(base_url: &str, retry: RetryConfig) -> LexofficeClient {
    LexofficeClient::with_config(
        ClientConfig::new(TOKEN)
            .with_base_url(base_url)
            .with_retry(retry),
    )
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::fixed(Duration::from_millis(1), max_retries)
}

fn invoice(status: Option<VoucherStatus>) -> Invoice {
    Invoice {
        voucher_status: status,
        voucher_date: "2023-02-22T00:00:00.000+01:00".to_string(),
        address: InvoiceAddress {
            name: Some("Beispiel GmbH".to_string()),
            country_code: Some("DE".to_string()),
            ..InvoiceAddress::default()
        },
        line_items: vec![LineItem::custom(
            "Consulting",
            2.0,
            "hours",
            UnitPrice::net("EUR", 100.0, 19.0),
        )],
        total_price: TotalPrice {
            currency: "EUR".to_string(),
            ..TotalPrice::default()
        },
        tax_conditions: TaxConditions {
            tax_type: "net".to_string(),
            ..TaxConditions::default()
        },
        shipping_conditions: ShippingConditions {
            shipping_type: "none".to_string(),
            ..ShippingConditions::default()
        },
        ..Invoice::default()
    }
}

// --- contacts ---

#[test]
fn contact_lifecycle() {
    let (url, state) = spawn_default();
    let client = client(&url, fast_retry(0));

    assert!(client.contacts().unwrap().is_empty());

    let created = client
        .create_contact(&Contact::person("Inge", "Musterfrau"))
        .unwrap();
    assert_eq!(created.version, 0);
    assert!(created.resource_uri.ends_with(&created.id));

    let mut contact = client.contact(&created.id).unwrap();
    assert_eq!(contact.id.as_deref(), Some(created.id.as_str()));
    assert_eq!(contact.display_name().as_deref(), Some("Inge Musterfrau"));
    assert!(contact.roles.customer.as_ref().unwrap().number.is_some());

    if let Some(person) = contact.person.as_mut() {
        person.last_name = "Schmidt".to_string();
    }
    let updated = client.update_contact(&created.id, &contact).unwrap();
    assert_eq!(updated.version, 1);

    let fetched = client.contact(&created.id).unwrap();
    assert_eq!(fetched.person.unwrap().last_name, "Schmidt");
    assert_eq!(fetched.version, Some(1));

    let err = client.update_contact(&created.id, &contact).unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(
        err.to_string(),
        "key: conflict (version): optimistic_locking_failure"
    );

    let all = client.contacts().unwrap();
    assert_eq!(all.len(), 1);
    assert!(state.requests_served() >= 7);
}

#[test]
fn contacts_walks_every_page_once() {
    let (url, state) = spawn(MockConfig {
        token: Some(TOKEN.to_string()),
        page_size: 2,
        ..MockConfig::default()
    });
    let client = client(&url, fast_retry(0));

    let names = ["Alpha", "Bravo", "Charlie", "Delta", "Echo"];
    for name in names {
        client.create_contact(&Contact::company(name)).unwrap();
    }

    let before = state.requests_served();
    let contacts = client.contacts().unwrap();
    assert_eq!(state.requests_served() - before, 3);

    let listed: Vec<_> = contacts.iter().filter_map(Contact::display_name).collect();
    assert_eq!(listed, names);
}

#[test]
fn contacts_page_reports_totals() {
    let (url, _) = spawn(MockConfig {
        token: Some(TOKEN.to_string()),
        page_size: 2,
        ..MockConfig::default()
    });
    let client = client(&url, fast_retry(0));
    for name in ["Alpha", "Bravo", "Charlie"] {
        client.create_contact(&Contact::company(name)).unwrap();
    }

    let page = client.contacts_page(1).unwrap();
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.total_elements, 3);
    assert_eq!(page.number, 1);
    assert!(page.last);
    assert_eq!(page.content.len(), 1);
}

#[test]
fn invalid_contact_reports_legacy_issue() {
    let (url, _) = spawn_default();
    let client = client(&url, fast_retry(0));

    let err = client.create_contact(&Contact::company("")).unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.to_string(),
        "key: missing_entity (company.name): validation_failure"
    );
}

#[test]
fn unknown_contact_is_not_found() {
    let (url, _) = spawn_default();
    let err = client(&url, fast_retry(0))
        .contact("00000000-0000-0000-0000-000000000000")
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.issues().len(), 1);
}

// --- invoices ---

#[test]
fn open_invoice_is_finalized() {
    let (url, _) = spawn_default();
    let client = client(&url, fast_retry(0));

    let created = client.create_invoice(&invoice(Some(VoucherStatus::Open))).unwrap();
    let fetched = client.invoice(&created.id).unwrap();
    assert_eq!(fetched.voucher_status, Some(VoucherStatus::Open));
    assert!(fetched.voucher_number.is_some());
    assert_eq!(fetched.line_items.len(), 1);
    assert_eq!(fetched.address.name.as_deref(), Some("Beispiel GmbH"));
}

#[test]
fn invoice_without_status_is_a_draft() {
    let (url, _) = spawn_default();
    let client = client(&url, fast_retry(0));

    let created = client.create_invoice(&invoice(None)).unwrap();
    let fetched = client.invoice(&created.id).unwrap();
    assert_eq!(fetched.voucher_status, Some(VoucherStatus::Draft));
    assert_eq!(fetched.voucher_number, None);
}

#[test]
fn invalid_invoice_lists_every_detail() {
    let (url, _) = spawn_default();
    let client = client(&url, fast_retry(0));

    let err = client.create_invoice(&Invoice::default()).unwrap_err();
    assert_eq!(err.status(), Some(406));
    assert_eq!(
        err.to_string(),
        "field: voucherDate (NOTNULL): darf nicht leer sein\n\
         field: lineItems (NOTNULL): darf nicht leer sein"
    );

    let mut priceless = invoice(None);
    priceless.line_items[0].unit_price = None;
    let err = client.create_invoice(&priceless).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field: lineItems[0].unitPrice (NOTNULL): darf nicht leer sein"
    );
}

#[test]
fn unknown_invoice_is_rejected_without_details() {
    let (url, _) = spawn_default();
    let err = client(&url, fast_retry(0)).invoice("nope").unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 404, .. }));
    assert_eq!(
        err.to_string(),
        "error: Requested resource does not exist. (404 Not Found)"
    );
}

// --- files ---

#[test]
fn upload_file_from_reader() {
    let (url, state) = spawn_default();
    let client = client(&url, fast_retry(0));

    let contents = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let file = client.upload_file(&contents[..], "receipt.pdf").unwrap();

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let uploaded = rt.block_on(state.uploaded_files());
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].id, file.id);
    assert_eq!(uploaded[0].file_name, "receipt.pdf");
    assert_eq!(uploaded[0].kind, "voucher");
    assert_eq!(uploaded[0].contents, contents);
}

#[test]
fn upload_file_from_path() {
    let (url, state) = spawn_default();
    let client = client(&url, fast_retry(0));

    let path = std::env::temp_dir().join(format!("lexoffice-upload-{}.pdf", std::process::id()));
    std::fs::write(&path, b"%PDF-1.4").unwrap();
    let result = client.upload_file_path(&path);
    std::fs::remove_file(&path).unwrap();
    result.unwrap();

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let uploaded = rt.block_on(state.uploaded_files());
    assert_eq!(uploaded[0].file_name, path.file_name().unwrap().to_str().unwrap());
}

// --- rate limiting ---

#[test]
fn two_rate_limits_are_retried_with_defaults() {
    let (url, state) = spawn_default();
    let client = client(&url, RetryConfig::default());
    let created = client.create_invoice(&invoice(None)).unwrap();

    state.set_rate_limit_hits(2);
    let fetched = client.invoice(&created.id).unwrap();
    assert_eq!(fetched.id.as_deref(), Some(created.id.as_str()));
}

#[test]
fn persistent_rate_limit_surfaces_the_message() {
    let (url, state) = spawn_default();
    let client = client(&url, fast_retry(4));
    let created = client.create_invoice(&invoice(None)).unwrap();

    state.set_rate_limit_hits(10);
    let before = state.requests_served();
    let err = client.invoice(&created.id).unwrap_err();
    assert_eq!(state.requests_served() - before, 5);
    assert!(err.is_rate_limited());
    assert!(err.to_string().contains("Rate limit exceeded"), "{err}");
}

#[test]
fn rate_limit_on_legacy_endpoint_keeps_the_status() {
    let (url, state) = spawn_default();
    state.set_rate_limit_hits(1);

    let err = client(&url, RetryConfig::no_retry()).contacts().unwrap_err();
    assert!(matches!(err, ApiError::EmptyIssueList { status: 429 }));
}

// --- auth and raw requests ---

#[test]
fn wrong_token_is_unauthorized() {
    let (url, _) = spawn_default();
    let client = LexofficeClient::with_config(
        ClientConfig::new("wrong")
            .with_base_url(&url)
            .with_retry(RetryConfig::no_retry()),
    );

    let err = client.contacts().unwrap_err();
    assert_eq!(err.status(), Some(401));

    let err = client.invoice("any").unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 401, ref message, .. } if message == "Unauthorized"));
}

#[test]
fn raw_send_returns_success_untouched() {
    let (url, _) = spawn_default();
    let client = client(&url, fast_retry(0));

    let response = client
        .send(HttpMethod::Get, "/v1/contacts?page=0&size=5", None, JSON_CONTENT_TYPE)
        .unwrap();
    assert_eq!(response.status, 200);
    let page: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(page["size"], 5);
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"), fast_retry(1))
        .contact("x")
        .unwrap_err();
    match err {
        ApiError::Transport(err) => assert!(err.retryable()),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[test]
fn undecodable_error_body_is_classified_not_retried() {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // One connection only. A second attempt would be refused once the
    // listener is dropped and surface as a transport error instead.
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 512];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 3\r\nconnection: close\r\n\r\n\xc3\x28}")
            .unwrap();
    });

    let err = client(&format!("http://{addr}"), fast_retry(3))
        .invoice("e9066f04")
        .unwrap_err();
    assert!(matches!(err, ApiError::DeserializationError(_)), "{err:?}");
}
