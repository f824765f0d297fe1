//! Token exchange and entity API calls against a local fake server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};

use vendor_sync::auth::{AccessToken, TokenProvider};
use vendor_sync::config::{parse_config, RemoteConfig};
use vendor_sync::dataverse::DataverseClient;
use vendor_sync::error::SyncError;
use vendor_sync::store::EntityStore;

const ACCOUNT_ID: &str = "11111111-1111-1111-1111-111111111111";
const INVOICE_ID: &str = "22222222-2222-2222-2222-222222222222";

/// A request as the fake server saw it.
struct Seen {
    method: Method,
    path: String,
    params: HashMap<String, String>,
    auth: Option<String>,
    body: String,
}

struct Fake {
    base: String,
    seen: Mutex<Vec<Seen>>,
}

impl Fake {
    fn api(&self) -> String {
        format!("{}/api/data/v9.2", self.base)
    }

    fn take(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }
}

async fn token(body: String) -> Response {
    if body.contains("client_secret=bad") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })),
        )
            .into_response();
    }
    assert!(body.contains("grant_type=client_credentials"));
    Json(json!({ "access_token": "tok-123", "token_type": "Bearer", "expires_in": 3599 }))
        .into_response()
}

async fn api(
    State(fake): State<Arc<Fake>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().trim_start_matches("/api/data/v9.2/").to_string();
    fake.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        path: path.clone(),
        params: params.clone(),
        auth: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let created = |set: &str, id: &str| {
        (
            StatusCode::NO_CONTENT,
            [("OData-EntityId", format!("{}/{}({})", fake.api(), set, id))],
        )
            .into_response()
    };

    match (method, path.as_str()) {
        (Method::POST, "accounts") => created("accounts", ACCOUNT_ID),
        (Method::POST, "invoices") => created("invoices", INVOICE_ID),
        (Method::POST, "annotations") => StatusCode::NO_CONTENT.into_response(),
        (Method::GET, "accounts") if params.contains_key("$skiptoken") => Json(json!({
            "value": [{ "accountid": "a2", "name": "Bolt Supply", "description": null }]
        }))
        .into_response(),
        (Method::GET, "accounts") => Json(json!({
            "value": [{ "accountid": "a1", "name": "Apex Logistics", "description": "Vendor ID: 99" }],
            "@odata.nextLink": format!("{}/accounts?$skiptoken=2", fake.api())
        }))
        .into_response(),
        (Method::GET, "invoices") => Json(json!({
            "value": [
                { "invoiceid": "i1", "totalamount": 100.0, "_customerid_value": "a1" },
                { "invoiceid": "i2", "totalamount": null, "_customerid_value": "a1" }
            ]
        }))
        .into_response(),
        (Method::GET, "annotations") => Json(json!({
            "value": [
                {
                    "annotationid": "n1",
                    "filename": "Apex_Logistics_MSA.pdf",
                    "documentbody": base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.4"),
                    "_objectid_value": "a1"
                },
                {
                    "annotationid": "n2",
                    "filename": "corrupt.pdf",
                    "documentbody": "***",
                    "_objectid_value": "a1"
                }
            ]
        }))
        .into_response(),
        (Method::DELETE, "invoices(i1)") => StatusCode::NO_CONTENT.into_response(),
        (Method::DELETE, "accounts(a1)") => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": { "code": "0x80040237", "message": "The record is referenced by an invoice." }
            })),
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_fake() -> Arc<Fake> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fake = Arc::new(Fake {
        base: format!("http://{}", listener.local_addr().unwrap()),
        seen: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/tenant/oauth2/v2.0/token", post(token))
        .fallback(api)
        .with_state(fake.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    fake
}

fn remote_config(base: &str, secret: &str) -> RemoteConfig {
    parse_config(&format!(
        r#"
[remote]
resource_url = "{base}"
authority_host = "{base}"
tenant_id = "tenant"
client_id = "client"
client_secret = "{secret}"

[paths]
source_csv = "in.csv"
documents_dir = "docs"
output_csv = "out.csv"
output_documents_dir = "out"
"#
    ))
    .unwrap()
    .remote
}

async fn client(fake: &Fake) -> DataverseClient {
    let remote = remote_config(&fake.base, "good");
    let token = TokenProvider::new(&remote).acquire().await.unwrap();
    DataverseClient::new(&remote, &token).unwrap()
}

#[tokio::test]
async fn token_exchange_returns_bearer_token() {
    let fake = start_fake().await;
    let remote = remote_config(&fake.base, "good");
    let token = TokenProvider::new(&remote).acquire().await.unwrap();
    assert_eq!(token.as_str(), "tok-123");
}

#[tokio::test]
async fn rejected_credentials_surface_authority_message() {
    let fake = start_fake().await;
    let remote = remote_config(&fake.base, "bad");
    let err = TokenProvider::new(&remote).acquire().await.unwrap_err();
    match err {
        SyncError::Auth(message) => {
            assert_eq!(message, "AADSTS7000215: Invalid client secret provided.")
        }
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_reads_id_from_entity_header() {
    let fake = start_fake().await;
    let client = client(&fake).await;

    let account = client
        .create_account("Apex Logistics", "Vendor ID: 99")
        .await
        .unwrap();
    assert_eq!(account, ACCOUNT_ID);

    let invoice = client.create_invoice(&account, 150_000_000.0).await.unwrap();
    assert_eq!(invoice, INVOICE_ID);

    let seen = fake.take();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].path, "accounts");
    assert_eq!(seen[0].auth.as_deref(), Some("Bearer tok-123"));
    assert_eq!(seen[1].path, "invoices");

    let payload: Value = serde_json::from_str(&seen[1].body).unwrap();
    assert_eq!(payload["totalamount"], json!(150_000_000.0));
    assert_eq!(
        payload["customerid_account@odata.bind"],
        json!(format!("/accounts({})", ACCOUNT_ID))
    );
}

#[tokio::test]
async fn create_without_entity_header_is_an_error() {
    let fake = start_fake().await;
    let client = client(&fake).await;

    let err = client
        .create_attachment(ACCOUNT_ID, "Apex_Logistics_MSA.pdf", b"%PDF")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Remote { status: 204, .. }));

    let seen = fake.take();
    let payload: Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(payload["documentbody"], json!("JVBERg=="));
    assert_eq!(payload["mimetype"], json!("application/pdf"));
}

#[tokio::test]
async fn list_accounts_follows_next_link() {
    let fake = start_fake().await;
    let client = client(&fake).await;

    let accounts = client.list_accounts().await.unwrap();
    let names: Vec<_> = accounts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Apex Logistics", "Bolt Supply"]);
    assert_eq!(accounts[0].description.as_deref(), Some("Vendor ID: 99"));
    assert_eq!(accounts[1].description, None);
    assert_eq!(fake.take().len(), 2);
}

#[tokio::test]
async fn name_filter_escapes_quotes() {
    let fake = start_fake().await;
    let client = client(&fake).await;

    client.find_accounts_by_name("O'Brien & Sons").await.unwrap();
    let seen = fake.take();
    assert_eq!(
        seen[0].params.get("$filter").map(String::as_str),
        Some("name eq 'O''Brien & Sons'")
    );
}

#[tokio::test]
async fn invoices_and_attachments_decode() {
    let fake = start_fake().await;
    let client = client(&fake).await;

    let invoices = client.invoices_for_account("a1").await.unwrap();
    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0].amount, Some(100.0));
    assert_eq!(invoices[1].amount, None);

    let attachments = client.attachments_for_account("a1").await.unwrap();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].body.as_deref(), Some(&b"%PDF-1.4"[..]));
    assert_eq!(attachments[1].body, None);

    let seen = fake.take();
    assert_eq!(
        seen[1].params.get("$filter").map(String::as_str),
        Some("_objectid_value eq 'a1' and isdocument eq true")
    );
}

#[tokio::test]
async fn delete_failure_carries_remote_message() {
    let fake = start_fake().await;
    let client = client(&fake).await;

    client.delete_invoice("i1").await.unwrap();
    let err = client.delete_account("a1").await.unwrap_err();
    match err {
        SyncError::Remote {
            status, message, ..
        } => {
            assert_eq!(status, 409);
            assert_eq!(message, "The record is referenced by an invoice.");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_token_header_is_rejected() {
    let token = AccessToken::new("bad\ntoken");
    let err = DataverseClient::with_base_url("http://127.0.0.1:1/api", &token, None)
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::Auth(_)));
}
