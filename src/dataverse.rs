//! Dataverse Web API client.
//!
//! Implements [`EntityStore`] over the OData endpoints of a Dynamics 365 /
//! Dataverse organization, authenticated with a bearer token from
//! [`crate::auth::TokenProvider`].
//!
//! # Entity sets
//!
//! | Entity | Set | Key | Owner reference |
//! |--------|-----|-----|-----------------|
//! | Account | `accounts` | `accountid` | none |
//! | Invoice | `invoices` | `invoiceid` | `_customerid_value` |
//! | Attachment | `annotations` | `annotationid` | `_objectid_value` |
//!
//! # Requests
//!
//! - Create: `POST /{set}` with a JSON body. The store answers `204 No
//!   Content` and reports the new entity in the `OData-EntityId` header,
//!   e.g. `https://org.crm.dynamics.com/api/data/v9.2/accounts(<guid>)`.
//! - Query: `GET /{set}?$select=...&$filter=...`. String literals in filters
//!   are single-quoted with embedded quotes doubled (see [`odata_literal`]).
//!   Large result sets are followed through `@odata.nextLink`.
//! - Delete: `DELETE /{set}(<id>)`, answered with `204`.
//!
//! Requests are issued one at a time with no retry.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AccessToken;
use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};
use crate::models::{Account, Attachment, Invoice};
use crate::store::{EntityStore, INVOICE_NAME};

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for one Dataverse organization.
pub struct DataverseClient {
    client: reqwest::Client,
    base_url: String,
}

impl DataverseClient {
    /// Build a client for the configured organization.
    pub fn new(remote: &RemoteConfig, token: &AccessToken) -> Result<Self> {
        Self::with_base_url(&remote.api_base(), token, remote.timeout_secs)
    }

    /// Build a client against an explicit API base URL.
    pub fn with_base_url(
        base_url: &str,
        token: &AccessToken,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| SyncError::Auth("Invalid access token format".into()))?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("OData-MaxVersion", HeaderValue::from_static("4.0"));
        headers.insert("OData-Version", HeaderValue::from_static("4.0"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn entity_url(&self, set: &str, id: &str) -> String {
        format!("{}/{}({})", self.base_url, set, id)
    }

    /// `POST` a new entity and return its id from the `OData-EntityId` header.
    async fn create(&self, set: &str, operation: &str, payload: Value) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, set))
            .json(&payload)
            .send()
            .await?;
        let resp = check_status(resp, operation).await?;
        let status = resp.status();

        resp.headers()
            .get("OData-EntityId")
            .and_then(|v| v.to_str().ok())
            .and_then(entity_id_from_uri)
            .ok_or_else(|| {
                SyncError::remote(operation, status.as_u16(), "response carried no entity id")
            })
    }

    /// `GET` a collection, following `@odata.nextLink` until exhausted.
    async fn query<T: DeserializeOwned>(
        &self,
        set: &str,
        operation: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut request = self
            .client
            .get(format!("{}/{}", self.base_url, set))
            .query(params);

        loop {
            let resp = check_status(request.send().await?, operation).await?;
            let page: Page<T> = serde_json::from_str(&resp.text().await?)?;
            rows.extend(page.value);

            match page.next_link {
                Some(next) => request = self.client.get(next),
                None => break,
            }
        }

        Ok(rows)
    }

    async fn delete(&self, set: &str, id: &str, operation: &str) -> Result<()> {
        let resp = self.client.delete(self.entity_url(set, id)).send().await?;
        check_status(resp, operation).await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for DataverseClient {
    async fn create_account(&self, name: &str, description: &str) -> Result<String> {
        let payload = json!({ "name": name, "description": description });
        self.create("accounts", "create account", payload).await
    }

    async fn create_invoice(&self, account_id: &str, amount: f64) -> Result<String> {
        let payload = json!({
            "name": INVOICE_NAME,
            "totalamount": amount,
            "customerid_account@odata.bind": format!("/accounts({})", account_id),
        });
        self.create("invoices", "create invoice", payload).await
    }

    async fn create_attachment(
        &self,
        account_id: &str,
        filename: &str,
        body: &[u8],
    ) -> Result<String> {
        let payload = json!({
            "subject": "Vendor Agreement",
            "notetext": format!("Auto-uploaded: {}", filename),
            "filename": filename,
            "documentbody": base64::engine::general_purpose::STANDARD.encode(body),
            "mimetype": detect_mime_type(filename),
            "objectid_account@odata.bind": format!("/accounts({})", account_id),
        });
        self.create("annotations", "create attachment", payload).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let params = [("$select", "accountid,name,description".to_string())];
        let rows: Vec<AccountRow> = self.query("accounts", "list accounts", &params).await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn find_accounts_by_name(&self, name: &str) -> Result<Vec<Account>> {
        let params = [
            ("$select", "accountid,name,description".to_string()),
            ("$filter", format!("name eq {}", odata_literal(name))),
        ];
        let rows: Vec<AccountRow> = self.query("accounts", "query accounts", &params).await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn invoices_for_account(&self, account_id: &str) -> Result<Vec<Invoice>> {
        let params = [
            ("$select", "invoiceid,totalamount,_customerid_value".to_string()),
            (
                "$filter",
                format!("_customerid_value eq {}", odata_literal(account_id)),
            ),
        ];
        let rows: Vec<InvoiceRow> = self.query("invoices", "query invoices", &params).await?;
        Ok(rows
            .into_iter()
            .map(|row| Invoice {
                id: row.invoiceid,
                account_id: row.customer_id.unwrap_or_else(|| account_id.to_string()),
                amount: row.totalamount,
            })
            .collect())
    }

    async fn attachments_for_account(&self, account_id: &str) -> Result<Vec<Attachment>> {
        let params = [
            (
                "$select",
                "annotationid,filename,documentbody,_objectid_value".to_string(),
            ),
            (
                "$filter",
                format!(
                    "_objectid_value eq {} and isdocument eq true",
                    odata_literal(account_id)
                ),
            ),
        ];
        let rows: Vec<AnnotationRow> = self
            .query("annotations", "query attachments", &params)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_attachment(account_id))
            .collect())
    }

    async fn delete_invoice(&self, invoice_id: &str) -> Result<()> {
        self.delete("invoices", invoice_id, "delete invoice").await
    }

    async fn delete_account(&self, account_id: &str) -> Result<()> {
        self.delete("accounts", account_id, "delete account").await
    }
}

// ============ Wire types ============

#[derive(Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct AccountRow {
    accountid: String,
    name: Option<String>,
    description: Option<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.accountid,
            name: row.name.unwrap_or_default(),
            description: row.description,
        }
    }
}

#[derive(Deserialize)]
struct InvoiceRow {
    invoiceid: String,
    totalamount: Option<f64>,
    #[serde(rename = "_customerid_value")]
    customer_id: Option<String>,
}

#[derive(Deserialize)]
struct AnnotationRow {
    annotationid: String,
    filename: Option<String>,
    documentbody: Option<String>,
    #[serde(rename = "_objectid_value")]
    object_id: Option<String>,
}

impl AnnotationRow {
    fn into_attachment(self, account_id: &str) -> Attachment {
        let body = self.documentbody.as_deref().and_then(|encoded| {
            match base64::engine::general_purpose::STANDARD.decode(encoded) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(
                        annotation = %self.annotationid,
                        error = %e,
                        "attachment body is not valid base64"
                    );
                    None
                }
            }
        });
        Attachment {
            id: self.annotationid,
            account_id: self.object_id.unwrap_or_else(|| account_id.to_string()),
            filename: self.filename.unwrap_or_default(),
            body,
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// ============ Helpers ============

/// Turn a non-success response into [`SyncError::Remote`].
async fn check_status(resp: Response, operation: &str) -> Result<Response> {
    let status = resp.status();
    tracing::debug!(operation, %status, "entity API responded");
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::remote(
        operation,
        status.as_u16(),
        error_message(status, &body),
    ))
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Quote a string for an OData `$filter`, doubling embedded single quotes.
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Extract the key from an entity URI such as `.../accounts(1234-abcd)`.
pub fn entity_id_from_uri(uri: &str) -> Option<String> {
    let open = uri.rfind('(')?;
    let close = uri[open..].find(')')? + open;
    let id = &uri[open + 1..close];
    (!id.is_empty()).then(|| id.to_string())
}

/// MIME type sent with uploaded documents.
fn detect_mime_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
