// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cloud Firestore over its REST API (v1).
//!
//! | Operation | Request |
//! |-----------|---------|
//! | add | `POST {documents}/{collection path}` with `{"fields": {...}}` |
//! | list page | `GET {documents}/{collection path}?pageSize=N&pageToken=T` |
//!
//! where `{documents}` is `v1/projects/{project}/databases/{database}/documents`.
//! Field values use Firestore's tagged encoding (`stringValue`,
//! `timestampValue`, ...).

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use super::{
    CollectionPath, Document, DocumentPage, DocumentStore, FieldValue, Fields, StoreError,
    StoreResult,
};
use crate::credentials::TokenSource;

pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/";

/// Firestore caps `pageSize` at 300 for this call.
const DEFAULT_PAGE_SIZE: u32 = 300;

/// Firestore document store.
pub struct FirestoreStore {
    client: reqwest::Client,
    documents_url: Url,
    tokens: TokenSource,
    page_size: u32,
}

impl FirestoreStore {
    /// Service root: the emulator over plain HTTP when `emulator_host`
    /// (`host:port`) is given, the production endpoint otherwise.
    pub fn endpoint(emulator_host: Option<&str>) -> StoreResult<Url> {
        let raw = match emulator_host {
            Some(host) => format!("http://{}/", host.trim_end_matches('/')),
            None => FIRESTORE_ENDPOINT.to_string(),
        };
        Url::parse(&raw).map_err(|e| StoreError::InvalidResponse(format!("bad endpoint {raw}: {e}")))
    }

    pub fn new(
        client: reqwest::Client,
        endpoint: Url,
        project_id: &str,
        database: &str,
        tokens: TokenSource,
    ) -> StoreResult<Self> {
        let mut documents_url = endpoint;
        documents_url
            .path_segments_mut()
            .map_err(|_| StoreError::InvalidResponse("endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["v1", "projects", project_id, "databases", database, "documents"]);

        Ok(Self {
            client,
            documents_url,
            tokens,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn documents_url(&self) -> &Url {
        &self.documents_url
    }

    /// Fetch a token to prove the credentials work.
    pub async fn connect(&self) -> StoreResult<()> {
        self.tokens.access_token().await?;
        Ok(())
    }

    fn collection_url(&self, collection: &CollectionPath) -> Url {
        let mut url = self.documents_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(collection.segments());
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<Value> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<String> {
        let body = json!({ "fields": encode_fields(&fields) });
        let created = self
            .send(self.client.post(self.collection_url(collection)).json(&body))
            .await?;
        let created: RestDocument = serde_json::from_value(created)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(document_id(&created.name).to_string())
    }

    async fn list_page(
        &self,
        collection: &CollectionPath,
        page_token: Option<&str>,
    ) -> StoreResult<DocumentPage> {
        let mut request = self
            .client
            .get(self.collection_url(collection))
            .query(&[("pageSize", self.page_size.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let page: ListDocumentsResponse = serde_json::from_value(self.send(request).await?)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        let documents = page
            .documents
            .into_iter()
            .map(RestDocument::into_document)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(DocumentPage {
            documents,
            next_page_token: page.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RestDocument {
    fn into_document(self) -> StoreResult<Document> {
        let id = document_id(&self.name).to_string();
        let fields = decode_fields(&self.fields).map_err(|reason| StoreError::Malformed {
            id: id.clone(),
            reason,
        })?;
        Ok(Document { id, fields })
    }
}

/// Last segment of a resource name
/// (`projects/p/databases/d/documents/users/u1/books/{id}`).
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Pull `error.message` out of a Google API error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

pub(crate) fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(t) => {
            json!({ "timestampValue": t.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
        FieldValue::Array(values) => {
            json!({ "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub(crate) fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, String> {
    fields
        .iter()
        .map(|(name, value)| {
            decode_value(value)
                .map(|v| (name.clone(), v))
                .map_err(|e| format!("field {name}: {e}"))
        })
        .collect()
}

fn decode_value(value: &Value) -> Result<FieldValue, String> {
    let object = value.as_object().ok_or("value is not an object")?;
    let (kind, inner) = object.iter().next().ok_or("empty value")?;

    match kind.as_str() {
        "nullValue" => Ok(FieldValue::Null),
        "booleanValue" => inner
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(|| "booleanValue is not a bool".to_string()),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| inner.as_i64())
            .map(FieldValue::Integer)
            .ok_or_else(|| "integerValue is not an integer".to_string()),
        "doubleValue" => inner
            .as_f64()
            .map(FieldValue::Double)
            .ok_or_else(|| "doubleValue is not a number".to_string()),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc)))
            .ok_or_else(|| "timestampValue is not RFC 3339".to_string()),
        "stringValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| FieldValue::String(s.to_string()))
            .ok_or_else(|| format!("{kind} is not a string")),
        "arrayValue" => inner["values"]
            .as_array()
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(FieldValue::Array),
        "mapValue" => inner["fields"]
            .as_object()
            .map(decode_fields)
            .unwrap_or_else(|| Ok(Fields::new()))
            .map(FieldValue::Map),
        "geoPointValue" => Ok(FieldValue::Map(Fields::from([
            (
                "latitude".to_string(),
                FieldValue::Double(inner["latitude"].as_f64().unwrap_or_default()),
            ),
            (
                "longitude".to_string(),
                FieldValue::Double(inner["longitude"].as_f64().unwrap_or_default()),
            ),
        ]))),
        other => Err(format!("unsupported value type {other}")),
    }
}
