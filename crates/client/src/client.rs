//! MISP HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Implements the
//! engine's record store over the MISP REST API.

use std::time::Duration;

use log::debug;
use serde::Serialize;
use serde_json::{json, Value};

use misp_review_engine::model::Record;
use misp_review_engine::store::{
    AttributeDraft, ObjectDraft, RecordDraft, RecordStore, SearchQuery, TagScope, Visibility,
};
use misp_review_engine::wire::{record_from_json, text};
use misp_review_engine::ReviewError;

use crate::profile::Credentials;

/// MISP API client (blocking).
#[derive(Clone)]
pub struct MispClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

/// Error type for MISP operations.
#[derive(Debug)]
pub enum MispError {
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// 401/403: the API key was rejected
    Unauthorized(u16, String),
    /// 404 for the given resource
    NotFound(String),
    /// JSON parsing error
    Parse(String),
    /// The server answered 2xx but refused the change
    Rejected(String),
}

impl std::fmt::Display for MispError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MispError::Network(msg) => write!(f, "Network error: {}", msg),
            MispError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            MispError::Unauthorized(code, msg) => write!(f, "MISP auth failed ({}): {}", code, msg),
            MispError::NotFound(what) => write!(f, "Not found: {}", what),
            MispError::Parse(msg) => write!(f, "Parse error: {}", msg),
            MispError::Rejected(msg) => write!(f, "MISP refused the change: {}", msg),
        }
    }
}

impl std::error::Error for MispError {}

impl MispError {
    /// Attribute a 404 to a record id rather than the request path.
    fn for_record(self, id: &str) -> Self {
        match self {
            MispError::NotFound(_) => MispError::NotFound(id.to_string()),
            other => other,
        }
    }
}

impl From<MispError> for ReviewError {
    fn from(e: MispError) -> Self {
        match e {
            MispError::NotFound(id) => ReviewError::NotFound { id },
            MispError::Unauthorized(code, msg) => ReviewError::Unauthorized(format!("HTTP {code}: {msg}")),
            other => ReviewError::Store(other.to_string()),
        }
    }
}

/// An organisation known to the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organisation {
    pub id: String,
    pub name: String,
}

impl MispClient {
    /// Create a new client with explicit credentials.
    pub fn new(creds: Credentials) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("misp-review/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            endpoint: creds.endpoint.trim_end_matches('/').to_string(),
            api_key: creds.api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List organisations (`GET /organisations`).
    pub fn organisations(&self) -> Result<Vec<Organisation>, MispError> {
        let json = self.get("/organisations")?;
        let orgs = as_list(&json, "Organisation")
            .map(|o| Organisation {
                id: text(o, "id"),
                name: text(o, "name"),
            })
            .filter(|o| !o.id.is_empty())
            .collect();
        Ok(orgs)
    }

    /// Search events (`POST /events/restSearch`).
    pub fn search_events(&self, query: &SearchQuery) -> Result<Vec<Record>, MispError> {
        let body = json!({
            "returnFormat": "json",
            "org": query.orgs,
            "tags": query.tags,
            "includeContext": query.include_context,
        });
        let json = self.post_json("/events/restSearch", &body)?;
        let response = json.get("response").unwrap_or(&json);
        let records: Vec<Record> = response
            .as_array()
            .map(|events| events.iter().map(record_from_json).collect())
            .unwrap_or_default();
        Ok(records)
    }

    /// Fetch one event (`GET /events/view/{id}`).
    pub fn view_event(&self, id: &str, extended: bool) -> Result<Record, MispError> {
        let path = if extended {
            format!("/events/view/{id}?extended=1")
        } else {
            format!("/events/view/{id}")
        };
        let json = self.get(&path).map_err(|e| e.for_record(id))?;
        if json.get("Event").is_none() {
            return Err(MispError::Parse(format!("event {id}: response has no Event")));
        }
        Ok(record_from_json(&json))
    }

    /// Attach a tag to an event (`POST /events/addTag/{id}/{tag}/local:{0|1}`).
    pub fn add_event_tag(&self, id: &str, tag_id: &str, scope: TagScope) -> Result<(), MispError> {
        let local = match scope {
            TagScope::Local => 1,
            TagScope::Global => 0,
        };
        let path = format!("/events/addTag/{id}/{tag_id}/local:{local}");
        let json = self.post_json(&path, &json!({})).map_err(|e| e.for_record(id))?;
        check_saved(&json)
    }

    /// Create an event (`POST /events/add`).
    pub fn add_event(&self, draft: &RecordDraft) -> Result<Record, MispError> {
        let mut event = json!({
            "info": draft.title,
            "analysis": 0,
            "threat_level_id": 4,
        });
        match draft.visibility {
            Visibility::OrganisationOnly => {
                event["distribution"] = json!(0);
            }
            Visibility::Scope(ref sharing_group) => {
                event["distribution"] = json!(4);
                event["sharing_group_id"] = json!(sharing_group);
            }
        }
        if let Some(ref uuid) = draft.extends {
            event["extends_uuid"] = json!(uuid);
        }

        let json = self.post_json("/events/add", &json!({ "Event": event }))?;
        let record = record_from_json(&json);
        if record.id.is_empty() {
            return Err(MispError::Parse("created event has no id".into()));
        }
        debug!("created event {} ({})", record.id, record.title);
        Ok(record)
    }

    /// Add an attribute to an event (`POST /attributes/add/{id}`).
    pub fn add_event_attribute(&self, id: &str, attribute: &AttributeDraft) -> Result<(), MispError> {
        let body = json!({
            "category": attribute.category,
            "type": attribute.kind,
            "value": attribute.value,
        });
        let json = self
            .post_json(&format!("/attributes/add/{id}"), &body)
            .map_err(|e| e.for_record(id))?;
        check_errors(&json)
    }

    /// Add a templated object to an event (`POST /objects/add/{id}/{template}`).
    pub fn add_event_object(&self, id: &str, object: &ObjectDraft) -> Result<(), MispError> {
        let attributes: Vec<Value> = object
            .attributes
            .iter()
            .map(|(relation, kind, value)| {
                json!({ "object_relation": relation, "type": kind, "value": value })
            })
            .collect();
        let body = json!({
            "Object": {
                "name": object.name,
                "template_uuid": object.template_id,
                "Attribute": attributes,
            }
        });
        let path = format!("/objects/add/{id}/{}", object.template_id);
        let json = self.post_json(&path, &body).map_err(|e| e.for_record(id))?;
        check_errors(&json)
    }

    /// Publish an event (`POST /events/publish/{id}`).
    pub fn publish_event(&self, id: &str) -> Result<(), MispError> {
        let json = self
            .post_json(&format!("/events/publish/{id}"), &json!({}))
            .map_err(|e| e.for_record(id))?;
        check_errors(&json)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, path: &str) -> Result<Value, MispError> {
        debug!("GET {path}");
        let request = self.http.get(format!("{}{}", self.endpoint, path));
        self.send(path, request)
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value, MispError> {
        debug!("POST {path}");
        let request = self.http.post(format!("{}{}", self.endpoint, path)).json(body);
        self.send(path, request)
    }

    fn send(&self, path: &str, request: reqwest::blocking::RequestBuilder) -> Result<Value, MispError> {
        let response = request
            .header("Authorization", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| MispError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(match status {
                401 | 403 => MispError::Unauthorized(status, error_message(&body)),
                404 => MispError::NotFound(path.to_string()),
                _ => MispError::Http(status, error_message(&body)),
            });
        }

        response.json::<Value>().map_err(|e| MispError::Parse(e.to_string()))
    }
}

impl RecordStore for MispClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, ReviewError> {
        Ok(self.search_events(query)?)
    }

    fn get(&self, id: &str, extended: bool) -> Result<Record, ReviewError> {
        Ok(self.view_event(id, extended)?)
    }

    fn tag(&self, record_id: &str, tag_id: &str, scope: TagScope) -> Result<(), ReviewError> {
        Ok(self.add_event_tag(record_id, tag_id, scope)?)
    }

    fn create(&self, draft: &RecordDraft) -> Result<Record, ReviewError> {
        Ok(self.add_event(draft)?)
    }

    fn add_attribute(&self, record_id: &str, attribute: &AttributeDraft) -> Result<(), ReviewError> {
        Ok(self.add_event_attribute(record_id, attribute)?)
    }

    fn add_object(&self, record_id: &str, object: &ObjectDraft) -> Result<(), ReviewError> {
        Ok(self.add_event_object(record_id, object)?)
    }

    fn publish(&self, record_id: &str) -> Result<(), ReviewError> {
        Ok(self.publish_event(record_id)?)
    }
}

// ── Free functions ──────────────────────────────────────────────────

/// Entries of a list response, unwrapping `{"<key>": {...}}` wrappers.
fn as_list<'a>(json: &'a Value, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    json.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .map(move |entry| entry.get(key).unwrap_or(entry))
}

/// `addTag` answers 200 with `{"saved": false}` when it refuses.
fn check_saved(json: &Value) -> Result<(), MispError> {
    if json.get("saved").and_then(Value::as_bool) == Some(false) {
        return Err(MispError::Rejected(error_message(&json.to_string())));
    }
    check_errors(json)
}

fn check_errors(json: &Value) -> Result<(), MispError> {
    match json.get("errors") {
        Some(errors) if !errors.is_null() && errors != &json!([]) && errors != &json!({}) => {
            Err(MispError::Rejected(errors.to_string()))
        }
        _ => Ok(()),
    }
}

/// Prefer MISP's `message`/`errors` fields over the raw body.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    for key in ["message", "errors", "name"] {
        match json.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(v) if !v.is_null() && !v.is_string() => return v.to_string(),
            _ => {}
        }
    }
    body.trim().to_string()
}
