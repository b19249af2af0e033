//! Microsoft Graph backend.
//!
//! This module provides the [`GraphBackend`] implementation, which talks to
//! the Graph REST API with a bearer token.
//!
//! # Relations
//!
//! Owners and members are added with `<relation>@odata.bind` PATCH requests
//! in batches of [`BIND_BATCH_SIZE`]. If a batch is rejected, each ID is
//! added on its own with `POST .../$ref`. Removal is always per ID with
//! `DELETE .../{id}/$ref`. Adding an existing reference and removing a
//! missing one are both treated as success.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{EntityKind, Relation};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// Largest number of references the API accepts in one bind request.
pub const BIND_BATCH_SIZE: usize = 20;

/// Default Graph endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://graph.microsoft.com";

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v1.0";

/// Microsoft Graph backend.
///
/// # Example
///
/// ```no_run
/// use graphkit::backend::graph::GraphBackend;
/// use graphkit::backend::Backend;
/// use graphkit::EntityKind;
/// use std::time::Duration;
///
/// let backend = GraphBackend::new("token", Duration::from_secs(300));
/// let groups = backend.list(EntityKind::Group, None).unwrap();
/// println!("Found {} groups", groups.len());
/// ```
pub struct GraphBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Endpoint plus API version, without trailing slash.
    base_url: String,
    /// Bearer token.
    token: String,
}

impl GraphBackend {
    /// Create a backend for the public Graph endpoint.
    #[must_use]
    pub fn new(token: impl Into<String>, timeout: Duration) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, DEFAULT_API_VERSION, token, timeout)
    }

    /// Create a backend for a custom endpoint (national clouds, testing).
    #[must_use]
    pub fn with_endpoint(
        endpoint: &str,
        api_version: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: format!(
                "{}/{}",
                endpoint.trim_end_matches('/'),
                api_version.trim_matches('/')
            ),
            token: token.into(),
        }
    }

    /// Get the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.collection())
    }

    fn entity_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, kind.collection(), id)
    }

    fn relation_url(&self, kind: EntityKind, id: &str, relation: Relation) -> String {
        format!("{}/{}", self.entity_url(kind, id), relation.path())
    }

    fn reference_url(&self, kind: EntityKind, id: &str, relation: Relation, member: &str) -> String {
        format!("{}/{}/$ref", self.relation_url(kind, id, relation), member)
    }

    fn directory_object_url(&self, id: &str) -> String {
        format!("{}/directoryObjects/{}", self.base_url, id)
    }

    fn bind_body(&self, relation: Relation, ids: &[String]) -> Value {
        let refs: Vec<String> = ids.iter().map(|id| self.directory_object_url(id)).collect();
        json!({ format!("{}@odata.bind", relation.path()): refs })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get_json(&self, url: &str, kind: EntityKind, id: Option<&str>, operation: &str) -> Result<Option<Value>> {
        let response = self
            .agent
            .get(url)
            .header("Authorization", self.bearer())
            .header("Accept", "application/json")
            .call()
            .map_err(|e| transport(kind, id, operation, &e))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let mut response = check(kind, id, operation, response)?;
        let value = response
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(Some(value))
    }

    /// Follow `@odata.nextLink` until the collection is exhausted.
    fn get_pages(&self, first: String, kind: EntityKind, id: Option<&str>, operation: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page = self
                .get_json(&url, kind, id, operation)?
                .ok_or_else(|| match id {
                    Some(id) => Error::not_found(kind, id),
                    None => Error::remote(kind, None, operation, Some(404), "collection not found"),
                })?;
            let page: ODataPage = serde_json::from_value(page)?;
            items.extend(page.value);
            next = page.next_link;
        }
        log::debug!("{operation} returned {} item(s)", items.len());
        Ok(items)
    }

    fn send_json(
        &self,
        method: &str,
        url: &str,
        body: &Value,
        kind: EntityKind,
        id: Option<&str>,
        operation: &str,
    ) -> Result<Response<Body>> {
        let request = match method {
            "POST" => self.agent.post(url),
            _ => self.agent.patch(url),
        };
        let response = request
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| transport(kind, id, operation, &e))?;
        Ok(response)
    }

    fn send_delete(&self, url: &str, kind: EntityKind, id: Option<&str>, operation: &str) -> Result<Response<Body>> {
        self.agent
            .delete(url)
            .header("Authorization", self.bearer())
            .call()
            .map_err(|e| transport(kind, id, operation, &e))
    }

    /// Add references one at a time.
    fn add_references(&self, kind: EntityKind, id: &str, relation: Relation, ids: &[String]) -> Result<()> {
        let operation = format!("adding {relation}");
        let url = format!("{}/$ref", self.relation_url(kind, id, relation));
        for member in ids {
            let body = json!({ "@odata.id": self.directory_object_url(member) });
            let mut response = self.send_json("POST", &url, &body, kind, Some(id), &operation)?;
            let status = response.status().as_u16();
            if status == 400 {
                let message = error_message(&mut response);
                if message.contains("already exist") {
                    log::debug!("{member} is already in {relation} of {kind} {id}");
                    continue;
                }
                return Err(Error::remote(kind, Some(id), &operation, Some(status), message));
            }
            check(kind, Some(id), &operation, response)?;
        }
        Ok(())
    }
}

impl Backend for GraphBackend {
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        self.get_json(&self.entity_url(kind, id), kind, Some(id), "retrieving")
    }

    fn list(&self, kind: EntityKind, filter: Option<&str>) -> Result<Vec<Value>> {
        let url = match filter {
            Some(filter) => format!(
                "{}?$filter={}",
                self.collection_url(kind),
                urlencoding::encode(filter)
            ),
            None => self.collection_url(kind),
        };
        self.get_pages(url, kind, None, "listing")
    }

    fn create(&self, kind: EntityKind, body: &Value, owners: &[String]) -> Result<Value> {
        let bind_owners = kind.binds_owners_on_create() && !owners.is_empty();
        let mut body = body.clone();
        if bind_owners
            && let (Value::Object(map), Value::Object(bind)) = (&mut body, self.bind_body(Relation::Owners, owners))
        {
            map.extend(bind);
        }

        let response = self.send_json("POST", &self.collection_url(kind), &body, kind, None, "creating")?;
        let mut response = check(kind, None, "creating", response)?;
        let created = response
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        if !bind_owners && !owners.is_empty() && kind.supports(Relation::Owners) {
            let id = created
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidResponse(format!("created {kind} has no id")))?;
            self.add_relation(kind, id, Relation::Owners, owners)?;
        }
        Ok(created)
    }

    fn update(&self, kind: EntityKind, id: &str, patch: &Value) -> Result<()> {
        let response = self.send_json("PATCH", &self.entity_url(kind, id), patch, kind, Some(id), "updating")?;
        if response.status().as_u16() == 404 {
            return Err(Error::not_found(kind, id));
        }
        check(kind, Some(id), "updating", response)?;
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let response = self.send_delete(&self.entity_url(kind, id), kind, Some(id), "deleting")?;
        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        check(kind, Some(id), "deleting", response)?;
        Ok(true)
    }

    fn list_relation(&self, kind: EntityKind, id: &str, relation: Relation) -> Result<Vec<String>> {
        let url = format!("{}?$select=id", self.relation_url(kind, id, relation));
        let items = self.get_pages(url, kind, Some(id), &format!("listing {relation}"))?;
        items
            .iter()
            .map(|item| {
                item.get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidResponse(format!("{relation} entry without id")))
            })
            .collect()
    }

    fn add_relation(&self, kind: EntityKind, id: &str, relation: Relation, ids: &[String]) -> Result<()> {
        let operation = format!("adding {relation}");
        for batch in ids.chunks(BIND_BATCH_SIZE) {
            let body = self.bind_body(relation, batch);
            let mut response =
                self.send_json("PATCH", &self.entity_url(kind, id), &body, kind, Some(id), &operation)?;
            match response.status().as_u16() {
                200..=299 => {}
                404 => return Err(Error::not_found(kind, id)),
                400 => {
                    // one reference already present fails the whole batch
                    log::debug!(
                        "bind batch rejected for {kind} {id}: {}; adding individually",
                        error_message(&mut response)
                    );
                    self.add_references(kind, id, relation, batch)?;
                }
                _ => {
                    check(kind, Some(id), &operation, response)?;
                }
            }
        }
        Ok(())
    }

    fn remove_relation(
        &self,
        kind: EntityKind,
        id: &str,
        relation: Relation,
        ids: &[String],
    ) -> Result<()> {
        let operation = format!("removing {relation}");
        for member in ids {
            let url = self.reference_url(kind, id, relation, member);
            let response = self.send_delete(&url, kind, Some(id), &operation)?;
            if response.status().as_u16() == 404 {
                log::debug!("{member} was not in {relation} of {kind} {id}");
                continue;
            }
            check(kind, Some(id), &operation, response)?;
        }
        Ok(())
    }
}

// =============================================================================
// Graph API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ODataPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    code: Option<String>,
    message: Option<String>,
}

/// Turn a non-success response into an error.
fn check(kind: EntityKind, id: Option<&str>, operation: &str, mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let message = error_message(&mut response);
    log::debug!("{operation} for {kind} failed with HTTP {status}: {message}");
    Err(Error::remote(kind, id, operation, Some(status), message))
}

/// Extract the OData error message from a response body.
fn error_message(response: &mut Response<Body>) -> String {
    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string().unwrap_or_default();
    parse_error_message(&text).unwrap_or_else(|| format!("HTTP {status}"))
}

fn parse_error_message(text: &str) -> Option<String> {
    let body: ODataErrorBody = serde_json::from_str(text).ok()?;
    match (body.error.code, body.error.message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (None, Some(message)) => Some(message),
        (Some(code), None) => Some(code),
        (None, None) => None,
    }
}

fn transport(kind: EntityKind, id: Option<&str>, operation: &str, err: &ureq::Error) -> Error {
    Error::remote(kind, id, operation, None, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> GraphBackend {
        GraphBackend::new("token", Duration::from_secs(5))
    }

    #[test]
    fn test_base_url() {
        assert_eq!(backend().base_url(), "https://graph.microsoft.com/v1.0");
    }

    #[test]
    fn test_custom_endpoint() {
        let backend = GraphBackend::with_endpoint(
            "https://graph.microsoft.us/",
            "/beta/",
            "token",
            Duration::from_secs(5),
        );
        assert_eq!(backend.base_url(), "https://graph.microsoft.us/beta");
    }

    #[test]
    fn test_entity_urls() {
        let backend = backend();
        assert_eq!(
            backend.entity_url(EntityKind::ConditionalAccessPolicy, "p1"),
            "https://graph.microsoft.com/v1.0/identity/conditionalAccess/policies/p1"
        );
        assert_eq!(
            backend.relation_url(EntityKind::Group, "g1", Relation::Members),
            "https://graph.microsoft.com/v1.0/groups/g1/members"
        );
        assert_eq!(
            backend.reference_url(EntityKind::Application, "a1", Relation::Owners, "u1"),
            "https://graph.microsoft.com/v1.0/applications/a1/owners/u1/$ref"
        );
    }

    #[test]
    fn test_bind_body() {
        let backend = backend();
        let body = backend.bind_body(Relation::Owners, &["u1".to_string(), "u2".to_string()]);
        assert_eq!(
            body,
            json!({
                "owners@odata.bind": [
                    "https://graph.microsoft.com/v1.0/directoryObjects/u1",
                    "https://graph.microsoft.com/v1.0/directoryObjects/u2"
                ]
            })
        );
    }

    #[test]
    fn test_parse_error_message() {
        let text = r#"{"error":{"code":"Request_BadRequest","message":"One or more added object references already exist"}}"#;
        assert_eq!(
            parse_error_message(text).unwrap(),
            "Request_BadRequest: One or more added object references already exist"
        );
        assert_eq!(parse_error_message("<html>"), None);
    }

    #[test]
    fn test_odata_page_next_link() {
        let page: ODataPage = serde_json::from_value(json!({
            "value": [{ "id": "1" }],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/groups?$skiptoken=x"
        }))
        .unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.is_some());

        let last: ODataPage = serde_json::from_value(json!({ "value": [] })).unwrap();
        assert!(last.next_link.is_none());
    }

    // -------------------------------------------------------------------------
    // HTTP behaviour against a local stub
    // -------------------------------------------------------------------------

    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ALREADY_EXISTS: &str = r#"{"error":{"code":"Request_BadRequest","message":"One or more added object references already exist for the following modified properties: 'members'."}}"#;

    /// Run blocking ureq calls off the async runtime driving the stub.
    async fn blocking<T, F>(uri: String, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(GraphBackend) -> T + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            f(GraphBackend::with_endpoint(&uri, "v1.0", "token", Duration::from_secs(5)))
        })
        .await
        .unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_follows_next_link() {
        let server = MockServer::start().await;
        let next = format!("{}/v1.0/groups?$skiptoken=page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1.0/groups"))
            .and(query_param("$skiptoken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "id": "g3" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/groups"))
            .and(query_param_is_missing("$skiptoken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "id": "g1" }, { "id": "g2" }],
                "@odata.nextLink": next
            })))
            .expect(1)
            .mount(&server)
            .await;

        let groups = blocking(server.uri(), |backend| backend.list(EntityKind::Group, None))
            .await
            .unwrap();
        let ids: Vec<&str> = groups.iter().filter_map(|g| g["id"].as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2", "g3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_filter_is_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/groups"))
            .and(query_param("$filter", "displayName eq 'Ops & Support'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [{ "id": "g1" }] })))
            .expect(1)
            .mount(&server)
            .await;

        let groups = blocking(server.uri(), |backend| {
            backend.list(EntityKind::Group, Some("displayName eq 'Ops & Support'"))
        })
        .await
        .unwrap();
        assert_eq!(groups.len(), 1);

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default().to_string();
        assert!(query.contains("%27Ops%20%26%20Support%27"), "{query}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/groups/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let found = blocking(server.uri(), |backend| backend.get(EntityKind::Group, "gone"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_relation_batches() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1.0/groups/g1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(3)
            .mount(&server)
            .await;

        blocking(server.uri(), |backend| {
            backend.add_relation(EntityKind::Group, "g1", Relation::Members, &ids(45))
        })
        .await
        .unwrap();

        let sizes: Vec<usize> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| {
                let body: Value = request.body_json().unwrap();
                body["members@odata.bind"].as_array().map_or(0, Vec::len)
            })
            .collect();
        assert_eq!(sizes, vec![BIND_BATCH_SIZE, BIND_BATCH_SIZE, 5]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_existing_reference_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1.0/groups/g1"))
            .respond_with(ResponseTemplate::new(400).set_body_string(ALREADY_EXISTS))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/groups/g1/members/$ref"))
            .respond_with(ResponseTemplate::new(400).set_body_string(ALREADY_EXISTS))
            .expect(2)
            .mount(&server)
            .await;

        let result = blocking(server.uri(), |backend| {
            backend.add_relation(EntityKind::Group, "g1", Relation::Members, &ids(2))
        })
        .await;
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_reference_other_bad_request_fails() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1.0/groups/g1"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/groups/g1/members/$ref"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error":{"code":"Request_BadRequest","message":"Invalid object identifier"}}"#,
            ))
            .mount(&server)
            .await;

        let err = blocking(server.uri(), |backend| {
            backend.add_relation(EntityKind::Group, "g1", Relation::Members, &ids(1))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid object identifier"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_missing_reference_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1.0/groups/g1/owners/u0/$ref"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1.0/groups/g1/owners/u1/$ref"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = blocking(server.uri(), |backend| {
            backend.remove_relation(EntityKind::Group, "g1", Relation::Owners, &ids(2))
        })
        .await;
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1.0/groups/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = blocking(server.uri(), |backend| {
            backend.update(EntityKind::Group, "gone", &json!({ "description": "x" }))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
