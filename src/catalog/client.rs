//! Catalog REST client.

use super::auth::AuthState;
use super::body::{item_body, relationship_body, set_body};
use super::transport::{ApiRequest, ApiResponse, Credentials, Method, Transport};
use crate::error::{Error, Result};
use crate::model::{Item, Relationship, Set, identity};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    jwt: String,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LookupName {
    #[serde(default)]
    physical: String,
}

#[derive(Debug, Deserialize)]
struct LookupSet {
    id: String,
    name: LookupName,
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    sets: Vec<LookupSet>,
}

/// Client for one source in the remote catalog.
///
/// Every call goes through [`CatalogClient::send`], which attaches the
/// current bearer token and, on a 401, refreshes the token once and
/// retries once.
pub struct CatalogClient<T: Transport> {
    transport: T,
    auth: AuthState,
    basic: Option<(String, String)>,
    source: String,
    source_id: Option<String>,
}

impl<T: Transport> CatalogClient<T> {
    /// Client for `source`, a catalog source ID or physical name.
    pub fn new(transport: T, source: impl Into<String>) -> Self {
        Self {
            transport,
            auth: AuthState::default(),
            basic: None,
            source: source.into(),
            source_id: None,
        }
    }

    /// Start with a pre-issued bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthState::with_token(token);
        self
    }

    /// Basic credentials used only against the token endpoint.
    #[must_use]
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic = Some((user.into(), password.into()));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// The catalog's ID for the source once resolved, else the configured
    /// value.
    #[must_use]
    pub fn source_id(&self) -> &str {
        self.source_id.as_deref().unwrap_or(&self.source)
    }

    pub(crate) fn configured_source(&self) -> &str {
        &self.source
    }

    pub(crate) fn resolve_source(&mut self, id: impl Into<String>) {
        self.source_id = Some(id.into());
    }

    /// Send one logical call.
    ///
    /// A 401 triggers at most one token refresh and one retry; a second
    /// 401 is returned to the caller as-is.
    ///
    /// # Errors
    ///
    /// Returns an error only when the transport itself fails.
    pub async fn send(&mut self, method: Method, path: &str, body: Option<Value>) -> Result<ApiResponse> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        let mut refreshed = false;

        loop {
            request.credentials = self.auth.credentials();
            debug!(method = %method, path, "catalog request");
            let response = self.transport.send(&request).await?;

            if response.status != 401 || refreshed {
                return Ok(response);
            }

            refreshed = true;
            self.auth.begin_refresh();
            if let Err(e) = self.refresh_token().await {
                warn!(error = %e, "token refresh failed");
                self.auth.fail();
                return Ok(response);
            }
        }
    }

    async fn refresh_token(&mut self) -> Result<()> {
        info!("authenticating with the catalog");
        let mut request = ApiRequest::new(Method::Get, "/token");
        if let Some((user, password)) = &self.basic {
            request.credentials = Credentials::Basic {
                user: user.clone(),
                password: password.clone(),
            };
        }
        let response = self
            .transport
            .send(&request)
            .await?
            .ensure_success("GET /token")?;
        let token: TokenResponse = response.json()?;
        self.auth.complete(token.jwt);
        Ok(())
    }

    /// Send a call and require a 2xx status.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` with `METHOD path` as context on any other status.
    pub async fn call(&mut self, method: Method, path: &str, body: Option<Value>) -> Result<ApiResponse> {
        self.send(method, path, body)
            .await?
            .ensure_success(format!("{method} {path}"))
    }

    /// `POST /catalog/source/{id}/set`, returning the new set's remote ID.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status or a response without an ID.
    pub async fn create_set(&mut self, set: &Set) -> Result<String> {
        let path = format!("/catalog/source/{}/set", self.source_id());
        let response = self.call(Method::Post, &path, Some(set_body(set))).await?;
        let created: CreatedResponse = response.json().map_err(|e| Error::Remote {
            context: format!("POST {path}"),
            status: response.status,
            message: format!("response carries no set id: {e}"),
        })?;
        Ok(created.id)
    }

    /// `PUT /catalog/set/{id}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn update_set(&mut self, id: &str, set: &Set) -> Result<()> {
        self.call(Method::Put, &format!("/catalog/set/{id}"), Some(set_body(set)))
            .await?;
        Ok(())
    }

    /// `DELETE /catalog/set/{id}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn delete_set(&mut self, id: &str) -> Result<()> {
        self.call(Method::Delete, &format!("/catalog/set/{id}"), None).await?;
        Ok(())
    }

    /// `POST /catalog/set/{id}/items` with every item in one call.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn create_items(&mut self, set_id: &str, items: &[&Item]) -> Result<()> {
        let body = json!({ "items": items.iter().map(|i| item_body(i)).collect::<Vec<_>>() });
        self.call(Method::Post, &format!("/catalog/set/{set_id}/items"), Some(body))
            .await?;
        Ok(())
    }

    /// `PUT /catalog/set/{id}/items`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn update_items(&mut self, set_id: &str, items: &[&Item]) -> Result<()> {
        let body = json!({ "items": items.iter().map(|i| item_body(i)).collect::<Vec<_>>() });
        self.call(Method::Put, &format!("/catalog/set/{set_id}/items"), Some(body))
            .await?;
        Ok(())
    }

    /// `DELETE /catalog/item/{id}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn delete_item(&mut self, id: &str) -> Result<()> {
        self.call(Method::Delete, &format!("/catalog/item/{id}"), None).await?;
        Ok(())
    }

    fn relationship_bodies(relationships: &[&Relationship]) -> Vec<Value> {
        relationships
            .iter()
            .filter_map(|r| relationship_body(r))
            .collect()
    }

    /// `POST /catalog/relationships`. Relationships without joins are left out.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn create_relationships(&mut self, relationships: &[&Relationship]) -> Result<()> {
        let bodies = Self::relationship_bodies(relationships);
        if bodies.is_empty() {
            return Ok(());
        }
        self.call(Method::Post, "/catalog/relationships", Some(json!({ "relationships": bodies })))
            .await?;
        Ok(())
    }

    /// `PUT /catalog/relationships`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn update_relationships(&mut self, relationships: &[&Relationship]) -> Result<()> {
        let bodies = Self::relationship_bodies(relationships);
        if bodies.is_empty() {
            return Ok(());
        }
        self.call(Method::Put, "/catalog/relationships", Some(json!({ "relationships": bodies })))
            .await?;
        Ok(())
    }

    /// `DELETE /catalog/relationships` with the remote IDs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn delete_relationships(&mut self, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.call(Method::Delete, "/catalog/relationships", Some(json!({ "relationships": ids })))
            .await?;
        Ok(())
    }

    /// Find a set's remote ID by physical name via `GET /catalog/schema/{id}/sets`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` on a non-2xx status.
    pub async fn lookup_set(&mut self, name: &str) -> Result<Option<String>> {
        let path = format!("/catalog/schema/{}/sets", self.source_id());
        let response = self.call(Method::Get, &path, None).await?;
        let listing: LookupResponse = response.json()?;
        let wanted = identity(name);
        Ok(listing
            .sets
            .into_iter()
            .find(|s| identity(&s.name.physical) == wanted)
            .map(|s| s.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, orders};

    fn client(transport: ScriptedTransport) -> CatalogClient<ScriptedTransport> {
        CatalogClient::new(transport, "src-1").with_basic_auth("svc", "secret")
    }

    #[tokio::test]
    async fn test_refreshes_token_once_on_401() {
        let transport = ScriptedTransport::queue(vec![
            ApiResponse::new(401, ""),
            ApiResponse::new(200, r#"{"jwt":"fresh"}"#),
            ApiResponse::new(200, "{}"),
        ]);
        let mut client = client(transport);

        let response = client.send(Method::Get, "/catalog/sources", None).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.auth(), &AuthState::Authenticated("fresh".into()));

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].credentials, Credentials::None);
        assert_eq!(requests[1].path, "/token");
        assert!(matches!(requests[1].credentials, Credentials::Basic { .. }));
        assert_eq!(requests[2].credentials, Credentials::Bearer("fresh".into()));
    }

    #[tokio::test]
    async fn test_second_401_fails_without_looping() {
        let transport = ScriptedTransport::queue(vec![
            ApiResponse::new(401, ""),
            ApiResponse::new(200, r#"{"jwt":"fresh"}"#),
            ApiResponse::new(401, "expired"),
        ]);
        let mut client = client(transport);

        let err = client.call(Method::Get, "/catalog/sources", None).await.unwrap_err();
        assert_eq!(err.status(), Some(401));

        let tokens = client
            .transport()
            .requests()
            .iter()
            .filter(|r| r.path == "/token")
            .count();
        assert_eq!(tokens, 1);
        assert_eq!(client.transport().requests().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let transport = ScriptedTransport::queue(vec![
            ApiResponse::new(401, "nope"),
            ApiResponse::new(403, "denied"),
        ]);
        let mut client = client(transport);

        let response = client.send(Method::Get, "/catalog/sources", None).await.unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(client.auth(), &AuthState::Failed);
    }

    #[tokio::test]
    async fn test_create_set_returns_id() {
        let transport = ScriptedTransport::queue(vec![ApiResponse::new(201, r#"{"id":"set-9"}"#)]);
        let mut client = CatalogClient::new(transport, "src-1").with_token("key");

        let id = client.create_set(&orders()).await.unwrap();
        assert_eq!(id, "set-9");

        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, "/catalog/source/src-1/set");
        assert_eq!(requests[0].credentials, Credentials::Bearer("key".into()));
    }

    #[tokio::test]
    async fn test_lookup_set_matches_case_insensitively() {
        let transport = ScriptedTransport::queue(vec![ApiResponse::new(
            200,
            r#"{"sets":[{"id":"a","name":{"physical":"Customers"}},{"id":"b","name":{"physical":"Orders "}}]}"#,
        )]);
        let mut client = CatalogClient::new(transport, "src-1");

        assert_eq!(client.lookup_set("orders").await.unwrap().as_deref(), Some("b"));
        assert_eq!(
            client.transport().requests()[0].path,
            "/catalog/schema/src-1/sets"
        );
    }

    #[tokio::test]
    async fn test_empty_relationship_writes_are_skipped() {
        let transport = ScriptedTransport::queue(vec![]);
        let mut client = CatalogClient::new(transport, "src-1");

        client.delete_relationships(&[]).await.unwrap();
        client.create_relationships(&[]).await.unwrap();
        assert!(client.transport().requests().is_empty());
    }
}
