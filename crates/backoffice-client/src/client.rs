use crate::credentials::CredentialStore;
use crate::error::{ApiError, ApiResult};
use crate::error_message::normalize_error;
use crate::pagination::{self, Page};
use crate::refresh::{NoopSessionListener, RefreshCoordinator, SessionListener};
use crate::types::*;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Authenticated gateway to the Backoffice REST API.
///
/// Every call carries the stored access token. A 401 triggers one shared
/// token refresh and a single replay of the request.
pub struct BackofficeClient {
    client: Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl BackofficeClient {
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> ApiResult<Self> {
        Self::with_listener(config, store, Arc::new(NoopSessionListener))
    }

    /// Like [`BackofficeClient::new`], notifying `listener` whenever the
    /// session ends because the refresh token was rejected.
    pub fn with_listener(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        listener: Arc<dyn SessionListener>,
    ) -> ApiResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let refresher = Arc::new(RefreshCoordinator::new(
            client.clone(),
            config.url_for(&config.refresh_path),
            Arc::clone(&store),
            listener,
        ));
        Ok(Self {
            client,
            config,
            store,
            refresher,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.access().is_some_and(|token| !token.is_empty())
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_refreshing()
    }

    /// Exchange username and password for a credential pair and store it.
    ///
    /// Goes straight to the login endpoint: no bearer header, no refresh.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<()> {
        let url = self.config.url_for(&self.config.login_path);
        let resp = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.ok();
            return Err(ApiError::Api(normalize_error(status, body.as_deref())));
        }

        let tokens: TokenPair = resp
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        self.store.set_pair(&tokens.access, &tokens.refresh);
        tracing::info!("Logged in as {}", username);
        Ok(())
    }

    pub fn logout(&self) {
        self.store.clear();
        tracing::info!("Logged out");
    }

    /// Send one request through the gateway.
    ///
    /// Returns `None` for responses without usable content: 204, any DELETE,
    /// non-JSON or unparseable success bodies.
    pub async fn send(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Option<Value>> {
        let url = self.config.url_for(endpoint);
        let access = self.store.access();

        let mut resp = self.dispatch(&url, &options, access.as_deref()).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("{} {} rejected with 401, renewing access token", options.method, url);
            let fresh = self
                .refresher
                .refresh(access.as_deref())
                .await
                .ok_or(ApiError::Unauthorized)?;
            // Replayed once; a second 401 is reported like any other failure.
            resp = self.dispatch(&url, &options, Some(&fresh)).await?;
        }

        read_body(&options.method, resp).await
    }

    async fn dispatch(
        &self,
        url: &str,
        options: &RequestOptions,
        access: Option<&str>,
    ) -> ApiResult<Response> {
        let mut request = self.client.request(options.method.clone(), url);

        if let Some(token) = access.filter(|token| !token.is_empty()) {
            request = request.bearer_auth(token);
        }
        if !options.is_multipart() {
            request = request.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        }
        request = match &options.body {
            Some(RequestBody::Json(body)) => request.json(body),
            Some(RequestBody::Multipart(form)) => request.multipart(form.to_form()?),
            None => request,
        };
        request = request.headers(options.headers.clone());

        tracing::debug!("{} {}", options.method, url);
        request.send().await.map_err(|e| ApiError::Network(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        decode(self.send(endpoint, RequestOptions::get()).await?)
    }

    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(endpoint, RequestOptions::post(), body).await
    }

    pub async fn put<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(endpoint, RequestOptions::put(), body).await
    }

    pub async fn patch<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(endpoint, RequestOptions::patch(), body).await
    }

    pub async fn delete(&self, endpoint: &str) -> ApiResult<()> {
        self.send(endpoint, RequestOptions::delete()).await.map(|_| ())
    }

    /// POST a multipart form, e.g. a scanned invoice.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: MultipartForm,
    ) -> ApiResult<T> {
        decode(self.send(endpoint, RequestOptions::post().multipart(form)).await?)
    }

    /// Items of a list endpoint, paginated or not. Pagination metadata is
    /// dropped; use [`BackofficeClient::page`] to keep it.
    pub async fn list<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<Vec<T>> {
        let body = self.send(endpoint, RequestOptions::get()).await?;
        decode(body.map(pagination::items))
    }

    /// Full envelope of a list endpoint. An unpaginated endpoint yields a
    /// single page holding every item.
    pub async fn page<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<Page<T>> {
        let body = self.send(endpoint, RequestOptions::get()).await?;
        decode(body.map(pagination::envelope))
    }

    /// Every item of a paginated endpoint, following `next` links.
    ///
    /// A `next` link pointing back at an already fetched page is reported as
    /// [`ApiError::InvalidResponse`].
    pub async fn list_all<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut current = self.config.url_for(endpoint);
        loop {
            let page: Page<T> = self.page(&current).await?;
            visited.insert(current);
            items.extend(page.results);
            match page.next {
                Some(next) => {
                    let next = self.config.url_for(&next);
                    if visited.contains(&next) {
                        return Err(ApiError::InvalidResponse(format!(
                            "pagination loops back to {}",
                            next
                        )));
                    }
                    current = next;
                },
                None => return Ok(items),
            }
        }
    }

    async fn send_json<B, T>(&self, endpoint: &str, options: RequestOptions, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        decode(self.send(endpoint, options.json(body)).await?)
    }
}

async fn read_body(method: &Method, resp: Response) -> ApiResult<Option<Value>> {
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.ok();
        return Err(ApiError::Api(normalize_error(status, body.as_deref())));
    }

    if status == StatusCode::NO_CONTENT || *method == Method::DELETE {
        return Ok(None);
    }

    if !is_json(resp.headers()) {
        return Ok(None);
    }

    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::debug!("Discarding unparseable JSON body: {}", e);
            Ok(None)
        },
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let mime = v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            mime == JSON_CONTENT_TYPE || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn decode<T: DeserializeOwned>(body: Option<Value>) -> ApiResult<T> {
    let body = body.ok_or(ApiError::EmptyResponse)?;
    serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
