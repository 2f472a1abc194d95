use crate::domain::ImageRef;
use crate::domain::image_ref::DEFAULT_REGISTRY;
use crate::errors::RegistryError;
use crate::infra::registry_auth::{BearerChallenge, TokenResponse};
use crate::ports::RegistryPort;
use crate::version;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

pub const DOCKER_HUB_ENDPOINT: &str = "https://registry-1.docker.io";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.docker.distribution.manifest.v2+json";
const DIGEST_HEADER: &str = "docker-content-digest";

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry host to base URL, e.g. `registry.local:5000` ->
    /// `http://registry.local:5000`. Hosts not listed use `https://<host>`.
    pub endpoints: HashMap<String, String>,
    pub request_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Registry port over the Docker Registry HTTP API v2.
///
/// Anonymous bearer tokens are negotiated on the first 401 and cached per
/// repository. The reqwest client is pooled and safe to share.
pub struct RegistryHttp {
    client: Client,
    endpoints: HashMap<String, String>,
    tokens: RwLock<HashMap<String, String>>,
}

impl RegistryHttp {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("podman-compose-updater/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoints: config.endpoints,
            tokens: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn base_url(&self, registry: &str) -> String {
        if let Some(url) = self.endpoints.get(registry) {
            return url.trim_end_matches('/').to_string();
        }
        if registry == DEFAULT_REGISTRY {
            DOCKER_HUB_ENDPOINT.to_string()
        } else {
            format!("https://{registry}")
        }
    }

    /// Send a request, negotiating a bearer token once if the registry asks
    /// for one.
    async fn send<F>(
        &self,
        image: &ImageRef,
        url: &str,
        build: F,
    ) -> Result<Response, RegistryError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let cache_key = image.repository_path();
        let cached = self.tokens.read().await.get(&cache_key).cloned();

        let mut request = build(&self.client);
        if let Some(token) = &cached {
            request = request.bearer_auth(token);
        }
        let mut response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerChallenge::parse)
                .ok_or_else(|| {
                    RegistryError::Auth(format!("{url} requires credentials that are not supported"))
                })?;
            let token = self.fetch_token(&challenge, &image.repository).await?;
            self.tokens
                .write()
                .await
                .insert(cache_key, token.clone());
            response = build(&self.client).bearer_auth(&token).send().await?;
        }

        if !response.status().is_success() {
            return Err(RegistryError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        repository: &str,
    ) -> Result<String, RegistryError> {
        let response = self
            .client
            .get(&challenge.realm)
            .query(&challenge.token_query(repository))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RegistryError::Auth(format!(
                "token endpoint {} returned {}",
                challenge.realm,
                response.status().as_u16()
            )));
        }
        response
            .json::<TokenResponse>()
            .await?
            .into_token()
            .ok_or_else(|| RegistryError::Auth(format!("no token from {}", challenge.realm)))
    }

    fn tags_url(&self, image: &ImageRef) -> String {
        format!(
            "{}/v2/{}/tags/list",
            self.base_url(&image.registry),
            image.repository
        )
    }

    fn manifest_url(&self, image: &ImageRef, reference: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{reference}",
            self.base_url(&image.registry),
            image.repository
        )
    }
}

#[async_trait]
impl RegistryPort for RegistryHttp {
    /// Tags ordered most recent first.
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError> {
        let image: ImageRef = image.parse()?;
        let url = self.tags_url(&image);
        let response = self.send(&image, &url, |client| client.get(&url)).await?;
        let mut tags = response.json::<TagList>().await?.tags.unwrap_or_default();
        version::sort_newest_first(&mut tags);
        Ok(tags)
    }

    async fn get_tag_digest(&self, image_ref: &str, tag: &str) -> Result<String, RegistryError> {
        let image: ImageRef = image_ref.parse()?;
        let url = self.manifest_url(&image, tag);
        let response = self
            .send(&image, &url, |client| {
                client.head(&url).header(ACCEPT, MANIFEST_ACCEPT)
            })
            .await?;
        response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::MissingDigest(format!("{}:{tag}", image.repository_path())))
    }
}
