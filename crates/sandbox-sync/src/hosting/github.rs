//! GitHub REST implementation of [`HostingApi`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use super::error::{HostingError, Result};
use super::types::{Account, CreateGistRequest, CreateRepositoryRequest, Gist, Repository};
use super::HostingApi;
use crate::auth::AuthInfo;

const USER_AGENT: &str = "sandbox-sync";
const API_VERSION: &str = "2022-11-28";

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GitHubClient {
    /// `api_url` is `https://api.github.com` or an Enterprise `/api/v3` root.
    pub fn new(api_url: &str) -> Result<Self> {
        // A trailing slash makes `Url::join` append instead of replacing the last segment.
        let normalized = format!("{}/", api_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| HostingError::InvalidUrl(format!("{}: {}", api_url, e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    fn request(&self, method: Method, path: &str, auth: Option<&AuthInfo>) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| HostingError::InvalidUrl(format!("{}: {}", path, e)))?;

        let mut builder = self
            .http
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(auth) = auth {
            builder = builder.header(
                "Authorization",
                format!("Bearer {}", auth.token.expose_secret()),
            );
        }
        Ok(builder)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(HostingError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn create_gist(&self, auth: &AuthInfo, request: &CreateGistRequest) -> Result<Gist> {
        let builder = self.request(Method::POST, "gists", Some(auth))?.json(request);
        let gist: Gist = Self::send_json(builder).await?;
        log::info!("Created gist {}", gist.id);
        Ok(gist)
    }

    async fn fork_gist(&self, auth: &AuthInfo, gist_id: &str) -> Result<Gist> {
        let path = format!("gists/{}/forks", gist_id);
        let gist: Gist = Self::send_json(self.request(Method::POST, &path, Some(auth))?).await?;
        log::info!("Forked gist {} into {}", gist_id, gist.id);
        Ok(gist)
    }

    async fn get_gist(&self, auth: Option<&AuthInfo>, gist_id: &str) -> Result<Gist> {
        let path = format!("gists/{}", gist_id);
        Self::send_json(self.request(Method::GET, &path, auth)?).await
    }

    async fn create_repository(
        &self,
        auth: &AuthInfo,
        request: &CreateRepositoryRequest,
    ) -> Result<Repository> {
        let builder = self
            .request(Method::POST, "user/repos", Some(auth))?
            .json(request);
        let repository: Repository = Self::send_json(builder).await?;
        log::info!("Created repository {}", repository.html_url);
        Ok(repository)
    }

    async fn current_account(&self, auth: &AuthInfo) -> Result<Account> {
        #[derive(serde::Deserialize)]
        struct User {
            login: String,
        }

        let response = self.request(Method::GET, "user", Some(auth))?.send().await?;
        let response = Self::check(response).await?;

        let scopes = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|v| v.to_str().ok())
            .map(|s| {
                s.split(',')
                    .map(|scope| scope.trim().to_string())
                    .filter(|scope| !scope.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let user: User = response.json().await?;
        Ok(Account {
            login: user.login,
            scopes,
        })
    }
}
