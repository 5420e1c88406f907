use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// HTTP client for the Stash API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let key = self
            .api_key
            .as_deref()
            .context("an API key is required; pass --api-key or set STASH_API_KEY")?;
        Ok(req.bearer_auth(key))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req.send().await.context("request to server failed")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }
        serde_json::from_str(&body).context("unexpected response from server")
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/health")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn register(&self, req: &CreateUserRequest) -> Result<AccountResponse> {
        let url = self.url("/users")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    pub async fn whoami(&self) -> Result<AccountResponse> {
        let url = self.url("/auth/whoami")?;
        self.send_json(self.authed(self.http.get(url))?).await
    }

    pub async fn rotate_key(&self) -> Result<RegenerateKeyResponse> {
        let url = self.url("/auth/regenerate-key")?;
        self.send_json(self.authed(self.http.post(url))?).await
    }

    pub async fn add_bookmark(&self, req: &CreateBookmarkRequest) -> Result<BookmarkResponse> {
        let url = self.url("/bookmarks")?;
        self.send_json(self.authed(self.http.post(url).json(req))?)
            .await
    }

    pub async fn list_bookmarks(&self) -> Result<Vec<BookmarkResponse>> {
        let url = self.url("/bookmarks")?;
        self.send_json(self.authed(self.http.get(url))?).await
    }

    pub async fn list_user_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkResponse>> {
        let url = self.url(&format!("/users/{user_id}/bookmarks"))?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn delete_bookmarks(&self, title: &str) -> Result<DeleteBookmarksResponse> {
        let mut url = self.url("/bookmarks")?;
        url.query_pairs_mut().append_pair("title", title);
        self.send_json(self.authed(self.http.delete(url))?).await
    }

    pub async fn delete_account(&self, confirm_email: &str) -> Result<DeleteAccountResponse> {
        let url = self.url("/account")?;
        let body = DeleteAccountRequest {
            confirm_email: confirm_email.to_string(),
        };
        self.send_json(self.authed(self.http.delete(url).json(&body))?)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateKeyResponse {
    pub api_key: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CreateBookmarkRequest {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct BookmarkResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBookmarksResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
struct DeleteAccountRequest {
    confirm_email: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountResponse {
    pub deleted: bool,
    pub bookmarks_deleted: u64,
}
