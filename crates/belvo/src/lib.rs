//! Client for the Belvo open finance REST API.
//!
//! Only the read side used by data synchronization is covered: listing the
//! owners, accounts and transactions collected for a link. List endpoints
//! are paginated and the client always walks every page before returning.
mod fields;
pub mod model;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub use model::{
    Account, Balance, Institution, ListResponse, Merchant, Owner, RawObject, Transaction,
};
use model::ErrorResponse;

pub const SANDBOX_URL: &str = "https://sandbox.belvo.com/api";
pub const PRODUCTION_URL: &str = "https://api.belvo.com/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum Error {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("belvo API error: {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("belvo API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response body")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url")]
    Url(#[from] url::ParseError),
    #[error("client credentials must be provided")]
    MissingCredentials,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_password", &"********")
            .finish()
    }
}

pub struct Builder {
    credentials: Option<Credentials>,
    base_url: String,
    timeout: Duration,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            credentials: None,
            base_url: SANDBOX_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client> {
        let credentials = self.credentials.ok_or(Error::MissingCredentials)?;
        let base_url = self.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| Error::Transport {
                url: base_url.clone(),
                source,
            })?;

        Ok(Client {
            http,
            credentials: Arc::new(credentials),
            base_url,
        })
    }
}

/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    credentials: Arc<Credentials>,
    base_url: String,
}

impl Client {
    pub async fn owners(&self, link_id: &str) -> Result<Vec<Owner>> {
        let owners: Vec<Owner> = self
            .list("owners", link_id)
            .await?
            .into_iter()
            .map(Owner::from)
            .collect();

        info!(link_id, count = owners.len(), "fetched owners");
        Ok(owners)
    }

    pub async fn accounts(&self, link_id: &str) -> Result<Vec<Account>> {
        let accounts: Vec<Account> = self
            .list("accounts", link_id)
            .await?
            .into_iter()
            .map(Account::from)
            .collect();

        info!(link_id, count = accounts.len(), "fetched accounts");
        Ok(accounts)
    }

    pub async fn transactions(&self, link_id: &str) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self
            .list("transactions", link_id)
            .await?
            .into_iter()
            .map(Transaction::from)
            .collect();

        info!(link_id, count = transactions.len(), "fetched transactions");
        Ok(transactions)
    }

    fn endpoint(&self, resource: &str, link_id: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}/", self.base_url, resource))?;
        url.query_pairs_mut().append_pair("link", link_id);

        Ok(url)
    }

    /// Walks the `next` chain and returns every result in page order. Pages
    /// collected before a failure are dropped.
    #[tracing::instrument(skip(self))]
    async fn list(&self, resource: &str, link_id: &str) -> Result<Vec<RawObject>> {
        let mut next = Some(self.endpoint(resource, link_id)?);
        let mut results = vec![];
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let page = self.page(url).await?;
            pages += 1;

            results.extend(page.results);
            next = page.next.as_deref().map(Url::parse).transpose()?;
        }

        debug!(pages, count = results.len(), "collected list pages");
        Ok(results)
    }

    async fn page(&self, url: Url) -> Result<ListResponse> {
        debug!(%url, "requesting page");
        let transport = |source| Error::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .http
            .get(url.clone())
            .basic_auth(
                &self.credentials.secret_id,
                Some(&self.credentials.secret_password),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(transport)?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Prefers the provider's `{code, message}` envelope, either bare or as the
/// first element of a list, over the raw body.
fn api_error(status: u16, body: &[u8]) -> Error {
    let envelope = serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .or_else(|| {
            serde_json::from_slice::<Vec<ErrorResponse>>(body)
                .ok()
                .and_then(|errors| errors.into_iter().next())
        });

    match envelope {
        Some(ErrorResponse {
            code,
            message,
            detail,
        }) if code.is_some() || message.is_some() || detail.is_some() => Error::Api {
            status,
            code: code.unwrap_or_default(),
            message: message.or(detail).unwrap_or_default(),
        },
        _ => Error::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        },
    }
}
