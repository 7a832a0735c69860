//! Dashboard-side HTTP client for the edge proxy.
//!
//! Reads go through the [`QueryCache`] and are keyed with the resource key
//! factory. Writes are sent once and, on success, invalidate every key their
//! [`Mutation`] touches.
use api_types::{
    Resource,
    account::{Account, AccountNew},
    transaction::{Transaction, TransactionNew},
};
use query_cache::{CacheConfig, Filters, KeyFactory, Mutation, QueryCache, QueryKey};
use reqwest::{Method, Url, header};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

pub use error::{ClientError, Result};

mod error;
pub mod messages;

const INTERNAL_PREFIX: [&str; 2] = ["api", "internal"];

#[derive(Debug, Clone)]
pub struct Client {
    /// `<base_url>/api/internal`.
    root: Url,
    http: reqwest::Client,
    cache: QueryCache,
}

impl Client {
    pub fn new(base_url: &str, config: CacheConfig) -> Result<Self> {
        let mut root = Url::parse(base_url)
            .map_err(|err| ClientError::Config(format!("invalid base_url: {err}")))?;
        root.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("invalid base_url: {base_url}")))?
            .pop_if_empty()
            .extend(INTERNAL_PREFIX);

        // 3xx from the edge are surfaced as errors, never followed.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            root,
            http,
            cache: QueryCache::new(config),
        })
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// `<base_url>/api/internal/<segments>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// `GET /api/internal/<resource>?<filters>`, cached under `list(filters)`.
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: Resource,
        filters: &Filters,
    ) -> Result<T> {
        let key = resource.keys().list(filters);
        self.query(&key, &[resource.as_str()], &filters.to_query_pairs())
            .await
    }

    /// `GET /api/internal/<resource>/<id>`, cached under `detail(id)`.
    pub async fn detail<T: DeserializeOwned>(&self, resource: Resource, id: &str) -> Result<T> {
        let key = resource.keys().detail(id);
        self.query(&key, &[resource.as_str(), id], &[]).await
    }

    /// `GET /api/internal/<resource>/<name>?<filters>`, e.g. analytics summaries.
    pub async fn scoped<T: DeserializeOwned>(
        &self,
        resource: Resource,
        name: &str,
        filters: &Filters,
    ) -> Result<T> {
        let key = resource.keys().scoped(name, filters);
        self.query(&key, &[resource.as_str(), name], &filters.to_query_pairs())
            .await
    }

    async fn query<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        segments: &[&str],
        query: &[(String, String)],
    ) -> Result<T> {
        self.cache.collect_garbage().await;
        let url = self.url(segments);
        let data = self
            .cache
            .fetch(key, || self.get_with_retry(&url, query))
            .await?;
        Ok(serde_json::from_value(data.as_ref().clone())?)
    }

    async fn get_with_retry(&self, url: &Url, query: &[(String, String)]) -> Result<Value> {
        let config = self.cache.config();
        let mut attempt = 0;
        loop {
            match self.send(Method::GET, url.clone(), query, None).await {
                Err(err) if err.is_retryable() && attempt < config.retry => {
                    let delay = config.retry_delay_for(attempt);
                    tracing::warn!(
                        "GET {} failed ({err}), retry {}/{} in {delay:?}",
                        url.path(),
                        attempt + 1,
                        config.retry
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result.and_then(|bytes| decode(&bytes)),
            }
        }
    }

    /// Sends a write to `/api/internal/<segments>` and returns the decoded
    /// `data`. See [`Client::write`] for invalidation.
    pub async fn mutate<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T> {
        let bytes = self.write(method, segments, &[], body).await?;
        Ok(serde_json::from_value(decode(&bytes)?)?)
    }

    /// Sends a write once. As soon as the backend accepts it, every key the
    /// classified mutation touches is invalidated, whatever the body holds.
    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<&B>,
    ) -> Result<Vec<u8>> {
        let body = body.map(serde_json::to_value).transpose()?;
        let url = self.url(segments);
        let path = url
            .path()
            .strip_prefix(self.root.path())
            .unwrap_or_default()
            .to_string();

        let bytes = self
            .send(method.clone(), url, query, body.as_ref())
            .await?;

        match Mutation::classify(method.as_str(), &path) {
            Some(mutation) => self.invalidate(mutation).await,
            None => tracing::debug!("no invalidation rule for {method} {path}"),
        }
        Ok(bytes)
    }

    /// Marks every cached key under the mutation's invalidation set stale.
    pub async fn invalidate(&self, mutation: Mutation) {
        for key in mutation.invalidation_keys() {
            self.cache.invalidate(&key).await;
        }
    }

    /// Raw body of a 2xx response; any other status becomes a [`ClientError`].
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Vec<u8>> {
        let mut req = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::from_response(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    pub async fn accounts(&self, filters: &Filters) -> Result<Vec<Account>> {
        self.list(Resource::Accounts, filters).await
    }

    pub async fn account(&self, id: &str) -> Result<Account> {
        self.detail(Resource::Accounts, id).await
    }

    pub async fn transactions(&self, filters: &Filters) -> Result<Vec<Transaction>> {
        self.list(Resource::Transactions, filters).await
    }

    pub async fn create_account(&self, payload: &AccountNew) -> Result<Account> {
        self.mutate(Method::POST, &["accounts"], Some(payload)).await
    }

    pub async fn create_transaction(&self, payload: &TransactionNew) -> Result<Transaction> {
        self.mutate(Method::POST, &["transactions"], Some(payload))
            .await
    }

    /// Deletes an account, optionally moving its transactions to `transfer_to`.
    /// The response body is ignored.
    pub async fn delete_account(&self, id: &str, transfer_to: Option<&str>) -> Result<()> {
        let query: Vec<(String, String)> = transfer_to
            .map(|target| ("transferTo".to_string(), target.to_string()))
            .into_iter()
            .collect();
        self.write::<Value>(Method::DELETE, &["accounts", id], &query, None)
            .await
            .map(|_| ())
    }
}

/// Empty bodies decode to `null`.
fn decode(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(unwrap_envelope(value))
}

/// `{success, data}` responses yield `data`; anything else is returned whole.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut object)
            if object.get("success").is_some_and(Value::is_boolean)
                && object.contains_key("data") =>
        {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
