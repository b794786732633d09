//!
//! src/fetch.rs
//!
//! Builds the http clients and talks to the discogs catalog: search for
//! master releases by artist, resolve a search hit into its full release
//! document. One attempt per call, failures are typed and returned.
//!

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use reqwest::{Client, header, redirect, RequestBuilder, Response};
use tracing::debug;

use crate::config::{CatalogConfig, HttpConfig, IdentityConfig};
use crate::extract;
use crate::types::{Record, ReleaseDetail};
use crate::IngestError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers_and_agent(
    http: &HttpConfig,
    headers: header::HeaderMap,
    user_agent: &str
) -> Result<Client, IngestError> {
    client_helper(http)
        .default_headers(headers)
        .user_agent(user_agent)
        .build()
        .map_err(|e| IngestError::Config(format!("build client: {e}")))
}

/// Client for json apis
pub fn json_client(http: &HttpConfig, id: &IdentityConfig) -> Result<Client, IngestError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_with_headers_and_agent(http, h, &id.user_agent)
}

/// Client without a default Accept, used for binary downloads and uploads
pub fn plain_client(http: &HttpConfig, id: &IdentityConfig) -> Result<Client, IngestError> {
    client_with_headers_and_agent(http, header::HeaderMap::new(), &id.user_agent)
}

/// Sends once. Non-success statuses become `UpstreamStatus`
pub async fn send_checked(request: RequestBuilder) -> Result<Response, IngestError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::UpstreamStatus {
            status: status.as_u16(),
            url: response.url().to_string()
        });
    }
    Ok(response)
}

/// Sends once and decodes the body as json
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, IngestError> {
    let response = send_checked(request).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Master releases of a search response. Hits without a resource url are
/// dropped since nothing could resolve them
pub fn filter_masters(doc: &Value) -> Vec<Record> {
    extract::seq(doc, &["results"])
        .iter()
        .filter(|hit| extract::opt_str(hit, &["type"]) == Some("master"))
        .filter_map(|hit| {
            let url = extract::opt_str(hit, &["resource_url"])?.trim();
            if url.is_empty() {
                return None;
            }
            Some(Record {
                url: url.to_string(),
                title: extract::str_or_empty(hit, &["title"]),
                image: extract::str_or_empty(hit, &["cover_image"])
            })
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct CatalogClient {
    pub http: Client,
    pub cfg: CatalogConfig
}

impl CatalogClient {
    pub fn new(
        http_cfg: &HttpConfig,
        identity: &IdentityConfig,
        cfg: &CatalogConfig
    ) -> Result<Self, IngestError> {
        let http = json_client(http_cfg, identity)?;
        Ok( Self { http, cfg: cfg.clone() })
    }

    fn join(&self, path: &str) -> Result<Url, IngestError> {
        self.cfg.base_url.join(path)
            .map_err(|e| IngestError::Config(format!("catalog url {path}: {e}")))
    }

    /// GET /database/search?q=&artist=&type=master&format=&per_page=&token=
    pub fn search_request(&self, artist: &str, token: &str) -> Result<RequestBuilder, IngestError> {
        let url = self.join("database/search")?;
        Ok(self.http.get(url).query(&[
            ("q", artist),
            ("artist", artist),
            ("type", "master"),
            ("format", self.cfg.format.as_str()),
            ("per_page", &self.cfg.per_page.to_string()),
            ("token", token)
        ]))
    }

    pub async fn search(&self, artist: &str, token: &str) -> Result<Vec<Record>, IngestError> {
        let doc: Value = send_json(self.search_request(artist, token)?).await?;
        let records = filter_masters(&doc);
        debug!(artist, hits = records.len(), "catalog.search.done");
        Ok(records)
    }

    /// GET {resource_url}, the locator is used exactly as upstream gave it
    pub fn release_request(&self, url: &str, token: Option<&str>) -> Result<RequestBuilder, IngestError> {
        let url = Url::parse(url)
            .map_err(|e| IngestError::Decode(format!("release url {url}: {e}")))?;
        let rb = self.http.get(url);
        Ok(match token {
            Some(token) if !token.is_empty() =>
                rb.header(header::AUTHORIZATION, format!("Discogs token={token}")),
            _ => rb
        })
    }

    pub async fn resolve(&self, record: &Record, token: Option<&str>) ->
        Result<ReleaseDetail, IngestError> {
        let detail: ReleaseDetail = send_json(self.release_request(&record.url, token)?).await?;
        debug!(url = %record.url, "catalog.resolve.done");
        Ok(detail)
    }
}
