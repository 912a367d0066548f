// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{
    PageInfo, StoreError, StoreErrorKind, StoreResult, TaxonomyDirectory, TermBackend, TermPage,
    TermQuery,
};
use crate::config::ApiConfig;
use crate::term::{NewTerm, TaxonomyDescriptor, Term, TermId};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const TOTAL_HEADER: &str = "X-WP-Total";
pub const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";
pub const NONCE_HEADER: &str = "X-WP-Nonce";

/// Client for a WordPress-style `wp/v2` REST API.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WpError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireTaxonomy {
    slug: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    rest_base: String,
    #[serde(default)]
    hierarchical: bool,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    labels: BTreeMap<String, Option<String>>,
}

impl From<WireTaxonomy> for TaxonomyDescriptor {
    fn from(wire: WireTaxonomy) -> Self {
        let rest_base = if wire.rest_base.is_empty() {
            wire.slug.clone()
        } else {
            wire.rest_base
        };
        TaxonomyDescriptor {
            name: if wire.name.is_empty() {
                wire.slug.clone()
            } else {
                wire.name
            },
            slug: wire.slug,
            rest_base,
            hierarchical: wire.hierarchical,
            types: wire.types,
            labels: wire
                .labels
                .into_iter()
                .filter_map(|(key, value)| value.map(|value| (key, value)))
                .collect(),
        }
    }
}

impl RestClient {
    pub fn new(api: &ApiConfig) -> StoreResult<Self> {
        let endpoint = format!(
            "{}/{}",
            api.base_url.trim_end_matches('/'),
            api.namespace.trim_matches('/')
        );
        let mut client = Self::with_endpoint(endpoint, Duration::from_secs(api.timeout_seconds))?;
        if let (Some(username), Some(password)) = (&api.username, &api.application_password) {
            client.credentials = Some((username.clone(), password.clone()));
        }
        client.nonce = api.nonce.clone();
        Ok(client)
    }

    /// `endpoint` is the namespace root, e.g. `https://example.org/wp-json/wp/v2`.
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("taxbox/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::new(StoreErrorKind::Transport, err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credentials: None,
            nonce: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(nonce) = &self.nonce {
            builder = builder.header(NONCE_HEADER, nonce);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    /// Writes term assignments back to the content item.
    pub async fn update_item(
        &self,
        item_rest_base: &str,
        id: u64,
        body: &serde_json::Value,
    ) -> StoreResult<()> {
        let path = format!("{}/{}", item_rest_base, id);
        debug!("updating {} with {}", path, body);
        self.send(self.request(Method::POST, &path).json(body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TermBackend for RestClient {
    async fn fetch_terms(&self, rest_base: &str, query: &TermQuery) -> StoreResult<TermPage> {
        let pairs = query_pairs(query);
        let response = self
            .send(self.request(Method::GET, rest_base).query(&pairs))
            .await?;
        let headers = response.headers().clone();
        let terms: Vec<Term> = response.json().await.map_err(transport_error)?;
        let info = page_info(&headers, query, terms.len())?;
        Ok(TermPage { terms, info })
    }

    async fn create_term(&self, rest_base: &str, term: &NewTerm) -> StoreResult<Term> {
        let response = self
            .send(self.request(Method::POST, rest_base).json(term))
            .await?;
        response.json().await.map_err(transport_error)
    }

    async fn destroy_term(&self, rest_base: &str, id: TermId, force: bool) -> StoreResult<()> {
        let path = format!("{}/{}", rest_base, id);
        self.send(
            self.request(Method::DELETE, &path)
                .query(&[("force", if force { "true" } else { "false" })]),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TaxonomyDirectory for RestClient {
    async fn fetch_taxonomies(&self, post_type: &str) -> StoreResult<Vec<TaxonomyDescriptor>> {
        let response = self
            .send(self.request(Method::GET, "taxonomies").query(&[("type", post_type)]))
            .await?;
        let listed: BTreeMap<String, WireTaxonomy> =
            response.json().await.map_err(transport_error)?;
        Ok(listed.into_values().map(TaxonomyDescriptor::from).collect())
    }
}

/// `number` is always sent; `per_page` only when it is a real page size,
/// since stock servers reject `per_page=0`.
pub fn query_pairs(query: &TermQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(number) = query.number {
        pairs.push(("number", number.to_string()));
        if number > 0 {
            pairs.push(("per_page", number.to_string()));
        }
    }
    if let Some(page) = query.page {
        pairs.push(("page", page.to_string()));
    }
    if let Some(offset) = query.offset {
        pairs.push(("offset", offset.to_string()));
    }
    if let Some(hide_empty) = query.hide_empty {
        pairs.push(("hide_empty", hide_empty.to_string()));
    }
    if let Some(post) = query.post {
        pairs.push(("post", post.to_string()));
    }
    if let Some(search) = &query.search {
        pairs.push(("search", search.clone()));
    }
    if let Some(parent) = query.parent {
        pairs.push(("parent", parent.to_string()));
    }
    pairs
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// An unbounded query must come back as exactly one complete page.
fn page_info(headers: &HeaderMap, query: &TermQuery, received: usize) -> StoreResult<PageInfo> {
    let total = header_number(headers, TOTAL_HEADER).unwrap_or(received as u64);
    let total_pages = header_number(headers, TOTAL_PAGES_HEADER).unwrap_or(1);
    if query.is_unbounded() {
        if total_pages > 1 || total > received as u64 {
            return Err(StoreError::new(
                StoreErrorKind::Decode,
                format!(
                    "server paginated an unbounded query: {} of {} terms over {} pages",
                    received, total, total_pages
                ),
            ));
        }
        return Ok(PageInfo {
            total,
            total_pages: 1,
            page: 1,
        });
    }
    let page = match (query.number, query.offset, query.page) {
        (Some(number), Some(offset), _) => u64::from(offset / number + 1),
        (_, _, Some(page)) => u64::from(page.max(1)),
        _ => 1,
    };
    Ok(PageInfo {
        total,
        total_pages,
        page,
    })
}

/// Maps an HTTP status and WordPress error code to an error kind.
pub fn classify_status(status: u16, code: &str) -> StoreErrorKind {
    match status {
        400 => StoreErrorKind::Validation,
        401 | 403 => StoreErrorKind::Forbidden,
        404 | 410 => StoreErrorKind::NotFound,
        409 => StoreErrorKind::Conflict,
        501 if code == "rest_trash_not_supported" => StoreErrorKind::Conflict,
        408 | 504 => StoreErrorKind::Timeout,
        500..=599 => StoreErrorKind::Unavailable,
        _ => StoreErrorKind::Transport,
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<WpError>(&body) {
        Ok(error) => (error.code, error.message),
        Err(_) => (String::new(), body),
    };
    let message = if message.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        message
    };
    warn!("REST request failed with {}: {} {}", status, code, message);
    Err(StoreError::new(classify_status(status.as_u16(), &code), message).with_status(status.as_u16()))
}

fn transport_error(err: reqwest::Error) -> StoreError {
    let kind = if err.is_timeout() {
        StoreErrorKind::Timeout
    } else if err.is_decode() {
        StoreErrorKind::Decode
    } else {
        StoreErrorKind::Transport
    };
    let error = StoreError::new(kind, err.to_string());
    match err.status() {
        Some(status) => error.with_status(status.as_u16()),
        None => error,
    }
}
