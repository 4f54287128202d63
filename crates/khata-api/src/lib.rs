// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use khata_app::{
    CustomerId, Dashboard, DashboardApi, DateRange, KhataError, ListCriteria, ListEntity, Loan,
    LoanApi, LoanFormInput, LoanId, RemoteCollection, wire,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

type RemoteResult<T> = khata_app::Result<T>;

/// Rows per list request when the caller sets no limit; the API caps `limit` at 100.
const LIST_PAGE_SIZE: u32 = 100;
const MAX_LIST_PAGES: u32 = 10_000;

/// Blocking client for the khata REST API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            bail!("api.base_url must be an http(s) URL, got {trimmed:?}");
        }
        if timeout.is_zero() {
            bail!("api.timeout must be positive");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Typed handle on one collection endpoint.
    pub fn collection<E: ListEntity>(&self) -> RestCollection<E> {
        RestCollection {
            client: self.clone(),
            entity: PhantomData,
        }
    }

    /// Hits the API root; returns the greeting the server reports.
    pub fn ping(&self) -> RemoteResult<String> {
        #[derive(serde::Deserialize)]
        struct Root {
            message: String,
        }
        let response = self.send(self.http.get(self.endpoint(&[""], &[])))?;
        let root: Root = decode(response, "api root")?;
        Ok(root.message)
    }

    fn endpoint(&self, segments: &[&str], query: &[(&'static str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let request = request
            .build()
            .map_err(|error| KhataError::network(format!("build request: {error}")))?;
        debug!(method = %request.method(), url = %request.url(), "api request");
        let response = self
            .http
            .execute(request)
            .map_err(|error| connection_error(self.base_url(), self.timeout, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(response: Response, what: &str) -> RemoteResult<T> {
    let url = response.url().clone();
    let body = response
        .bytes()
        .map_err(|error| KhataError::network(format!("read {what} from {url}: {error}")))?;
    serde_json::from_slice(&body)
        .map_err(|error| KhataError::server(format!("decode {what}: {error}")))
}

/// Collection routes for one entity: `/{entity}/`, `/{entity}/{id}`, and
/// `/{entity}/export/csv`.
#[derive(Debug, Clone)]
pub struct RestCollection<E> {
    client: Client,
    entity: PhantomData<fn() -> E>,
}

impl<E: ListEntity> RestCollection<E> {
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn list_url(&self, query: &[(&'static str, String)]) -> Url {
        // FastAPI mounts collection routes with a trailing slash.
        self.client.endpoint(&[E::KIND.path(), ""], query)
    }

    fn item_url(&self, id: &E::Id) -> Url {
        self.client
            .endpoint(&[E::KIND.path(), &id.to_string()], &[])
    }
}

impl<E> RemoteCollection<E> for RestCollection<E>
where
    E: ListEntity + DeserializeOwned,
    E::Draft: Serialize,
{
    /// Walks `page=1,2,...` until a short page, so callers get every row.
    fn list(&self, criteria: &ListCriteria) -> RemoteResult<Vec<E>> {
        let http = &self.client.http;
        let limit = criteria.limit.unwrap_or(LIST_PAGE_SIZE).max(1);
        let mut rows: Vec<E> = Vec::new();
        for page in 1..=MAX_LIST_PAGES {
            let query = criteria
                .clone()
                .with_limit(Some(limit))
                .with_page(Some(page));
            let response = self
                .client
                .send(http.get(self.list_url(&query.query_pairs())))?;
            let batch: Vec<E> = decode(response, E::KIND.label())?;
            if page > 1 && batch.first().map(ListEntity::id) == rows.first().map(ListEntity::id) {
                warn!(entity = E::KIND.label(), page, "server ignored paging; keeping first page");
                return Ok(rows);
            }
            let short = batch.len() < limit as usize;
            rows.extend(batch);
            if short {
                return Ok(rows);
            }
        }
        warn!(
            entity = E::KIND.label(),
            rows = rows.len(),
            "stopped after {MAX_LIST_PAGES} pages"
        );
        Ok(rows)
    }

    fn get(&self, id: &E::Id) -> RemoteResult<E> {
        let response = self.client.send(self.client.http.get(self.item_url(id)))?;
        decode(response, E::KIND.singular())
    }

    fn create(&self, draft: &E::Draft) -> RemoteResult<E> {
        let request = self.client.http.post(self.list_url(&[])).json(draft);
        decode(self.client.send(request)?, E::KIND.singular())
    }

    fn update(&self, id: &E::Id, draft: &E::Draft) -> RemoteResult<E> {
        let request = self.client.http.put(self.item_url(id)).json(draft);
        decode(self.client.send(request)?, E::KIND.singular())
    }

    fn delete(&self, id: &E::Id) -> RemoteResult<()> {
        self.client
            .send(self.client.http.delete(self.item_url(id)))?;
        Ok(())
    }

    fn export_csv(&self, criteria: &ListCriteria) -> RemoteResult<Vec<u8>> {
        let url = self.client.endpoint(
            &[E::KIND.path(), "export", "csv"],
            &criteria.query_pairs(),
        );
        let response = self.client.send(self.client.http.get(url))?;
        let body = response
            .bytes()
            .map_err(|error| KhataError::network(format!("read csv export: {error}")))?;
        Ok(body.to_vec())
    }
}

impl LoanApi for Client {
    fn list_loans(&self, customer: &CustomerId) -> RemoteResult<Vec<Loan>> {
        let url = self.endpoint(&["customers", customer.as_str(), "loans"], &[]);
        decode(self.send(self.http.get(url))?, "loans")
    }

    fn create_loan(&self, customer: &CustomerId, draft: &LoanFormInput) -> RemoteResult<Loan> {
        let url = self.endpoint(&["customers", customer.as_str(), "loans"], &[]);
        decode(self.send(self.http.post(url).json(draft))?, "loan")
    }

    fn mark_loan_paid(&self, customer: &CustomerId, loan: &LoanId) -> RemoteResult<Loan> {
        let url = self.endpoint(
            &["customers", customer.as_str(), "loans", loan.as_str(), "mark-paid"],
            &[],
        );
        decode(self.send(self.http.put(url))?, "loan")
    }
}

impl DashboardApi for Client {
    fn dashboard(&self, range: DateRange) -> RemoteResult<Dashboard> {
        let mut query = Vec::new();
        if let (Some(start), Some(end)) = (range.start, range.end) {
            query.push(("start_date", wire::format_date(start)));
            query.push(("end_date", wire::format_date(end)));
        }
        let url = self.endpoint(&["dashboard", ""], &query);
        decode(self.send(self.http.get(url))?, "dashboard")
    }
}

fn connection_error(base_url: &str, timeout: Duration, error: reqwest::Error) -> KhataError {
    if error.is_timeout() {
        return KhataError::network(format!(
            "{base_url} did not answer within {}s -- check the server or raise api.timeout",
            timeout.as_secs_f64()
        ));
    }
    KhataError::network(format!(
        "cannot reach {base_url} -- start the khata API server or fix api.base_url ({error})"
    ))
}

/// FastAPI reports `{"detail": "..."}`, or a list of `{"msg": ...}` entries
/// for request validation failures.
fn clean_error_response(status: StatusCode, body: &str) -> KhataError {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(detail) = parsed.detail
    {
        let message = match detail {
            serde_json::Value::String(message) => message,
            serde_json::Value::Array(entries) => entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        };
        if !message.is_empty() {
            return KhataError::server(format!("{}: {message}", status.as_u16()));
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return KhataError::server(format!("{}: {trimmed}", status.as_u16()));
    }

    KhataError::server(format!("server returned {}", status.as_u16()))
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    detail: Option<serde_json::Value>,
}
