//! Rich query translation and pagination.
//!
//! Rich queries are evaluated locally by a subset of replicas and may return
//! different results on different replicas. A state transition computed from
//! one would not be agreed upon by the network, so rich queries only run in
//! requests classified as read-only.

use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::asset::AssetKind;
use crate::errors::{Result, ThothError};
use crate::ledger::LedgerStub;
use crate::store::{LedgerStore, StoredEnvelope};

/// A requested page: the cursor returned by the previous page (empty for the
/// first page) and the number of items wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub token: String,
    pub size: u32,
}

impl Pagination {
    pub fn new(token: impl Into<String>, size: u32) -> Self {
        Self {
            token: token.into(),
            size,
        }
    }

    /// The first page of `size` items. A size of 0 asks for the configured
    /// default page size.
    pub fn first(size: u32) -> Self {
        Self::new(String::new(), size)
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    /// Cursor of the next page, empty when there is none.
    pub next_token: String,
}

impl<T> QueryResult<T> {
    pub fn has_more(&self) -> bool {
        !self.next_token.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A query over the assets of one kind.
///
/// The filter is matched against the asset payload: every field it names must
/// be equal in the payload, nested objects are matched field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetQuery {
    kind: AssetKind,
    filter: Map<String, Value>,
    sort: Vec<(String, SortDirection)>,
}

impl AssetQuery {
    /// Every asset of `kind`.
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            filter: Map::new(),
            sort: Vec::new(),
        }
    }

    /// Restricts the query to payloads whose `field` equals `value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    /// Restricts the query to payloads whose `field` is one of `values`.
    pub fn filter_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter.insert(field.into(), json!({ "$in": values }));
        self
    }

    /// Orders results by the payload `field`. Ties are broken by the next sort
    /// field, and finally by ledger key.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((field.into(), direction));
        self
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Builds the rich query document.
    ///
    /// ```
    /// use thoth::AssetKind;
    /// use thoth::store::AssetQuery;
    ///
    /// let query = AssetQuery::new(AssetKind::ComputeTask).filter("status", "DOING");
    /// assert_eq!(
    ///     query.to_document(),
    ///     r#"{"selector":{"asset":{"status":"DOING"},"doc_type":"computetask"}}"#
    /// );
    /// ```
    pub fn to_document(&self) -> String {
        let mut selector = Map::new();
        selector.insert("doc_type".to_string(), json!(self.kind.as_str()));
        if !self.filter.is_empty() {
            selector.insert("asset".to_string(), Value::Object(self.filter.clone()));
        }

        let mut document = Map::new();
        document.insert("selector".to_string(), Value::Object(selector));
        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|(field, direction)| {
                    let direction = match direction {
                        SortDirection::Ascending => "asc",
                        SortDirection::Descending => "desc",
                    };
                    let mut clause = Map::new();
                    clause.insert(format!("asset.{}", field), json!(direction));
                    Value::Object(clause)
                })
                .collect();
            document.insert("sort".to_string(), Value::Array(sort));
        }
        Value::Object(document).to_string()
    }
}

impl<S: LedgerStub> LedgerStore<'_, S> {
    /// Fails unless the request was classified read-only.
    fn ensure_read_only(&self) -> Result<()> {
        let method = self.context().method();
        match self.context().read_only() {
            Some(true) => Ok(()),
            Some(false) => {
                warn!("Rejected rich query issued by mutating call {}", method);
                Err(ThothError::BadRequest(format!(
                    "{} is not read-only: rich queries are only allowed in read-only calls",
                    method
                )))
            }
            None => {
                error!("Rich query issued by {} before its consistency flag was set", method);
                Err(ThothError::Internal(format!(
                    "consistency flag of {} is not set",
                    method
                )))
            }
        }
    }

    /// The page size to use for `pagination`: its own size, or the default
    /// page size when it asks for 0.
    fn resolve_page_size(&self, pagination: &Pagination) -> Result<u32> {
        let config = self.query_config();
        let size = match pagination.size {
            0 => config.default_page_size,
            size => size,
        };
        if size > config.max_page_size {
            return Err(ThothError::BadRequest(format!(
                "page size {} exceeds the maximum {}",
                size, config.max_page_size
            )));
        }
        Ok(size)
    }

    /// Runs a paginated query and returns raw payloads.
    ///
    /// One row more than the page size is requested from the ledger: when it
    /// comes back, the page is not the last one and the cursor handed out is
    /// the ledger bookmark that resumes right after the last row kept. The
    /// extra row is served again as the first row of the next page.
    pub fn query_bytes(
        &mut self,
        query: &AssetQuery,
        pagination: &Pagination,
    ) -> Result<QueryResult<Vec<u8>>> {
        self.ensure_read_only()?;
        let page_size = self.resolve_page_size(pagination)?;

        let document = query.to_document();
        debug!(
            "Rich query {} (size {}, token {:?})",
            document, page_size, pagination.token
        );
        let page = self.stub().get_query_result_with_pagination(
            &document,
            page_size.saturating_add(1),
            &pagination.token,
        )?;

        let size = page_size as usize;
        let mut rows = page.rows;
        let next_token = if rows.len() > size {
            rows.truncate(size);
            rows.last().map(|row| row.resume.clone()).unwrap_or_default()
        } else {
            String::new()
        };

        let items = rows
            .iter()
            .map(|row| decode_payload(query.kind(), &row.value))
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult { items, next_token })
    }

    /// Runs a paginated query.
    pub fn query<T: DeserializeOwned>(
        &mut self,
        query: &AssetQuery,
        pagination: &Pagination,
    ) -> Result<QueryResult<T>> {
        let page = self.query_bytes(query, pagination)?;
        let items = page
            .items
            .iter()
            .map(|payload| serde_json::from_slice(payload).map_err(ThothError::from))
            .collect::<Result<Vec<T>>>()?;
        Ok(QueryResult {
            items,
            next_token: page.next_token,
        })
    }

    /// Runs a query without pagination. Meant for internal lookups whose
    /// result size is bounded by construction.
    pub fn query_unpaged_bytes(&mut self, query: &AssetQuery) -> Result<Vec<Vec<u8>>> {
        self.ensure_read_only()?;

        let document = query.to_document();
        debug!("Unpaged rich query {}", document);
        self.stub()
            .get_query_result(&document)?
            .iter()
            .map(|row| decode_payload(query.kind(), &row.value))
            .collect()
    }

    /// Runs a query without pagination.
    pub fn query_unpaged<T: DeserializeOwned>(&mut self, query: &AssetQuery) -> Result<Vec<T>> {
        self.query_unpaged_bytes(query)?
            .iter()
            .map(|payload| serde_json::from_slice(payload).map_err(ThothError::from))
            .collect()
    }
}

fn decode_payload(kind: AssetKind, stored: &[u8]) -> Result<Vec<u8>> {
    let envelope = StoredEnvelope::decode(stored)?;
    if !envelope.is_kind(kind) {
        return Err(ThothError::Internal(format!(
            "query for {} returned a {}",
            kind, envelope.doc_type
        )));
    }
    Ok(envelope.payload())
}
