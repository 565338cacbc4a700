//! The lazy, chainable search builder.
//!
//! A [`SearchSet`] accumulates query directives without touching the network.
//! Each chain method returns a new `SearchSet`; the receiver is left as it
//! was, so a base search can be shared and refined freely. Requests happen
//! only in the terminal operations (`fetch`, `get`, `count`, ...).
//!
//! # Directive Order
//!
//! Filters, `_has` filters and includes are rendered first, in call order;
//! a repeated `search` on the same field adds another parameter instead of
//! replacing the first. They are followed by `_elements`, `_sort`, `_count`
//! and `page`, in that order whatever the call order. `limit`, `page`, `sort`
//! and `elements` replace any earlier value of the same directive.
//!
//! # Example
//!
//! ```rust,ignore
//! use fhir_client::search::Include;
//!
//! let search = client
//!     .resources("Patient")
//!     .search("name", "John")
//!     .search("name", "Rivera")
//!     .search("birthdate__ge", "1990")
//!     .include(Include::new("Patient", "general-practitioner"))
//!     .sort(&["-birthdate"])
//!     .limit(20);
//!
//! assert_eq!(
//!     search.query_string()?,
//!     "name=John&name=Rivera&birthdate=ge1990&_include=Patient:general-practitioner\
//!      &_sort=-birthdate&_count=20"
//! );
//!
//! let first_page = search.fetch().await?;
//! let everything = search.fetch_all().await?;
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value};

use crate::clients::{blocking, encode_query, Executor, FhirClient, HttpMethod};
use crate::rest::model::check_resource_type;
use crate::rest::operations::{self, request_body};
use crate::rest::{operation_path, BundlePage, Dynamic, EntryDecoder, FhirError};
use crate::search::params::{encode_search_param, EncodingError, SearchValue};
use crate::search::Include;

/// A lazy search over one resource type.
///
/// `D` decides what entries decode into: [`Dynamic`] resources by default,
/// or a typed model for searches built with `resources_of::<T>()`.
pub struct SearchSet<C, D = Dynamic> {
    client: C,
    resource_type: String,
    params: Vec<(String, String)>,
    paging: Paging,
    error: Option<EncodingError>,
    decoder: PhantomData<fn() -> D>,
}

/// Single-valued directives, rendered after the filters.
#[derive(Clone, Debug, Default)]
struct Paging {
    elements: Option<String>,
    sort: Option<String>,
    count: Option<u32>,
    page: Option<u32>,
}

impl Paging {
    fn pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        [
            ("_elements", self.elements.clone()),
            ("_sort", self.sort.clone()),
            ("_count", self.count.map(|count| count.to_string())),
            ("page", self.page.map(|page| page.to_string())),
        ]
        .into_iter()
        .filter_map(|(name, value)| Some((name.to_string(), value?)))
    }
}

impl<C: Clone, D> Clone for SearchSet<C, D> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            resource_type: self.resource_type.clone(),
            params: self.params.clone(),
            paging: self.paging.clone(),
            error: self.error.clone(),
            decoder: PhantomData,
        }
    }
}

impl<C, D> fmt::Debug for SearchSet<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSet")
            .field("resource_type", &self.resource_type)
            .field("params", &self.params)
            .field("paging", &self.paging)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<C: Executor, D> SearchSet<C, D> {
    pub(crate) fn new(client: C, resource_type: impl Into<String>) -> Self {
        Self {
            client,
            resource_type: resource_type.into(),
            params: Vec::new(),
            paging: Paging::default(),
            error: None,
            decoder: PhantomData,
        }
    }

    /// Returns the searched resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Adds a filter. See [`encode_search_param`] for the key grammar.
    ///
    /// An unencodable filter is reported by the terminal operation.
    #[must_use]
    pub fn search(&self, key: &str, value: impl Into<SearchValue>) -> Self {
        let encoded = encode_search_param(key, &value.into());
        self.extended(encoded)
    }

    /// Adds a parameter sent exactly as given.
    #[must_use]
    pub fn raw(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extended(Ok(vec![(key.into(), value.into())]))
    }

    /// Adds a `_has` reverse-chain filter.
    ///
    /// `chain` lists `(ResourceType, search-parameter)` pairs from the outer
    /// to the inner resource; `key` and `value` are the final filter on the
    /// innermost resource.
    ///
    /// ```rust,ignore
    /// // _has:Observation:patient:_has:AuditEvent:entity:user=id
    /// client.resources("Patient")
    ///     .has(&[("Observation", "patient"), ("AuditEvent", "entity")], "user", "id");
    /// ```
    #[must_use]
    pub fn has(&self, chain: &[(&str, &str)], key: &str, value: impl Into<SearchValue>) -> Self {
        if chain.is_empty() {
            return self.extended(Err(EncodingError::new(
                key,
                "_has needs at least one (type, parameter) pair",
            )));
        }
        let prefix = chain
            .iter()
            .map(|(resource_type, attr)| format!("_has:{resource_type}:{attr}"))
            .collect::<Vec<_>>()
            .join(":");

        let encoded = encode_search_param(key, &value.into()).map(|pairs| {
            pairs
                .into_iter()
                .map(|(name, value)| (format!("{prefix}:{name}"), value))
                .collect()
        });
        self.extended(encoded)
    }

    /// Adds an `_include` directive.
    #[must_use]
    pub fn include(&self, include: Include) -> Self {
        self.extended(include.to_param(false).map(|pair| vec![pair]))
    }

    /// Adds a `_revinclude` directive.
    #[must_use]
    pub fn revinclude(&self, include: Include) -> Self {
        self.extended(include.to_param(true).map(|pair| vec![pair]))
    }

    /// Sets the page size (`_count`).
    #[must_use]
    pub fn limit(&self, count: u32) -> Self {
        let mut next = self.clone();
        next.paging.count = Some(count);
        next
    }

    /// Selects a page by number (`page`).
    #[must_use]
    pub fn page(&self, page: u32) -> Self {
        let mut next = self.clone();
        next.paging.page = Some(page);
        next
    }

    /// Sets the sort order (`_sort`); prefix a key with `-` for descending.
    #[must_use]
    pub fn sort(&self, keys: &[&str]) -> Self {
        let mut next = self.clone();
        next.paging.sort = Some(keys.join(","));
        next
    }

    /// Restricts returned elements (`_elements`).
    ///
    /// `id` and `resourceType` are always requested. With `exclude`, the
    /// listed elements are left out instead (`_elements=-a,b`).
    #[must_use]
    pub fn elements(&self, attrs: &[&str], exclude: bool) -> Self {
        let mut names: Vec<&str> = Vec::new();
        let required: &[&str] = if exclude { &[] } else { &["id", "resourceType"] };
        for name in attrs.iter().chain(required) {
            if !names.contains(name) {
                names.push(*name);
            }
        }
        let prefix = if exclude { "-" } else { "" };
        let mut next = self.clone();
        next.paging.elements = Some(format!("{prefix}{}", names.join(",")));
        next
    }

    /// Returns the query parameters in wire order.
    ///
    /// # Errors
    ///
    /// Returns the first [`EncodingError`] raised while building the search.
    pub fn query_params(&self) -> Result<Vec<(String, String)>, EncodingError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(self
            .params
            .iter()
            .cloned()
            .chain(self.paging.pairs())
            .collect())
    }

    /// Returns the encoded query string.
    ///
    /// # Errors
    ///
    /// Returns the first [`EncodingError`] raised while building the search.
    pub fn query_string(&self) -> Result<String, EncodingError> {
        Ok(encode_query(&self.query_params()?))
    }

    /// Returns the request path, e.g. `Patient?name=John&_count=10`.
    ///
    /// # Errors
    ///
    /// Returns the first [`EncodingError`] raised while building the search.
    pub fn request_path(&self) -> Result<String, EncodingError> {
        let query = self.query_string()?;
        if query.is_empty() {
            Ok(self.resource_type.clone())
        } else {
            Ok(format!("{}?{query}", self.resource_type))
        }
    }

    /// Returns a cursor over result pages.
    #[must_use]
    pub fn pages(&self) -> Pages<C, D> {
        Pages {
            search: self.clone(),
            cursor: Some(Cursor::First),
        }
    }

    fn extended(&self, pairs: Result<Vec<(String, String)>, EncodingError>) -> Self {
        let mut next = self.clone();
        match pairs {
            Ok(pairs) => next.params.extend(pairs),
            Err(error) => {
                next.error.get_or_insert(error);
            }
        }
        next
    }

}

impl<C: Executor, D: EntryDecoder<C>> SearchSet<C, D> {
    fn checked_params(&self) -> Result<Vec<(String, String)>, FhirError> {
        Ok(self.query_params()?)
    }

    fn decode_page(&self, page: BundlePage) -> Result<Vec<D::Output>, FhirError> {
        page.into_type(&self.resource_type)
            .into_iter()
            .map(|entry| D::decode(&self.client, entry))
            .collect()
    }

    fn decode_or(&self, body: Option<Value>, fallback: Value) -> Result<D::Output, FhirError> {
        D::decode(&self.client, body.unwrap_or(fallback))
    }

    fn encode_own(&self, resource: &D::Output) -> Result<Value, FhirError> {
        let value = D::encode(resource)?;
        check_resource_type(&self.resource_type, &value)?;
        Ok(value)
    }

    async fn fetch_raw_impl(&self) -> Result<Value, FhirError> {
        let params = self.checked_params()?;
        request_body(&self.client, HttpMethod::Get, &self.resource_type, None, params).await
    }

    async fn fetch_impl(&self) -> Result<Vec<D::Output>, FhirError> {
        let page = BundlePage::parse(self.fetch_raw_impl().await?)?;
        self.decode_page(page)
    }

    async fn fetch_all_impl(&self) -> Result<Vec<D::Output>, FhirError> {
        let mut pages = self.pages();
        let mut all = Vec::new();
        while let Some(batch) = pages.next_impl().await? {
            all.extend(batch);
        }
        Ok(all)
    }

    async fn first_impl(&self) -> Result<Option<D::Output>, FhirError> {
        Ok(self.limit(1).fetch_impl().await?.into_iter().next())
    }

    async fn get_impl(&self) -> Result<D::Output, FhirError> {
        let mut found = self.limit(2).fetch_impl().await?;
        match found.len() {
            0 => Err(FhirError::ResourceNotFound {
                message: format!("no {} matches the search", self.resource_type),
            }),
            1 => found.pop().ok_or_else(|| FhirError::ResourceNotFound {
                message: format!("no {} matches the search", self.resource_type),
            }),
            _ => Err(FhirError::MultipleResourcesFound {
                message: format!("more than one {} matches the search", self.resource_type),
            }),
        }
    }

    async fn count_impl(&self) -> Result<u64, FhirError> {
        let search = self.limit(0).raw("_totalMethod", "count");
        let bundle = search.fetch_raw_impl().await?;
        BundlePage::parse(bundle)?
            .total()
            .ok_or_else(|| FhirError::InvalidResponse {
                message: "search response has no total".to_string(),
            })
    }

    async fn conditional_write(
        &self,
        method: HttpMethod,
        resource: &D::Output,
    ) -> Result<(D::Output, bool), FhirError> {
        let params = self.checked_params()?;
        let body = self.encode_own(resource)?;
        let (response, status) = self
            .client
            .core()
            .send(method, &self.resource_type, Some(body.clone()), params)
            .await?;
        Ok((self.decode_or(response, body)?, status == 201))
    }

    async fn patch_impl(&self, fields: Map<String, Value>) -> Result<D::Output, FhirError> {
        let params = self.checked_params()?;
        let body = request_body(
            &self.client,
            HttpMethod::Patch,
            &self.resource_type,
            Some(Value::Object(fields)),
            params,
        )
        .await?;
        D::decode(&self.client, body)
    }

    async fn delete_impl(&self) -> Result<(Option<Value>, u16), FhirError> {
        let params = self.checked_params()?;
        self.client
            .core()
            .send(HttpMethod::Delete, &self.resource_type, None, params)
            .await
    }

    async fn execute_impl(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        let path = operation_path(&self.resource_type, operation);
        operations::execute(&self.client, method, &path, data, params).await
    }
}

impl<D: EntryDecoder<FhirClient>> SearchSet<FhirClient, D> {
    /// Fetches the first page and returns its entries of the searched type,
    /// in server order.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Encoding`] for an unencodable filter, or another
    /// [`FhirError`] if the request fails.
    pub async fn fetch(&self) -> Result<Vec<D::Output>, FhirError> {
        self.fetch_impl().await
    }

    /// Fetches the first page as the raw `Bundle`, included resources and
    /// all.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the search cannot be encoded or the request
    /// fails.
    pub async fn fetch_raw(&self) -> Result<Value, FhirError> {
        self.fetch_raw_impl().await
    }

    /// Follows `next` links until the last page and returns every entry of
    /// the searched type. Pages are requested one after another.
    ///
    /// # Errors
    ///
    /// Returns the first [`FhirError`] met; pages fetched before it are
    /// dropped. Use [`pages`](Self::pages) to keep partial results.
    pub async fn fetch_all(&self) -> Result<Vec<D::Output>, FhirError> {
        self.fetch_all_impl().await
    }

    /// Returns the first match, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the search cannot be encoded or the request
    /// fails.
    pub async fn first(&self) -> Result<Option<D::Output>, FhirError> {
        self.first_impl().await
    }

    /// Returns the only match.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] when nothing matches,
    /// [`FhirError::MultipleResourcesFound`] when several resources match,
    /// or another [`FhirError`] if the request fails.
    pub async fn get(&self) -> Result<D::Output, FhirError> {
        self.get_impl().await
    }

    /// Returns the number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidResponse`] if the server reports no
    /// total, or another [`FhirError`] if the request fails.
    pub async fn count(&self) -> Result<u64, FhirError> {
        self.count_impl().await
    }

    /// Conditional create: returns the existing match, or creates
    /// `resource`. The flag is `true` when a resource was created.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MultipleResourcesFound`] when several resources
    /// match, [`FhirError::ResourceTypeMismatch`] if `resource` is of
    /// another type, or another [`FhirError`] if the request fails.
    pub async fn get_or_create(
        &self,
        resource: &D::Output,
    ) -> Result<(D::Output, bool), FhirError> {
        self.conditional_write(HttpMethod::Post, resource).await
    }

    /// Conditional update: overwrites the single match, or creates
    /// `resource` when nothing matches. The flag is `true` when a resource
    /// was created.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MultipleResourcesFound`] when several resources
    /// match, or another [`FhirError`] if the request fails.
    pub async fn update(&self, resource: &D::Output) -> Result<(D::Output, bool), FhirError> {
        self.conditional_write(HttpMethod::Put, resource).await
    }

    /// Conditional patch of the single match.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] when nothing matches,
    /// [`FhirError::MultipleResourcesFound`] when several resources match,
    /// or another [`FhirError`] if the request fails.
    pub async fn patch<I, K, V>(&self, fields: I) -> Result<D::Output, FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.patch_impl(operations::collect_fields(fields)).await
    }

    /// Conditional delete. Returns the response body and status code.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MultipleResourcesFound`] if the server refuses
    /// to delete several matches, or another [`FhirError`] on failure.
    pub async fn delete(&self) -> Result<(Option<Value>, u16), FhirError> {
        self.delete_impl().await
    }

    /// Calls a type-level operation (`Type/operation`).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub async fn execute(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        self.execute_impl(operation, method, data, params).await
    }
}

impl<D: EntryDecoder<blocking::FhirClient>> SearchSet<blocking::FhirClient, D> {
    /// Fetches the first page. See [`SearchSet::fetch`].
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the search cannot be encoded or the request
    /// fails.
    pub fn fetch(&self) -> Result<Vec<D::Output>, FhirError> {
        self.client.block_on(self.fetch_impl())
    }

    /// Fetches the first page as the raw `Bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the search cannot be encoded or the request
    /// fails.
    pub fn fetch_raw(&self) -> Result<Value, FhirError> {
        self.client.block_on(self.fetch_raw_impl())
    }

    /// Fetches every page.
    ///
    /// # Errors
    ///
    /// Returns the first [`FhirError`] met.
    pub fn fetch_all(&self) -> Result<Vec<D::Output>, FhirError> {
        self.client.block_on(self.fetch_all_impl())
    }

    /// Returns the first match, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn first(&self) -> Result<Option<D::Output>, FhirError> {
        self.client.block_on(self.first_impl())
    }

    /// Returns the only match.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] or
    /// [`FhirError::MultipleResourcesFound`] unless exactly one resource
    /// matches.
    pub fn get(&self) -> Result<D::Output, FhirError> {
        self.client.block_on(self.get_impl())
    }

    /// Returns the number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn count(&self) -> Result<u64, FhirError> {
        self.client.block_on(self.count_impl())
    }

    /// Conditional create.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MultipleResourcesFound`] when several resources
    /// match, or another [`FhirError`] if the request fails.
    pub fn get_or_create(&self, resource: &D::Output) -> Result<(D::Output, bool), FhirError> {
        self.client
            .block_on(self.conditional_write(HttpMethod::Post, resource))
    }

    /// Conditional update.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MultipleResourcesFound`] when several resources
    /// match, or another [`FhirError`] if the request fails.
    pub fn update(&self, resource: &D::Output) -> Result<(D::Output, bool), FhirError> {
        self.client
            .block_on(self.conditional_write(HttpMethod::Put, resource))
    }

    /// Conditional patch.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] unless exactly one resource matches and the
    /// request succeeds.
    pub fn patch<I, K, V>(&self, fields: I) -> Result<D::Output, FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.client
            .block_on(self.patch_impl(operations::collect_fields(fields)))
    }

    /// Conditional delete.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn delete(&self) -> Result<(Option<Value>, u16), FhirError> {
        self.client.block_on(self.delete_impl())
    }

    /// Calls a type-level operation.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn execute(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        self.client
            .block_on(self.execute_impl(operation, method, data, params))
    }
}

#[derive(Debug, Clone)]
enum Cursor {
    First,
    Link(String),
}

/// Page-by-page retrieval of a search.
///
/// Each page is requested only after the previous one arrived, following
/// the server's `next` link (absolute links must stay under the base URL).
/// Pages already returned stay with the caller when a later page fails, and
/// the cursor is exhausted after an error.
///
/// With the blocking client, `Pages` is an [`Iterator`]:
///
/// ```rust,ignore
/// for page in client.resources("Observation").limit(100).pages() {
///     for observation in page? {
///         println!("{:?}", observation.id());
///     }
/// }
/// ```
pub struct Pages<C, D = Dynamic> {
    search: SearchSet<C, D>,
    cursor: Option<Cursor>,
}

impl<C, D> fmt::Debug for Pages<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pages")
            .field("search", &self.search)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<C: Executor, D: EntryDecoder<C>> Pages<C, D> {
    async fn next_impl(&mut self) -> Result<Option<Vec<D::Output>>, FhirError> {
        let Some(cursor) = self.cursor.take() else {
            return Ok(None);
        };

        let bundle = match cursor {
            Cursor::First => self.search.fetch_raw_impl().await?,
            Cursor::Link(url) => {
                tracing::trace!(url = %url, "following next page link");
                request_body(&self.search.client, HttpMethod::Get, &url, None, Vec::new()).await?
            }
        };

        let page = BundlePage::parse(bundle)?;
        tracing::trace!(
            entries = page.len(),
            has_next = page.next_link().is_some(),
            "received search page"
        );
        self.cursor = page.next_link().map(|link| Cursor::Link(link.to_string()));
        self.search.decode_page(page).map(Some)
    }
}

impl<D: EntryDecoder<FhirClient>> Pages<FhirClient, D> {
    /// Fetches the next page, or returns `None` after the last one.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails; the cursor is then
    /// exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<D::Output>>, FhirError> {
        self.next_impl().await
    }
}

impl<D: EntryDecoder<blocking::FhirClient>> Iterator for Pages<blocking::FhirClient, D> {
    type Item = Result<Vec<D::Output>, FhirError>;

    fn next(&mut self) -> Option<Self::Item> {
        let client = self.search.client.clone();
        client.block_on(self.next_impl()).transpose()
    }
}
