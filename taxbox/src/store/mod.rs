// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod collection;
pub mod memory;
pub mod rest;

use crate::term::{NewTerm, TaxonomyDescriptor, Term, TermId};
use crate::util::{read_guard, write_guard};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, RwLock};

pub use collection::{SortKey, TermCollection};
pub use memory::MemoryBackend;
pub use rest::RestClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    Conflict,
    Validation,
    Forbidden,
    Transport,
    Timeout,
    Decode,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct StoreError {
    kind: StoreErrorKind,
    status: Option<u16>,
    message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Validation, message)
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Deletion refused because the term is still in use and no force flag was sent.
    pub fn is_conflict(&self) -> bool {
        self.kind == StoreErrorKind::Conflict
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} error (HTTP {}): {}", self.kind, status, self.message),
            None => write!(f, "{:?} error: {}", self.kind, self.message),
        }
    }
}

impl Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Collection query parameters understood by the term endpoints.
///
/// `number: Some(0)` asks for every term in one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermQuery {
    pub number: Option<u32>,
    pub page: Option<u32>,
    pub offset: Option<u32>,
    pub hide_empty: Option<bool>,
    pub post: Option<u64>,
    pub search: Option<String>,
    pub parent: Option<TermId>,
}

impl TermQuery {
    pub fn all() -> Self {
        Self {
            number: Some(0),
            ..Self::default()
        }
    }

    pub fn hide_empty(mut self, value: bool) -> Self {
        self.hide_empty = Some(value);
        self
    }

    pub fn for_post(mut self, post: u64) -> Self {
        self.post = Some(post);
        self
    }

    pub fn search(mut self, value: impl Into<String>) -> Self {
        self.search = Some(value.into());
        self
    }

    pub fn paged(mut self, number: u32, page: u32) -> Self {
        self.number = Some(number);
        self.page = Some(page);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn parent(mut self, parent: TermId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self.number, Some(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
}

impl PageInfo {
    pub fn single(total: u64) -> Self {
        Self {
            total,
            total_pages: 1,
            page: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TermPage {
    pub terms: Vec<Term>,
    pub info: PageInfo,
}

/// Transport side of the term collections, keyed by taxonomy `rest_base`.
#[async_trait]
pub trait TermBackend: Send + Sync {
    async fn fetch_terms(&self, rest_base: &str, query: &TermQuery) -> StoreResult<TermPage>;
    async fn create_term(&self, rest_base: &str, term: &NewTerm) -> StoreResult<Term>;
    async fn destroy_term(&self, rest_base: &str, id: TermId, force: bool) -> StoreResult<()>;
}

#[async_trait]
pub trait TaxonomyDirectory: Send + Sync {
    async fn fetch_taxonomies(&self, post_type: &str) -> StoreResult<Vec<TaxonomyDescriptor>>;
}

/// A term collection bound to one taxonomy endpoint.
///
/// Network calls never hold the collection lock; `fetch`, `create` and
/// `destroy` apply their result once the round-trip resolved.
pub struct TermStore {
    backend: Arc<dyn TermBackend>,
    rest_base: String,
    label: &'static str,
    collection: RwLock<TermCollection>,
    last_page: RwLock<Option<PageInfo>>,
}

impl TermStore {
    pub fn new(
        backend: Arc<dyn TermBackend>,
        rest_base: impl Into<String>,
        label: &'static str,
        sort: SortKey,
    ) -> Self {
        Self {
            backend,
            rest_base: rest_base.into(),
            label,
            collection: RwLock::new(TermCollection::new(sort)),
            last_page: RwLock::new(None),
        }
    }

    pub fn rest_base(&self) -> &str {
        &self.rest_base
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn sort_key(&self) -> SortKey {
        read_guard(&self.collection, self.label).sort_key()
    }

    pub fn last_page(&self) -> Option<PageInfo> {
        *read_guard(&self.last_page, self.label)
    }

    /// Round-trip only; the in-memory set is left untouched.
    pub async fn fetch_page(&self, query: &TermQuery) -> StoreResult<TermPage> {
        self.backend.fetch_terms(&self.rest_base, query).await
    }

    pub async fn fetch(&self, query: &TermQuery) -> StoreResult<PageInfo> {
        let page = self.fetch_page(query).await?;
        let info = page.info;
        self.replace(page.terms, Some(info));
        Ok(info)
    }

    /// Round-trip only; the created term is not inserted.
    pub async fn persist(&self, term: &NewTerm) -> StoreResult<Term> {
        let mut created = self.backend.create_term(&self.rest_base, term).await?;
        created.require_force_delete = true;
        Ok(created)
    }

    pub async fn create(&self, term: &NewTerm) -> StoreResult<Term> {
        let created = self.persist(term).await?;
        self.insert(created.clone());
        Ok(created)
    }

    /// Deletes `term` remotely, forcing when the term was marked for it.
    pub async fn destroy(&self, term: &Term) -> StoreResult<()> {
        self.backend
            .destroy_term(&self.rest_base, term.id, term.require_force_delete)
            .await?;
        self.remove(term.id);
        Ok(())
    }

    pub fn replace(&self, terms: Vec<Term>, page: Option<PageInfo>) {
        write_guard(&self.collection, self.label).replace(terms);
        *write_guard(&self.last_page, self.label) = page;
    }

    pub fn insert(&self, term: Term) -> bool {
        write_guard(&self.collection, self.label).insert(term)
    }

    pub fn remove(&self, id: TermId) -> Option<Term> {
        write_guard(&self.collection, self.label).remove(id)
    }

    pub fn clear(&self) -> Vec<Term> {
        write_guard(&self.collection, self.label).clear()
    }

    pub fn get(&self, id: TermId) -> Option<Term> {
        read_guard(&self.collection, self.label).get(id).cloned()
    }

    pub fn contains(&self, id: TermId) -> bool {
        read_guard(&self.collection, self.label).contains(id)
    }

    pub fn find<F>(&self, predicate: F) -> Option<Term>
    where
        F: Fn(&Term) -> bool,
    {
        read_guard(&self.collection, self.label)
            .iter()
            .find(|term| predicate(term))
            .cloned()
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<Term>
    where
        F: Fn(&Term) -> bool,
    {
        read_guard(&self.collection, self.label)
            .iter()
            .filter(|term| predicate(term))
            .cloned()
            .collect()
    }

    /// Applies `f` to the term with `id`; returns whether it was present.
    pub fn update<F>(&self, id: TermId, f: F) -> bool
    where
        F: FnOnce(&mut Term),
    {
        match write_guard(&self.collection, self.label).get_mut(id) {
            Some(term) => {
                f(term);
                true
            }
            None => false,
        }
    }

    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&mut Term),
    {
        let mut guard = write_guard(&self.collection, self.label);
        for term in guard.iter_mut() {
            f(term);
        }
    }

    pub fn snapshot(&self) -> Vec<Term> {
        read_guard(&self.collection, self.label).to_vec()
    }

    pub fn ids(&self) -> Vec<TermId> {
        read_guard(&self.collection, self.label).ids()
    }

    pub fn len(&self) -> usize {
        read_guard(&self.collection, self.label).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
