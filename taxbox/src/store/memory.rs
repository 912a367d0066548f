// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! In-process term server.
//!
//! Answers the same collection contract the REST endpoints honour, so
//! sessions and the HTTP test server can run without a real site behind
//! them. Requests can be held at a gate or failed on demand to exercise
//! races and error paths.

use super::{
    PageInfo, StoreError, StoreErrorKind, StoreResult, TaxonomyDirectory, TermBackend, TermPage,
    TermQuery,
};
use crate::term::{NewTerm, TaxonomyDescriptor, Term, TermId, slugify};
use crate::util::{read_guard, write_guard};
use async_trait::async_trait;
use log::debug;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::RwLock;
use tokio::sync::watch;

pub const DEFAULT_PER_PAGE: u32 = 10;

#[derive(Default)]
struct MemoryState {
    taxonomies: Vec<TaxonomyDescriptor>,
    terms: BTreeMap<String, Vec<Term>>,
    assignments: BTreeMap<(String, u64), Vec<TermId>>,
    next_id: TermId,
}

impl MemoryState {
    fn taxonomy(&self, rest_base: &str) -> Option<&TaxonomyDescriptor> {
        self.taxonomies
            .iter()
            .find(|taxonomy| taxonomy.rest_base == rest_base)
    }

    fn knows(&self, rest_base: &str) -> bool {
        self.taxonomy(rest_base).is_some() || self.terms.contains_key(rest_base)
    }

    fn unique_slug(&self, rest_base: &str, base: &str) -> String {
        let taken: HashSet<&str> = self
            .terms
            .get(rest_base)
            .map(|terms| terms.iter().map(|term| term.slug.as_str()).collect())
            .unwrap_or_default();
        if !taken.contains(base) {
            return base.to_string();
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{}-{}", base, suffix);
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    gate: watch::Sender<bool>,
    failures: RwLock<VecDeque<StoreError>>,
    requests: RwLock<Vec<String>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: RwLock::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
            gate,
            failures: RwLock::new(VecDeque::new()),
            requests: RwLock::new(Vec::new()),
        }
    }

    pub fn add_taxonomy(&self, taxonomy: TaxonomyDescriptor) {
        let mut state = write_guard(&self.state, "memory backend");
        state.terms.entry(taxonomy.rest_base.clone()).or_default();
        state
            .taxonomies
            .retain(|existing| existing.slug != taxonomy.slug);
        state.taxonomies.push(taxonomy);
    }

    /// Inserts `term` as-is, keeping its id. Later creations get higher ids.
    pub fn seed_term(&self, rest_base: &str, term: Term) {
        let mut state = write_guard(&self.state, "memory backend");
        state.next_id = state.next_id.max(term.id + 1);
        let terms = state.terms.entry(rest_base.to_string()).or_default();
        terms.retain(|existing| existing.id != term.id);
        terms.push(term);
    }

    pub fn seed_terms<I>(&self, rest_base: &str, terms: I)
    where
        I: IntoIterator<Item = Term>,
    {
        for term in terms {
            self.seed_term(rest_base, term);
        }
    }

    /// Replaces the terms assigned to `post`, moving usage counts along.
    pub fn assign(&self, rest_base: &str, post: u64, ids: &[TermId]) {
        let mut state = write_guard(&self.state, "memory backend");
        let key = (rest_base.to_string(), post);
        let previous = state.assignments.remove(&key).unwrap_or_default();
        let mut next: Vec<TermId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !next.contains(id) {
                next.push(*id);
            }
        }
        if let Some(terms) = state.terms.get_mut(rest_base) {
            for term in terms.iter_mut() {
                let was = previous.contains(&term.id);
                let is = next.contains(&term.id);
                if was && !is {
                    term.count = term.count.saturating_sub(1);
                } else if is && !was {
                    term.count += 1;
                }
            }
        }
        if !next.is_empty() {
            state.assignments.insert(key, next);
        }
    }

    pub fn assigned(&self, rest_base: &str, post: u64) -> Vec<TermId> {
        read_guard(&self.state, "memory backend")
            .assignments
            .get(&(rest_base.to_string(), post))
            .cloned()
            .unwrap_or_default()
    }

    pub fn terms(&self, rest_base: &str) -> Vec<Term> {
        read_guard(&self.state, "memory backend")
            .terms
            .get(rest_base)
            .cloned()
            .unwrap_or_default()
    }

    pub fn taxonomy(&self, rest_base: &str) -> Option<TaxonomyDescriptor> {
        read_guard(&self.state, "memory backend")
            .taxonomy(rest_base)
            .cloned()
    }

    /// Parks every request arriving from now on until `release`.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Queues an error returned by the next request instead of its result.
    pub fn fail_next(&self, error: StoreError) {
        write_guard(&self.failures, "memory failures").push_back(error);
    }

    /// Request log lines such as `GET tags` or `DELETE tags/4?force=true`.
    pub fn requests(&self) -> Vec<String> {
        read_guard(&self.requests, "memory requests").clone()
    }

    pub fn request_count(&self) -> usize {
        read_guard(&self.requests, "memory requests").len()
    }

    async fn enter(&self, request: String) -> StoreResult<()> {
        debug!("memory backend request: {}", request);
        write_guard(&self.requests, "memory requests").push(request);
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        let failure = write_guard(&self.failures, "memory failures").pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn query_terms(&self, rest_base: &str, query: &TermQuery) -> StoreResult<TermPage> {
        let state = read_guard(&self.state, "memory backend");
        if !state.knows(rest_base) {
            return Err(no_route());
        }
        let assigned: Option<Vec<TermId>> = query.post.map(|post| {
            state
                .assignments
                .get(&(rest_base.to_string(), post))
                .cloned()
                .unwrap_or_default()
        });
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<Term> = state
            .terms
            .get(rest_base)
            .map(|terms| terms.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|term| assigned.as_ref().is_none_or(|ids| ids.contains(&term.id)))
            .filter(|term| query.hide_empty != Some(true) || term.count > 0)
            .filter(|term| query.parent.is_none_or(|parent| term.parent == parent))
            .filter(|term| {
                needle
                    .as_ref()
                    .is_none_or(|needle| term.name.to_lowercase().contains(needle))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });

        let total = matched.len() as u64;
        let number = u64::from(query.number.unwrap_or(DEFAULT_PER_PAGE));
        if number == 0 {
            return Ok(TermPage {
                terms: matched,
                info: PageInfo::single(total),
            });
        }

        let total_pages = total.div_ceil(number).max(1);
        let (offset, page) = match query.offset {
            Some(offset) => {
                let offset = u64::from(offset);
                (offset, offset / number + 1)
            }
            None => {
                let page = u64::from(query.page.unwrap_or(1).max(1));
                if page > total_pages && total > 0 {
                    return Err(StoreError::validation(
                        "The page number requested is larger than the number of pages available.",
                    )
                    .with_status(400));
                }
                ((page - 1) * number, page)
            }
        };
        let terms = matched
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(number).unwrap_or(usize::MAX))
            .collect();

        Ok(TermPage {
            terms,
            info: PageInfo {
                total,
                total_pages,
                page,
            },
        })
    }

    fn insert_term(&self, rest_base: &str, term: &NewTerm) -> StoreResult<Term> {
        let mut state = write_guard(&self.state, "memory backend");
        let taxonomy = state.taxonomy(rest_base).cloned().ok_or_else(no_route)?;

        let name = term.name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("Missing parameter(s): name").with_status(400));
        }
        let parent = match term.parent {
            Some(parent) if parent != 0 => {
                if !taxonomy.hierarchical {
                    return Err(StoreError::validation(
                        "Cannot set parent term, taxonomy is not hierarchical.",
                    )
                    .with_status(400));
                }
                let exists = state
                    .terms
                    .get(rest_base)
                    .is_some_and(|terms| terms.iter().any(|existing| existing.id == parent));
                if !exists {
                    return Err(
                        StoreError::validation("Parent term does not exist.").with_status(400)
                    );
                }
                parent
            }
            _ => 0,
        };

        let id = state.next_id;
        state.next_id += 1;
        let base = match slugify(name) {
            slug if slug.is_empty() => format!("term-{}", id),
            slug => slug,
        };
        let slug = state.unique_slug(rest_base, &base);
        let created = Term {
            slug,
            parent,
            taxonomy: taxonomy.slug.clone(),
            ..Term::new(id, name)
        };
        state
            .terms
            .entry(rest_base.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    fn delete_term(&self, rest_base: &str, id: TermId, force: bool) -> StoreResult<()> {
        let mut state = write_guard(&self.state, "memory backend");
        if !state.knows(rest_base) {
            return Err(no_route());
        }
        let term = state
            .terms
            .get(rest_base)
            .and_then(|terms| terms.iter().find(|term| term.id == id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("Term does not exist.").with_status(404))?;

        let assigned = state
            .assignments
            .iter()
            .any(|((base, _), ids)| base == rest_base && ids.contains(&id));
        if !force && (term.count > 0 || assigned) {
            return Err(StoreError::conflict(
                "Term is still in use. Set 'force' to true to delete.",
            )
            .with_status(409));
        }

        if let Some(terms) = state.terms.get_mut(rest_base) {
            terms.retain(|existing| existing.id != id);
            for child in terms.iter_mut().filter(|child| child.parent == id) {
                child.parent = term.parent;
            }
        }
        for ((base, _), ids) in state.assignments.iter_mut() {
            if base == rest_base {
                ids.retain(|existing| *existing != id);
            }
        }
        Ok(())
    }
}

fn no_route() -> StoreError {
    StoreError::new(
        StoreErrorKind::NotFound,
        "No route was found matching the URL and request method.",
    )
    .with_status(404)
}

#[async_trait]
impl TermBackend for MemoryBackend {
    async fn fetch_terms(&self, rest_base: &str, query: &TermQuery) -> StoreResult<TermPage> {
        self.enter(format!("GET {}", rest_base)).await?;
        self.query_terms(rest_base, query)
    }

    async fn create_term(&self, rest_base: &str, term: &NewTerm) -> StoreResult<Term> {
        self.enter(format!("POST {}", rest_base)).await?;
        self.insert_term(rest_base, term)
    }

    async fn destroy_term(&self, rest_base: &str, id: TermId, force: bool) -> StoreResult<()> {
        self.enter(format!("DELETE {}/{}?force={}", rest_base, id, force))
            .await?;
        self.delete_term(rest_base, id, force)
    }
}

#[async_trait]
impl TaxonomyDirectory for MemoryBackend {
    async fn fetch_taxonomies(&self, post_type: &str) -> StoreResult<Vec<TaxonomyDescriptor>> {
        self.enter(format!("GET taxonomies?type={}", post_type))
            .await?;
        Ok(read_guard(&self.state, "memory backend")
            .taxonomies
            .iter()
            .filter(|taxonomy| taxonomy.applies_to(post_type))
            .cloned()
            .collect())
    }
}
