// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Per-taxonomy selection state.
//!
//! A [`TaxonomyController`] owns three term stores for one taxonomy and one
//! content item: every term, the popular subset and the current selection.
//! Checklist and tag taxonomies share this controller and differ only in
//! their [`Capabilities`].
//!
//! Every state change bumps a version and is broadcast as a
//! [`ControllerEvent`]. `Ready` is sent by [`TaxonomyController::load_terms`]
//! only after the full term set is in place and popularity was derived from it.

use crate::store::{SortKey, StoreError, StoreResult, TermBackend, TermQuery, TermStore};
use crate::term::{
    Capabilities, NewTerm, NewTermInput, PanelContext, SelectionOrdering, TaxonomyDescriptor,
    Term, TermId,
};
use crate::util::{read_guard, write_guard};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Added(TermId),
    Removed(TermId),
    /// The whole selection was replaced or cleared.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TermsChanged,
    PopularChanged,
    SelectionChanged {
        change: SelectionChange,
        context: Option<PanelContext>,
    },
    TermCreated(TermId),
    TermDeleted(TermId),
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEvent {
    pub version: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Uninitialized,
    Loading,
    Ready,
    Mutating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTermOutcome {
    /// Blank name.
    Ignored,
    /// A term with that exact name already existed and is now selected.
    Selected(TermId),
    Created(Term),
    /// A creation for the same name is still waiting on the server.
    InFlight,
    /// The server created the term after this controller was retired.
    Abandoned(Term),
}

enum Persisted {
    InFlight,
    Retired(Term),
    Stored(Term),
}

#[derive(Default)]
struct PhaseState {
    terms_loaded: bool,
    selected_loaded: bool,
    loads_in_flight: usize,
    mutations_in_flight: usize,
    pending_names: BTreeSet<String>,
    last_error: Option<StoreError>,
}

struct ControllerInner {
    taxonomy: TaxonomyDescriptor,
    item_id: u64,
    capabilities: Capabilities,
    generation: u64,
    terms: TermStore,
    popular: TermStore,
    selected: TermStore,
    phase: RwLock<PhaseState>,
    version: AtomicU64,
    retired: AtomicBool,
    events: broadcast::Sender<ControllerEvent>,
}

#[derive(Clone)]
pub struct TaxonomyController {
    inner: Arc<ControllerInner>,
}

impl TaxonomyController {
    pub fn new(taxonomy: TaxonomyDescriptor, item_id: u64, backend: Arc<dyn TermBackend>) -> Self {
        let capabilities = Capabilities::for_taxonomy(&taxonomy);
        Self::with_capabilities(taxonomy, item_id, backend, capabilities, 0)
    }

    pub fn with_capabilities(
        taxonomy: TaxonomyDescriptor,
        item_id: u64,
        backend: Arc<dyn TermBackend>,
        capabilities: Capabilities,
        generation: u64,
    ) -> Self {
        let selected_sort = match capabilities.selected_ordering {
            SelectionOrdering::Alphabetic => SortKey::Name,
            SelectionOrdering::Insertion => SortKey::Insertion,
        };
        let rest_base = taxonomy.rest_base.clone();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                terms: TermStore::new(backend.clone(), rest_base.clone(), "terms", SortKey::Name),
                popular: TermStore::new(
                    backend.clone(),
                    rest_base.clone(),
                    "popular",
                    SortKey::CountDesc,
                ),
                selected: TermStore::new(backend, rest_base, "selected", selected_sort),
                taxonomy,
                item_id,
                capabilities,
                generation,
                phase: RwLock::new(PhaseState::default()),
                version: AtomicU64::new(0),
                retired: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn taxonomy(&self) -> &TaxonomyDescriptor {
        &self.inner.taxonomy
    }

    pub fn slug(&self) -> &str {
        &self.inner.taxonomy.slug
    }

    pub fn item_id(&self) -> u64 {
        self.inner.item_id
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    /// Detaches this controller from its session. Results of requests still
    /// in flight are dropped when they arrive.
    pub fn retire(&self) {
        if !self.inner.retired.swap(true, Ordering::SeqCst) {
            debug!(
                "retired {} controller generation {}",
                self.slug(),
                self.inner.generation
            );
        }
    }

    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> ControllerPhase {
        let state = read_guard(&self.inner.phase, "controller phase");
        if state.loads_in_flight > 0 {
            ControllerPhase::Loading
        } else if state.mutations_in_flight > 0 {
            ControllerPhase::Mutating
        } else if state.terms_loaded {
            ControllerPhase::Ready
        } else {
            ControllerPhase::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        read_guard(&self.inner.phase, "controller phase").terms_loaded
    }

    pub fn selection_loaded(&self) -> bool {
        read_guard(&self.inner.phase, "controller phase").selected_loaded
    }

    pub fn last_error(&self) -> Option<StoreError> {
        read_guard(&self.inner.phase, "controller phase")
            .last_error
            .clone()
    }

    pub fn has_pending_creations(&self) -> bool {
        !read_guard(&self.inner.phase, "controller phase")
            .pending_names
            .is_empty()
    }

    pub fn terms(&self) -> Vec<Term> {
        self.inner.terms.snapshot()
    }

    pub fn popular(&self) -> Vec<Term> {
        self.inner.popular.snapshot()
    }

    pub fn selected(&self) -> Vec<Term> {
        self.inner.selected.snapshot()
    }

    /// Selected ids in selection order, as written back to the content item.
    pub fn selected_ids(&self) -> Vec<TermId> {
        self.inner.selected.ids()
    }

    pub fn get(&self, id: TermId) -> Option<Term> {
        self.inner.terms.get(id)
    }

    pub fn is_selected(&self, id: TermId) -> bool {
        self.inner.selected.contains(id)
    }

    /// Exact name match first, then slug.
    pub fn find(&self, name_or_slug: &str) -> Option<Term> {
        self.inner
            .terms
            .find(|term| term.name == name_or_slug)
            .or_else(|| self.inner.terms.find(|term| term.slug == name_or_slug))
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<Term>
    where
        F: Fn(&Term) -> bool,
    {
        self.inner.terms.filter(predicate)
    }

    /// Loads every term of the taxonomy, then derives the popular subset and
    /// sends `Ready`. Calling it again re-fetches and replaces the set.
    pub async fn load_terms(&self) -> StoreResult<()> {
        debug!("loading {} terms", self.slug());
        self.begin_load();
        let result = self
            .inner
            .terms
            .fetch_page(&TermQuery::all().hide_empty(false))
            .await;
        self.end_load();

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!("failed to load {} terms: {}", self.slug(), err);
                self.record_error(&err);
                return Err(err);
            }
        };
        if self.is_retired() {
            debug!(
                "ignoring {} terms loaded for retired {} controller",
                page.terms.len(),
                self.slug()
            );
            return Ok(());
        }

        let selected_ids: HashSet<TermId> = self.inner.selected.ids().into_iter().collect();
        let mut terms = page.terms;
        for term in terms.iter_mut() {
            term.selected = selected_ids.contains(&term.id);
            term.popular = false;
        }
        let count = terms.len();
        self.inner.terms.replace(terms, Some(page.info));
        self.refresh_selected_content();
        self.derive_popular();
        {
            let mut state = write_guard(&self.inner.phase, "controller phase");
            state.terms_loaded = true;
            state.last_error = None;
        }

        info!("{} ready with {} terms", self.slug(), count);
        self.emit(EventKind::TermsChanged);
        self.emit(EventKind::PopularChanged);
        self.emit(EventKind::Ready);
        Ok(())
    }

    /// Loads the terms assigned to the content item. An unsaved item
    /// (`item_id == 0`) has no assignments and is not fetched.
    pub async fn load_selected(&self) -> StoreResult<()> {
        if self.inner.item_id == 0 {
            self.inner.selected.replace(Vec::new(), None);
            self.apply_selection_flags();
            write_guard(&self.inner.phase, "controller phase").selected_loaded = true;
            self.emit(EventKind::SelectionChanged {
                change: SelectionChange::Reset,
                context: None,
            });
            return Ok(());
        }

        debug!(
            "loading {} terms assigned to item {}",
            self.slug(),
            self.inner.item_id
        );
        self.begin_load();
        let result = self
            .inner
            .selected
            .fetch_page(&TermQuery::all().for_post(self.inner.item_id))
            .await;
        self.end_load();

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    "failed to load {} selection for item {}: {}",
                    self.slug(),
                    self.inner.item_id,
                    err
                );
                self.record_error(&err);
                return Err(err);
            }
        };
        if self.is_retired() {
            debug!("ignoring selection loaded for retired {} controller", self.slug());
            return Ok(());
        }

        let mut selected = page.terms;
        for term in selected.iter_mut() {
            if let Some(known) = self.inner.terms.get(term.id) {
                term.merge_content(&known);
            }
            term.selected = true;
            term.popular = self.inner.popular.contains(term.id);
        }
        self.inner.selected.replace(selected, Some(page.info));
        self.apply_selection_flags();
        write_guard(&self.inner.phase, "controller phase").selected_loaded = true;

        self.emit(EventKind::SelectionChanged {
            change: SelectionChange::Reset,
            context: None,
        });
        Ok(())
    }

    /// Runs both loads concurrently; they may resolve in either order.
    pub async fn load(&self) -> StoreResult<()> {
        let (terms, selected) = tokio::join!(self.load_terms(), self.load_selected());
        terms.and(selected)
    }

    /// Selects a known term. Returns false when `id` is not among the loaded
    /// terms or is already selected.
    pub fn set_selected(&self, id: TermId, context: Option<PanelContext>) -> bool {
        let Some(mut term) = self.inner.terms.get(id) else {
            debug!("{}: cannot select unknown term {}", self.slug(), id);
            return false;
        };
        if self.inner.selected.contains(id) {
            return false;
        }
        term.selected = true;
        self.inner.terms.update(id, |term| term.selected = true);
        self.inner.popular.update(id, |term| term.selected = true);
        self.inner.selected.insert(term);
        self.emit(EventKind::SelectionChanged {
            change: SelectionChange::Added(id),
            context,
        });
        true
    }

    pub fn remove_selected(&self, id: TermId, context: Option<PanelContext>) -> bool {
        if self.inner.selected.remove(id).is_none() {
            return false;
        }
        self.inner.terms.update(id, |term| term.selected = false);
        self.inner.popular.update(id, |term| term.selected = false);
        self.emit(EventKind::SelectionChanged {
            change: SelectionChange::Removed(id),
            context,
        });
        true
    }

    /// Clears the selection, returning how many terms were deselected.
    pub fn clear_selection(&self) -> usize {
        let removed = self.inner.selected.clear();
        if removed.is_empty() {
            return 0;
        }
        self.apply_selection_flags();
        self.emit(EventKind::SelectionChanged {
            change: SelectionChange::Reset,
            context: None,
        });
        removed.len()
    }

    /// Selects the term named `input.name`, creating it first when no term
    /// has exactly that name. A created term shows up in `terms` and the
    /// selection only once the server has assigned its id.
    pub async fn add_term(&self, input: NewTermInput) -> StoreResult<AddTermOutcome> {
        let name = input.name.trim();
        if name.is_empty() {
            return Ok(AddTermOutcome::Ignored);
        }
        if let Some(existing) = self.inner.terms.find(|term| term.name == name) {
            self.set_selected(existing.id, None);
            return Ok(AddTermOutcome::Selected(existing.id));
        }

        match self.persist_new(name, input.parent).await? {
            Persisted::InFlight => Ok(AddTermOutcome::InFlight),
            Persisted::Retired(term) => Ok(AddTermOutcome::Abandoned(term)),
            Persisted::Stored(term) => {
                self.set_selected(term.id, None);
                Ok(AddTermOutcome::Created(self.inner.terms.get(term.id).unwrap_or(term)))
            }
        }
    }

    /// Creates a term and adds it to `terms` without selecting it. Returns
    /// `None` for a blank name, a duplicate in-flight name or a retired
    /// controller.
    pub async fn create_term(&self, input: NewTermInput) -> StoreResult<Option<Term>> {
        let name = input.name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        match self.persist_new(name, input.parent).await? {
            Persisted::Stored(term) => Ok(Some(term)),
            Persisted::InFlight | Persisted::Retired(_) => Ok(None),
        }
    }

    /// Adds a term known from elsewhere to `terms` without any request.
    pub fn insert_term(&self, mut term: Term) -> bool {
        term.selected = self.inner.selected.contains(term.id);
        let inserted = self.inner.terms.insert(term);
        self.emit(EventKind::TermsChanged);
        inserted
    }

    /// Drops a term from every collection without any request.
    pub fn forget_term(&self, id: TermId) -> bool {
        let removed = self.inner.terms.remove(id).is_some();
        let was_popular = self.inner.popular.remove(id).is_some();
        let was_selected = self.inner.selected.remove(id).is_some();
        if !removed && !was_popular && !was_selected {
            return false;
        }
        self.emit(EventKind::TermsChanged);
        if was_popular {
            self.emit(EventKind::PopularChanged);
        }
        if was_selected {
            self.emit(EventKind::SelectionChanged {
                change: SelectionChange::Removed(id),
                context: None,
            });
        }
        true
    }

    /// Deletes a term on the server. Deletes started here are always forced,
    /// so terms still assigned elsewhere are removed too.
    pub async fn delete_term(&self, id: TermId) -> StoreResult<bool> {
        let Some(mut term) = self
            .inner
            .terms
            .get(id)
            .or_else(|| self.inner.selected.get(id))
        else {
            return Ok(false);
        };
        term.require_force_delete = true;

        self.begin_mutation();
        let result = self.inner.terms.destroy(&term).await;
        self.end_mutation();
        if let Err(err) = result {
            warn!("failed to delete {} term {}: {}", self.slug(), id, err);
            self.record_error(&err);
            return Err(err);
        }
        if self.is_retired() {
            debug!("term {} deleted after {} controller retired", id, self.slug());
            return Ok(true);
        }

        info!("deleted {} term {} ({})", self.slug(), id, term.name);
        self.forget_term(id);
        self.emit(EventKind::TermDeleted(id));
        Ok(true)
    }

    async fn persist_new(&self, name: &str, parent: Option<i64>) -> StoreResult<Persisted> {
        if !self.claim_name(name) {
            debug!("{}: creation of {:?} already in flight", self.slug(), name);
            return Ok(Persisted::InFlight);
        }
        let parent = if self.inner.capabilities.supports_parent {
            parent
                .and_then(|parent| TermId::try_from(parent).ok())
                .filter(|parent| *parent > 0)
        } else {
            None
        };
        let request = NewTerm {
            name: name.to_string(),
            parent,
        };

        self.begin_mutation();
        let result = self.inner.terms.persist(&request).await;
        self.end_mutation();
        self.release_name(name);

        let created = match result {
            Ok(created) => created,
            Err(err) => {
                warn!("failed to create {} term {:?}: {}", self.slug(), name, err);
                self.record_error(&err);
                return Err(err);
            }
        };
        if self.is_retired() {
            debug!(
                "term {} created after {} controller retired",
                created.id,
                self.slug()
            );
            return Ok(Persisted::Retired(created));
        }

        info!("created {} term {} ({})", self.slug(), created.id, created.name);
        self.inner.terms.insert(created.clone());
        self.emit(EventKind::TermCreated(created.id));
        Ok(Persisted::Stored(created))
    }

    /// Ranks `terms` by count and keeps the top entries. The sort is stable,
    /// so equal counts stay in the terms list's name order.
    fn derive_popular(&self) {
        let mut ranked = self.inner.terms.snapshot();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(self.inner.capabilities.popular_limit);
        let popular_ids: HashSet<TermId> = ranked.iter().map(|term| term.id).collect();
        for term in ranked.iter_mut() {
            term.popular = true;
        }
        self.inner
            .terms
            .update_all(|term| term.popular = popular_ids.contains(&term.id));
        self.inner.selected
            .update_all(|term| term.popular = popular_ids.contains(&term.id));
        self.inner.popular.replace(ranked, None);
    }

    fn refresh_selected_content(&self) {
        self.inner.selected.update_all(|term| {
            if let Some(known) = self.inner.terms.get(term.id) {
                term.merge_content(&known);
            }
        });
    }

    fn apply_selection_flags(&self) {
        let ids: HashSet<TermId> = self.inner.selected.ids().into_iter().collect();
        self.inner
            .terms
            .update_all(|term| term.selected = ids.contains(&term.id));
        self.inner
            .popular
            .update_all(|term| term.selected = ids.contains(&term.id));
    }

    fn claim_name(&self, name: &str) -> bool {
        write_guard(&self.inner.phase, "controller phase")
            .pending_names
            .insert(name.to_string())
    }

    fn release_name(&self, name: &str) {
        write_guard(&self.inner.phase, "controller phase")
            .pending_names
            .remove(name);
    }

    fn begin_load(&self) {
        write_guard(&self.inner.phase, "controller phase").loads_in_flight += 1;
    }

    fn end_load(&self) {
        let mut state = write_guard(&self.inner.phase, "controller phase");
        state.loads_in_flight = state.loads_in_flight.saturating_sub(1);
    }

    fn begin_mutation(&self) {
        write_guard(&self.inner.phase, "controller phase").mutations_in_flight += 1;
    }

    fn end_mutation(&self) {
        let mut state = write_guard(&self.inner.phase, "controller phase");
        state.mutations_in_flight = state.mutations_in_flight.saturating_sub(1);
    }

    fn record_error(&self, err: &StoreError) {
        write_guard(&self.inner.phase, "controller phase").last_error = Some(err.clone());
    }

    fn emit(&self, kind: EventKind) -> u64 {
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine.
        let _ = self.inner.events.send(ControllerEvent { version, kind });
        version
    }
}
