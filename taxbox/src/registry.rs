// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! The editing session: one controller and view per taxonomy of the item
//! being edited.
//!
//! A session is built at startup, owns every box it creates and retires
//! them again on `reset`, `shutdown` or drop, so requests that were still in
//! flight cannot write into a box that is no longer registered.

use crate::controller::TaxonomyController;
use crate::item::{ContentItem, ContentItemRef};
use crate::store::{StoreError, StoreResult, TaxonomyDirectory, TermBackend};
use crate::term::{
    Capabilities, FLAT_POPULAR_LIMIT, HIERARCHICAL_POPULAR_LIMIT, NewTermInput,
    TaxonomyDescriptor, Term, TermId,
};
use crate::view::{EventPump, TaxonomyView, ViewSettings};
use futures_util::future::join_all;
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum SessionError {
    Discovery(StoreError),
    UnknownTaxonomy(String),
    Save {
        taxonomy: String,
        source: StoreError,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Discovery(err) => write!(f, "Taxonomy discovery failed: {}", err),
            SessionError::UnknownTaxonomy(slug) => write!(f, "Unknown taxonomy: {}", slug),
            SessionError::Save { taxonomy, source } => {
                write!(f, "Saving {} terms failed: {}", taxonomy, source)
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::Discovery(err) | SessionError::Save { source: err, .. } => Some(err),
            SessionError::UnknownTaxonomy(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub view: ViewSettings,
    pub hierarchical_popular_limit: usize,
    pub flat_popular_limit: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            view: ViewSettings::default(),
            hierarchical_popular_limit: HIERARCHICAL_POPULAR_LIMIT,
            flat_popular_limit: FLAT_POPULAR_LIMIT,
        }
    }
}

impl SessionSettings {
    pub fn capabilities_for(&self, taxonomy: &TaxonomyDescriptor) -> Capabilities {
        let limit = if taxonomy.hierarchical {
            self.hierarchical_popular_limit
        } else {
            self.flat_popular_limit
        };
        Capabilities::for_taxonomy(taxonomy).with_popular_limit(limit)
    }
}

/// A controller and its view, plus the query helpers scripts and the shell
/// use to inspect or drive the selection.
pub struct TaxonomyBox {
    descriptor: TaxonomyDescriptor,
    controller: TaxonomyController,
    view: TaxonomyView,
    pump: EventPump,
}

impl TaxonomyBox {
    fn build(
        descriptor: TaxonomyDescriptor,
        item_id: u64,
        backend: Arc<dyn TermBackend>,
        settings: &SessionSettings,
        generation: u64,
    ) -> Self {
        let capabilities = settings.capabilities_for(&descriptor);
        let controller = TaxonomyController::with_capabilities(
            descriptor.clone(),
            item_id,
            backend,
            capabilities,
            generation,
        );
        let pump = EventPump::new(&controller);
        let view = TaxonomyView::for_controller(controller.clone(), &settings.view);
        Self {
            descriptor,
            controller,
            view,
            pump,
        }
    }

    pub fn descriptor(&self) -> &TaxonomyDescriptor {
        &self.descriptor
    }

    pub fn slug(&self) -> &str {
        &self.descriptor.slug
    }

    pub fn controller(&self) -> &TaxonomyController {
        &self.controller
    }

    pub fn view(&self) -> &TaxonomyView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut TaxonomyView {
        &mut self.view
    }

    /// Brings the view up to date with its controller.
    pub fn sync(&mut self) -> usize {
        self.view.sync(&mut self.pump)
    }

    pub fn get(&self, id: TermId) -> Option<Term> {
        self.controller.get(id)
    }

    pub fn has(&self, id: TermId) -> bool {
        self.controller.get(id).is_some()
    }

    pub fn find(&self, name_or_slug: &str) -> Option<Term> {
        self.controller.find(name_or_slug)
    }

    pub fn add(&self, term: Term) -> bool {
        self.controller.insert_term(term)
    }

    pub fn remove(&self, id: TermId) -> bool {
        self.controller.forget_term(id)
    }

    pub async fn create(&self, input: NewTermInput) -> StoreResult<Option<Term>> {
        self.controller.create_term(input).await
    }

    pub async fn delete(&self, id: TermId) -> StoreResult<bool> {
        self.controller.delete_term(id).await
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<Term>
    where
        F: Fn(&Term) -> bool,
    {
        self.controller.filter(predicate)
    }

    pub fn get_all(&self) -> Vec<Term> {
        self.controller.terms()
    }

    pub fn get_popular(&self) -> Vec<Term> {
        self.controller.popular()
    }

    pub fn get_selection(&self) -> Vec<Term> {
        self.controller.selected()
    }

    /// Returns how many of `ids` became selected.
    pub fn add_to_selection(&self, ids: &[TermId]) -> usize {
        ids.iter()
            .filter(|id| self.controller.set_selected(**id, None))
            .count()
    }

    pub fn remove_from_selection(&self, ids: &[TermId]) -> usize {
        ids.iter()
            .filter(|id| self.controller.remove_selected(**id, None))
            .count()
    }

    pub fn empty(&self) -> usize {
        self.controller.clear_selection()
    }

    /// Hands the selected ids, in selection order, to the content item.
    pub async fn save(&self, item: &mut dyn ContentItem) -> StoreResult<()> {
        item.assign_terms(&self.descriptor, self.controller.selected_ids())
            .await
    }
}

pub struct EditingSession {
    directory: Arc<dyn TaxonomyDirectory>,
    backend: Arc<dyn TermBackend>,
    item: ContentItemRef,
    settings: SessionSettings,
    boxes: BTreeMap<String, TaxonomyBox>,
    next_generation: u64,
}

impl EditingSession {
    pub fn new(
        directory: Arc<dyn TaxonomyDirectory>,
        backend: Arc<dyn TermBackend>,
        item: ContentItemRef,
        settings: SessionSettings,
    ) -> Self {
        Self {
            directory,
            backend,
            item,
            settings,
            boxes: BTreeMap::new(),
            next_generation: 1,
        }
    }

    pub fn item(&self) -> &ContentItemRef {
        &self.item
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Discovers the taxonomies of the item's type, builds a box for each
    /// and loads them all. Boxes from an earlier run are retired once
    /// discovery succeeds. Only discovery failures are fatal; a box whose
    /// load fails stays registered with empty collections.
    pub async fn run(&mut self) -> Result<usize, SessionError> {
        let taxonomies = self
            .directory
            .fetch_taxonomies(&self.item.post_type)
            .await
            .map_err(SessionError::Discovery)?;
        info!(
            "discovered {} taxonomies for {} {}",
            taxonomies.len(),
            self.item.post_type,
            self.item.id
        );

        for previous in std::mem::take(&mut self.boxes).into_values() {
            previous.controller.retire();
        }
        for descriptor in taxonomies {
            let slug = descriptor.slug.clone();
            let taxonomy_box = self.build_box(descriptor);
            self.boxes.insert(slug, taxonomy_box);
        }

        let controllers: Vec<TaxonomyController> = self
            .boxes
            .values()
            .map(|taxonomy_box| taxonomy_box.controller.clone())
            .collect();
        let results = join_all(controllers.iter().map(|controller| controller.load())).await;
        for (controller, result) in controllers.iter().zip(results) {
            if let Err(err) = result {
                warn!("{} box loaded with errors: {}", controller.slug(), err);
            }
        }
        self.pump();
        Ok(self.boxes.len())
    }

    pub fn slugs(&self) -> Vec<String> {
        self.boxes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn get(&self, slug: &str) -> Option<&TaxonomyBox> {
        self.boxes.get(slug)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut TaxonomyBox> {
        self.boxes.get_mut(slug)
    }

    pub fn controller(&self, slug: &str) -> Option<&TaxonomyController> {
        self.boxes.get(slug).map(TaxonomyBox::controller)
    }

    pub fn boxes(&self) -> impl Iterator<Item = &TaxonomyBox> {
        self.boxes.values()
    }

    /// Throws away the box for `slug`, including unsaved selection changes,
    /// and loads a fresh one from the same descriptor.
    pub async fn reset(&mut self, slug: &str) -> Result<(), SessionError> {
        let previous = self
            .boxes
            .remove(slug)
            .ok_or_else(|| SessionError::UnknownTaxonomy(slug.to_string()))?;
        previous.controller.retire();
        info!("resetting {} box", slug);

        let fresh = self.build_box(previous.descriptor);
        let controller = fresh.controller.clone();
        self.boxes.insert(slug.to_string(), fresh);
        if let Err(err) = controller.load().await {
            warn!("{} box reloaded with errors: {}", slug, err);
        }
        if let Some(taxonomy_box) = self.boxes.get_mut(slug) {
            taxonomy_box.sync();
        }
        Ok(())
    }

    /// Syncs every view with its controller.
    pub fn pump(&mut self) -> usize {
        self.boxes.values_mut().map(TaxonomyBox::sync).sum()
    }

    /// Writes each taxonomy's selection to `item`, stopping at the first
    /// failure.
    pub async fn save(&self, item: &mut dyn ContentItem) -> Result<usize, SessionError> {
        for taxonomy_box in self.boxes.values() {
            taxonomy_box
                .save(item)
                .await
                .map_err(|source| SessionError::Save {
                    taxonomy: taxonomy_box.slug().to_string(),
                    source,
                })?;
        }
        Ok(self.boxes.len())
    }

    pub fn shutdown(&mut self) {
        for taxonomy_box in self.boxes.values() {
            taxonomy_box.controller.retire();
        }
        self.boxes.clear();
    }

    fn build_box(&mut self, descriptor: TaxonomyDescriptor) -> TaxonomyBox {
        let generation = self.next_generation;
        self.next_generation += 1;
        TaxonomyBox::build(
            descriptor,
            self.item.id,
            self.backend.clone(),
            &self.settings,
            generation,
        )
    }
}

impl Drop for EditingSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
