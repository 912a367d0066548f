// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::Labels;
use super::cloud::{CloudScale, FontSize, font_sizes};
use crate::controller::{AddTermOutcome, ControllerEvent, EventKind, TaxonomyController};
use crate::store::StoreResult;
use crate::term::{NewTermInput, TermId};
use futures_util::future::join_all;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub id: TermId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudEntry {
    pub id: TermId,
    pub name: String,
    pub size: FontSize,
    pub title: String,
    pub selected: bool,
}

/// Tag view for flat taxonomies: removable chips for the selection and a
/// cloud of the most used tags.
pub struct TagBox {
    controller: TaxonomyController,
    labels: Labels,
    scale: CloudScale,
    chips: Vec<Chip>,
    cloud: Vec<CloudEntry>,
    cloud_visible: bool,
    entry: String,
    chip_renders: u64,
    cloud_renders: u64,
}

impl TagBox {
    pub fn new(controller: TaxonomyController, labels: Labels, scale: CloudScale) -> Self {
        let mut view = Self {
            controller,
            labels,
            scale,
            chips: Vec::new(),
            cloud: Vec::new(),
            cloud_visible: false,
            entry: String::new(),
            chip_renders: 0,
            cloud_renders: 0,
        };
        view.render_all();
        view
    }

    pub fn controller(&self) -> &TaxonomyController {
        &self.controller
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn chips(&self) -> &[Chip] {
        &self.chips
    }

    pub fn cloud(&self) -> &[CloudEntry] {
        &self.cloud
    }

    pub fn cloud_visible(&self) -> bool {
        self.cloud_visible
    }

    pub fn chip_renders(&self) -> u64 {
        self.chip_renders
    }

    pub fn cloud_renders(&self) -> u64 {
        self.cloud_renders
    }

    /// Shown in place of the cloud when there is nothing to list.
    pub fn empty_cloud_message(&self) -> Option<&str> {
        self.cloud
            .is_empty()
            .then(|| self.labels.get("no_terms"))
    }

    pub fn toggle_cloud(&mut self) {
        self.cloud_visible = !self.cloud_visible;
    }

    /// Current text of the tag entry field.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn set_entry(&mut self, text: impl Into<String>) {
        self.entry = text.into();
    }

    /// Submits the entry field and clears it. Each name comes back paired
    /// with its outcome; a blank entry submits nothing.
    pub async fn submit_entry(&mut self) -> Vec<(String, StoreResult<AddTermOutcome>)> {
        let text = std::mem::take(&mut self.entry);
        let names = split_tags(&text);
        let outcomes = self.add_tags(&text).await;
        names.into_iter().zip(outcomes).collect()
    }

    /// Submits every comma-separated name of `input` at once. Results come
    /// back in input order.
    pub async fn add_tags(&self, input: &str) -> Vec<StoreResult<AddTermOutcome>> {
        let requests = split_tags(input)
            .into_iter()
            .map(|name| self.controller.add_term(NewTermInput::named(name)));
        join_all(requests).await
    }

    pub fn remove_chip(&mut self, id: TermId) -> bool {
        self.controller.remove_selected(id, None)
    }

    pub fn click_cloud_term(&mut self, id: TermId) -> bool {
        self.controller.set_selected(id, None)
    }

    pub fn handle(&mut self, event: &ControllerEvent) {
        match &event.kind {
            EventKind::SelectionChanged { .. } => self.render_all(),
            EventKind::TermDeleted(_) | EventKind::TermsChanged => self.render_all(),
            EventKind::PopularChanged | EventKind::Ready => self.render_cloud(),
            EventKind::TermCreated(_) => {}
        }
    }

    pub fn render_all(&mut self) {
        self.render_chips();
        self.render_cloud();
    }

    fn render_chips(&mut self) {
        self.chips = self
            .controller
            .selected()
            .into_iter()
            .map(|term| Chip {
                id: term.id,
                name: term.name,
            })
            .collect();
        self.chip_renders += 1;
    }

    fn render_cloud(&mut self) {
        let mut popular = self.controller.popular();
        popular.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        let counts: Vec<u64> = popular.iter().map(|term| term.count).collect();
        let sizes = font_sizes(&counts, &self.scale);
        self.cloud = popular
            .into_iter()
            .zip(sizes)
            .map(|(term, size)| CloudEntry {
                title: self.labels.topics(term.count),
                id: term.id,
                name: term.name,
                size,
                selected: term.selected,
            })
            .collect();
        self.cloud_renders += 1;
    }
}

/// Splits free-text tag entry on commas, dropping blank pieces.
pub fn split_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
