// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Presentation models for the two picker layouts.
//!
//! Views hold a rendered model of their controller's state and rebuild the
//! parts an event invalidates. They never touch the term stores directly;
//! gestures go through the controller and come back as events.

pub mod category;
pub mod cloud;
pub mod tag;
pub mod text;

use crate::controller::{ControllerEvent, TaxonomyController};
use crate::term::TaxonomyDescriptor;
use log::{debug, warn};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

pub use category::{AddNewForm, CategoryBox, ChecklistNode, ChecklistPanel, ParentOption};
pub use cloud::{CloudScale, FontSize};
pub use tag::{Chip, CloudEntry, TagBox};

const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("add", "Add"),
    ("add_new_item", "Add New"),
    ("all_items", "All"),
    ("most_used", "Most Used"),
    ("no_terms", "No terms found."),
    ("parent_item", "Parent"),
    ("separate_items_with_commas", "Separate items with commas"),
    ("choose_from_most_used", "Choose from the most used"),
    ("topic", "topic"),
    ("topics", "topics"),
];

/// Display strings for one taxonomy: built-in defaults overlaid with the
/// taxonomy's own labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    entries: BTreeMap<String, String>,
}

impl Labels {
    pub fn for_taxonomy(taxonomy: &TaxonomyDescriptor) -> Self {
        let mut entries: BTreeMap<String, String> = DEFAULT_LABELS
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        for (key, value) in &taxonomy.labels {
            entries.insert(key.clone(), value.clone());
        }
        Self { entries }
    }

    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn topics(&self, count: u64) -> String {
        let key = if count == 1 { "topic" } else { "topics" };
        format!("{} {}", count, self.get(key))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSettings {
    pub cloud: CloudScale,
}

/// Result of draining a controller's event channel.
#[derive(Debug)]
pub enum Pumped {
    Events(Vec<ControllerEvent>),
    /// Some events were overwritten before they were read.
    Lagged(u64),
}

/// A view's subscription to its controller.
pub struct EventPump {
    receiver: broadcast::Receiver<ControllerEvent>,
    last_version: u64,
}

impl EventPump {
    pub fn new(controller: &TaxonomyController) -> Self {
        Self {
            receiver: controller.subscribe(),
            last_version: controller.version(),
        }
    }

    pub fn last_version(&self) -> u64 {
        self.last_version
    }

    pub fn drain(&mut self) -> Pumped {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    self.last_version = event.version;
                    events.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("view fell behind by {} events; re-rendering", skipped);
                    // Drop whatever is still queued; a full render covers it.
                    while let Ok(event) = self.receiver.try_recv() {
                        self.last_version = event.version;
                    }
                    return Pumped::Lagged(skipped);
                }
            }
        }
        Pumped::Events(events)
    }
}

pub enum TaxonomyView {
    Category(CategoryBox),
    Tag(TagBox),
}

impl TaxonomyView {
    /// Checklist for hierarchical taxonomies, chips and cloud otherwise.
    pub fn for_controller(controller: TaxonomyController, settings: &ViewSettings) -> Self {
        let labels = Labels::for_taxonomy(controller.taxonomy());
        if controller.capabilities().supports_parent {
            TaxonomyView::Category(CategoryBox::new(controller, labels))
        } else {
            TaxonomyView::Tag(TagBox::new(controller, labels, settings.cloud.clone()))
        }
    }

    pub fn controller(&self) -> &TaxonomyController {
        match self {
            TaxonomyView::Category(view) => view.controller(),
            TaxonomyView::Tag(view) => view.controller(),
        }
    }

    pub fn labels(&self) -> &Labels {
        match self {
            TaxonomyView::Category(view) => view.labels(),
            TaxonomyView::Tag(view) => view.labels(),
        }
    }

    pub fn handle(&mut self, event: &ControllerEvent) {
        match self {
            TaxonomyView::Category(view) => view.handle(event),
            TaxonomyView::Tag(view) => view.handle(event),
        }
    }

    pub fn render_all(&mut self) {
        match self {
            TaxonomyView::Category(view) => view.render_all(),
            TaxonomyView::Tag(view) => view.render_all(),
        }
    }

    /// Applies pending controller events; returns how many were handled.
    pub fn sync(&mut self, pump: &mut EventPump) -> usize {
        match pump.drain() {
            Pumped::Events(events) => {
                for event in &events {
                    self.handle(event);
                }
                if !events.is_empty() {
                    debug!(
                        "{} view applied {} events up to version {}",
                        self.controller().slug(),
                        events.len(),
                        pump.last_version()
                    );
                }
                events.len()
            }
            Pumped::Lagged(_) => {
                self.render_all();
                0
            }
        }
    }

    pub fn as_category(&self) -> Option<&CategoryBox> {
        match self {
            TaxonomyView::Category(view) => Some(view),
            TaxonomyView::Tag(_) => None,
        }
    }

    pub fn as_category_mut(&mut self) -> Option<&mut CategoryBox> {
        match self {
            TaxonomyView::Category(view) => Some(view),
            TaxonomyView::Tag(_) => None,
        }
    }

    pub fn as_tag(&self) -> Option<&TagBox> {
        match self {
            TaxonomyView::Tag(view) => Some(view),
            TaxonomyView::Category(_) => None,
        }
    }

    pub fn as_tag_mut(&mut self) -> Option<&mut TagBox> {
        match self {
            TaxonomyView::Tag(view) => Some(view),
            TaxonomyView::Category(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use crate::term::Term;
    use std::sync::Arc;

    #[test]
    fn labels_overlay_taxonomy_strings() {
        let taxonomy = TaxonomyDescriptor::new("post_tag", "tags", false)
            .with_label("most_used", "Popular tags");
        let labels = Labels::for_taxonomy(&taxonomy);
        assert_eq!(labels.get("most_used"), "Popular tags");
        assert_eq!(labels.get("add"), "Add");
        assert_eq!(labels.get("unknown_key"), "unknown_key");
        assert_eq!(labels.topics(1), "1 topic");
        assert_eq!(labels.topics(0), "0 topics");
        assert_eq!(labels.topics(12), "12 topics");
    }

    #[tokio::test]
    async fn lagging_pump_falls_back_to_full_render() {
        let taxonomy = TaxonomyDescriptor::new("post_tag", "tags", false);
        let backend = MemoryBackend::new();
        backend.add_taxonomy(taxonomy.clone());
        backend.seed_terms("tags", (1..=3).map(|id| Term::new(id, format!("t{}", id))));
        let controller = TaxonomyController::new(taxonomy, 1, Arc::new(backend));
        controller.load_terms().await.expect("load");

        let mut view = TaxonomyView::for_controller(controller.clone(), &ViewSettings::default());
        let mut pump = EventPump::new(&controller);
        for _ in 0..400 {
            controller.set_selected(1, None);
            controller.remove_selected(1, None);
        }
        assert!(matches!(pump.drain(), Pumped::Lagged(_)));
        assert_eq!(pump.last_version(), controller.version());

        controller.set_selected(2, None);
        assert_eq!(view.sync(&mut pump), 1);
        let chips = view.as_tag().expect("tag view").chips();
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].id, 2);
    }
}
