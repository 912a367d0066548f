// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type TermId = u64;

pub const HIERARCHICAL_POPULAR_LIMIT: usize = 10;
pub const FLAT_POPULAR_LIMIT: usize = 45;

/// A taxonomy term as returned by the term collection endpoints.
///
/// `selected`, `popular` and `require_force_delete` are client-side flags and
/// never travel over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent: TermId,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub taxonomy: String,
    #[serde(skip)]
    pub selected: bool,
    #[serde(skip)]
    pub popular: bool,
    #[serde(skip)]
    pub require_force_delete: bool,
}

impl Term {
    pub fn new(id: TermId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: slugify(&name),
            name,
            parent: 0,
            count: 0,
            taxonomy: String::new(),
            selected: false,
            popular: false,
            require_force_delete: false,
        }
    }

    pub fn with_parent(mut self, parent: TermId) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_taxonomy(mut self, taxonomy: impl Into<String>) -> Self {
        self.taxonomy = taxonomy.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent == 0
    }

    /// Copies server-owned fields from `other`, keeping the local flags.
    pub fn merge_content(&mut self, other: &Term) {
        self.name = other.name.clone();
        self.slug = other.slug.clone();
        self.parent = other.parent;
        self.count = other.count;
        if !other.taxonomy.is_empty() {
            self.taxonomy = other.taxonomy.clone();
        }
    }
}

/// Payload of the term creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTerm {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TermId>,
}

/// What the add-new gestures hand to the controller. `parent` is signed
/// because the parent picker uses `-1` for "no parent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTermInput {
    pub name: String,
    pub parent: Option<i64>,
}

impl NewTermInput {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: i64) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyDescriptor {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    pub rest_base: String,
    #[serde(default)]
    pub hierarchical: bool,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TaxonomyDescriptor {
    pub fn new(slug: impl Into<String>, rest_base: impl Into<String>, hierarchical: bool) -> Self {
        let slug = slug.into();
        Self {
            name: slug.clone(),
            slug,
            rest_base: rest_base.into(),
            hierarchical,
            types: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|value| value.to_string()).collect();
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn applies_to(&self, post_type: &str) -> bool {
        self.types.iter().any(|value| value == post_type)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrdering {
    Alphabetic,
    Insertion,
}

/// The knobs that separate checklist taxonomies from tag taxonomies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_parent: bool,
    pub popular_limit: usize,
    pub selected_ordering: SelectionOrdering,
}

impl Capabilities {
    pub fn hierarchical() -> Self {
        Self {
            supports_parent: true,
            popular_limit: HIERARCHICAL_POPULAR_LIMIT,
            selected_ordering: SelectionOrdering::Alphabetic,
        }
    }

    pub fn flat() -> Self {
        Self {
            supports_parent: false,
            popular_limit: FLAT_POPULAR_LIMIT,
            selected_ordering: SelectionOrdering::Insertion,
        }
    }

    pub fn for_taxonomy(taxonomy: &TaxonomyDescriptor) -> Self {
        if taxonomy.hierarchical {
            Self::hierarchical()
        } else {
            Self::flat()
        }
    }

    pub fn with_popular_limit(mut self, limit: usize) -> Self {
        self.popular_limit = limit.max(1);
        self
    }
}

/// Which checklist panel a selection gesture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelContext {
    All,
    Popular,
}

impl PanelContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelContext::All => "all",
            PanelContext::Popular => "pop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(PanelContext::All),
            "pop" | "popular" => Some(PanelContext::Popular),
            _ => None,
        }
    }
}

impl fmt::Display for PanelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}
