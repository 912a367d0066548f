// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::term::{Term, TermId};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Case-insensitive name, ties by id.
    Name,
    /// Highest usage count first; ties keep arrival order.
    CountDesc,
    Insertion,
}

/// Ordered set of terms, unique by id.
#[derive(Debug, Clone)]
pub struct TermCollection {
    sort: SortKey,
    items: Vec<Term>,
}

impl TermCollection {
    pub fn new(sort: SortKey) -> Self {
        Self {
            sort,
            items: Vec::new(),
        }
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort
    }

    /// Swaps the whole set. Later duplicates of an id are dropped.
    pub fn replace(&mut self, terms: Vec<Term>) {
        let mut seen = HashSet::with_capacity(terms.len());
        self.items = terms
            .into_iter()
            .filter(|term| seen.insert(term.id))
            .collect();
        self.resort();
    }

    /// Returns false when the id was already present; its content is
    /// refreshed in place and its flags kept.
    pub fn insert(&mut self, term: Term) -> bool {
        if let Some(existing) = self.get_mut(term.id) {
            existing.merge_content(&term);
            self.resort();
            return false;
        }
        self.items.push(term);
        self.resort();
        true
    }

    pub fn remove(&mut self, id: TermId) -> Option<Term> {
        let index = self.items.iter().position(|term| term.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) -> Vec<Term> {
        std::mem::take(&mut self.items)
    }

    pub fn get(&self, id: TermId) -> Option<&Term> {
        self.items.iter().find(|term| term.id == id)
    }

    pub fn get_mut(&mut self, id: TermId) -> Option<&mut Term> {
        self.items.iter_mut().find(|term| term.id == id)
    }

    pub fn contains(&self, id: TermId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Term> {
        self.items.iter_mut()
    }

    pub fn ids(&self) -> Vec<TermId> {
        self.items.iter().map(|term| term.id).collect()
    }

    pub fn to_vec(&self) -> Vec<Term> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn resort(&mut self) {
        match self.sort {
            SortKey::Name => self.items.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then(a.id.cmp(&b.id))
            }),
            SortKey::CountDesc => self.items.sort_by(|a, b| b.count.cmp(&a.count)),
            SortKey::Insertion => {}
        }
    }
}
