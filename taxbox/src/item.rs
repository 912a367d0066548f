// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::store::{RestClient, StoreResult};
use crate::term::{TaxonomyDescriptor, TermId};
use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;

/// The content item being edited, as seen by the save step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItemRef {
    pub id: u64,
    pub post_type: String,
    pub rest_base: String,
}

impl ContentItemRef {
    pub fn new(id: u64, post_type: impl Into<String>, rest_base: impl Into<String>) -> Self {
        Self {
            id,
            post_type: post_type.into(),
            rest_base: rest_base.into(),
        }
    }

    pub fn post(id: u64) -> Self {
        Self::new(id, "post", "posts")
    }
}

/// Receives the selected term ids of one taxonomy and persists them in the
/// item's term-assignment field for that taxonomy.
#[async_trait]
pub trait ContentItem: Send {
    async fn assign_terms(
        &mut self,
        taxonomy: &TaxonomyDescriptor,
        ids: Vec<TermId>,
    ) -> StoreResult<()>;
}

/// Assignments kept in memory, keyed by taxonomy `rest_base`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDocument {
    pub id: u64,
    fields: BTreeMap<String, Vec<TermId>>,
}

impl PostDocument {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn field(&self, rest_base: &str) -> Option<&[TermId]> {
        self.fields.get(rest_base).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<TermId>> {
        &self.fields
    }

    /// The document body as it would be posted, e.g. `{"tags":[1,2]}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self.fields)
    }
}

#[async_trait]
impl ContentItem for PostDocument {
    async fn assign_terms(
        &mut self,
        taxonomy: &TaxonomyDescriptor,
        ids: Vec<TermId>,
    ) -> StoreResult<()> {
        self.fields.insert(taxonomy.rest_base.clone(), ids);
        Ok(())
    }
}

/// Writes assignments straight to the item's REST endpoint.
pub struct RestPost {
    client: RestClient,
    item: ContentItemRef,
}

impl RestPost {
    pub fn new(client: RestClient, item: ContentItemRef) -> Self {
        Self { client, item }
    }

    pub fn item(&self) -> &ContentItemRef {
        &self.item
    }
}

#[async_trait]
impl ContentItem for RestPost {
    async fn assign_terms(
        &mut self,
        taxonomy: &TaxonomyDescriptor,
        ids: Vec<TermId>,
    ) -> StoreResult<()> {
        let mut body = serde_json::Map::new();
        body.insert(taxonomy.rest_base.clone(), serde_json::json!(ids));
        self.client
            .update_item(
                &self.item.rest_base,
                self.item.id,
                &serde_json::Value::Object(body),
            )
            .await?;
        info!(
            "saved {} {} terms on {} {}",
            ids.len(),
            taxonomy.slug,
            self.item.post_type,
            self.item.id
        );
        Ok(())
    }
}
