//! Context entries and categories.

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{default_categories, Category, ContextEntry, NewContextEntry};

use super::generation::{Generation, Ticket};

pub struct ContextStore {
    backend: Arc<dyn Backend>,
    entries: Vec<ContextEntry>,
    categories: Vec<Category>,
    generation: Generation,
}

impl ContextStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            entries: Vec::new(),
            categories: default_categories(),
            generation: Generation::new(),
        }
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub async fn refresh(&mut self) -> Result<&[ContextEntry]> {
        let ticket = self.generation.begin();
        let result = self.backend.list_context().await;
        self.finish_refresh(ticket, result)?;
        Ok(&self.entries)
    }

    /// Apply a refresh response, unless a newer refresh has started.
    ///
    /// Returns whether the response was applied.
    pub fn finish_refresh(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<ContextEntry>>,
    ) -> Result<bool> {
        let entries = result?;
        if !self.generation.is_current(ticket) {
            tracing::debug!("Discarding stale context response");
            return Ok(false);
        }
        tracing::debug!(count = entries.len(), "Context refreshed");
        self.entries = entries;
        Ok(true)
    }

    pub fn begin_refresh(&self) -> Ticket {
        self.generation.begin()
    }

    pub async fn add(&mut self, entry: NewContextEntry) -> Result<ContextEntry> {
        let created = self.backend.create_context(&entry).await?;
        self.entries.insert(0, created.clone());
        Ok(created)
    }

    pub async fn refresh_categories(&mut self) -> Result<&[Category]> {
        self.categories = self.backend.list_categories().await?;
        Ok(&self.categories)
    }

    pub(crate) fn clear(&mut self) {
        self.generation.begin();
        self.entries.clear();
    }
}
