//! Human-in-the-loop resolution of review items.

use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::Backend;
use crate::errors::ConsoleError;
use crate::models::{Resolution, ReviewItem};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Resolved(ReviewItem),
    /// The item was already terminal; nothing was sent.
    AlreadyResolved(ReviewItem),
    /// Another action on the same item has not finished yet.
    InFlight,
}

/// Removes the in-flight marker when the action finishes, however it ends.
struct InFlightGuard<'a> {
    map: &'a DashMap<String, ()>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.id);
    }
}

pub struct EscalationWorkflow {
    backend: Arc<dyn Backend>,
    resolver: String,
    items: RwLock<Vec<ReviewItem>>,
    in_flight: DashMap<String, ()>,
    errors: DashMap<String, String>,
}

impl EscalationWorkflow {
    pub fn new(backend: Arc<dyn Backend>, resolver: &str) -> Self {
        Self {
            backend,
            resolver: resolver.to_string(),
            items: RwLock::new(Vec::new()),
            in_flight: DashMap::new(),
            errors: DashMap::new(),
        }
    }

    pub async fn items(&self) -> Vec<ReviewItem> {
        self.items.read().await.clone()
    }

    pub async fn pending(&self) -> Vec<ReviewItem> {
        self.items.read().await.iter().filter(|i| i.is_pending()).cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<ReviewItem> {
        self.items.read().await.iter().find(|i| i.id == id).cloned()
    }

    /// Last failure recorded for an item, for display next to it.
    pub fn last_error(&self, id: &str) -> Option<String> {
        self.errors.get(id).map(|e| e.value().clone())
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Replace the queue. Items resolved locally never go back to pending.
    pub async fn load(&self, incoming: Vec<ReviewItem>) {
        let mut items = self.items.write().await;
        let previous = std::mem::take(&mut *items);

        let mut next: Vec<ReviewItem> = incoming
            .into_iter()
            .map(|item| match previous.iter().find(|p| p.id == item.id) {
                Some(local) if local.status.is_terminal() && !item.status.is_terminal() => {
                    local.clone()
                }
                _ => item,
            })
            .collect();

        for local in previous {
            if local.status.is_terminal() && !next.iter().any(|i| i.id == local.id) {
                next.push(local);
            }
        }
        *items = next;
    }

    /// Reload pending items from the backend.
    pub async fn refresh(&self) -> Result<usize, ConsoleError> {
        let fetched = self.backend.escalations().await?;
        let count = fetched.len();
        self.load(fetched).await;
        Ok(count)
    }

    /// Reload items in every status from the backend.
    pub async fn refresh_all(&self) -> Result<usize, ConsoleError> {
        let fetched = self.backend.all_escalations().await?;
        let count = fetched.len();
        self.load(fetched).await;
        Ok(count)
    }

    pub async fn approve(&self, id: &str) -> Result<ResolveOutcome, ConsoleError> {
        self.resolve(id, Resolution::Approved).await
    }

    pub async fn reject(&self, id: &str) -> Result<ResolveOutcome, ConsoleError> {
        self.resolve(id, Resolution::Rejected).await
    }

    pub async fn defer(&self, id: &str) -> Result<ResolveOutcome, ConsoleError> {
        self.resolve(id, Resolution::Deferred).await
    }

    pub async fn resolve(
        &self,
        id: &str,
        resolution: Resolution,
    ) -> Result<ResolveOutcome, ConsoleError> {
        let _guard = match self.in_flight.entry(id.to_string()) {
            Entry::Occupied(_) => return Ok(ResolveOutcome::InFlight),
            Entry::Vacant(slot) => {
                slot.insert(());
                InFlightGuard { map: &self.in_flight, id: id.to_string() }
            }
        };

        // Read under the guard: an action that finished before we took it is visible here.
        let current = self
            .get(id)
            .await
            .ok_or_else(|| ConsoleError::NotFound(format!("Escalation {} not found", id)))?;
        if current.status.is_terminal() {
            return Ok(ResolveOutcome::AlreadyResolved(current));
        }

        match self.backend.resolve_escalation(id, resolution, &self.resolver).await {
            Ok(ack) => {
                self.errors.remove(id);
                let resolved = self.stamp(id, resolution, ack).await;
                info!(id, resolution = %resolution, resolved_by = ?resolved.resolved_by, "Escalation resolved");
                Ok(ResolveOutcome::Resolved(resolved))
            }
            Err(ConsoleError::ResolutionConflict { .. })
            | Err(ConsoleError::HttpStatus { status: 409, .. }) => {
                warn!(id, "Escalation was already resolved on the backend");
                Ok(ResolveOutcome::AlreadyResolved(current))
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to resolve escalation");
                self.errors.insert(id.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    /// Record the backend acknowledgment, falling back to the local resolver and clock.
    async fn stamp(&self, id: &str, resolution: Resolution, ack: ReviewItem) -> ReviewItem {
        let mut items = self.items.write().await;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return ack;
        };
        item.status = if ack.status.is_terminal() { ack.status } else { resolution.status() };
        item.resolved_by = ack.resolved_by.or_else(|| Some(self.resolver.clone()));
        item.resolved_at = ack.resolved_at.or_else(|| Some(Utc::now()));
        item.clone()
    }
}
