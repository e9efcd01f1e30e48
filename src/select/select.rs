use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Selectable;
use super::SelectableId;
use crate::Error;
use crate::Result;
use crate::SelectConfig;
use crate::SelectError;

/// Result tag of one `select` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectState {
    Object,
    Timeout,
    Error,
}

#[derive(Debug)]
pub enum SelectOutcome {
    /// Ids of every ready object, highest priority first, then in
    /// registration order
    Object(Vec<SelectableId>),
    Timeout,
    /// Readiness could not be determined. The dispatch loop decides whether
    /// to continue.
    Error(Error),
}

impl SelectOutcome {
    pub fn state(&self) -> SelectState {
        match self {
            SelectOutcome::Object(_) => SelectState::Object,
            SelectOutcome::Timeout => SelectState::Timeout,
            SelectOutcome::Error(_) => SelectState::Error,
        }
    }

    /// Ready ids, empty unless the outcome is `Object`
    pub fn ready(&self) -> &[SelectableId] {
        match self {
            SelectOutcome::Object(ids) => ids,
            _ => &[],
        }
    }

    pub fn is_ready(
        &self,
        id: SelectableId,
    ) -> bool {
        self.ready().contains(&id)
    }
}

/// Readiness multiplexer over heterogeneous consumer-side objects
///
/// Each call first asks every registered object for its current occupancy,
/// so backlog present at registration time or left behind by a partial
/// drain is reported without a new event. Only when nothing is ready does
/// it suspend on the objects' notifiers, then it looks again.
pub struct Select {
    selectables: Vec<Arc<dyn Selectable>>,
    default_timeout: Option<Duration>,
}

impl std::fmt::Debug for Select {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let ids: Vec<SelectableId> = self.selectables.iter().map(|s| s.selectable_id()).collect();
        f.debug_struct("Select")
            .field("selectables", &ids)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

impl Select {
    pub fn new() -> Self {
        Self {
            selectables: Vec::new(),
            default_timeout: None,
        }
    }

    pub fn from_config(config: &SelectConfig) -> Self {
        Self {
            selectables: Vec::new(),
            default_timeout: config.default_timeout(),
        }
    }

    /// Registers `selectable`. Returns `false`, leaving the registry
    /// untouched, when an object with the same id is already registered.
    pub fn add_selectable(
        &mut self,
        selectable: Arc<dyn Selectable>,
    ) -> bool {
        let id = selectable.selectable_id();
        if self.contains(id) {
            warn!(selectable_id = id, "Selectable already registered, ignored");
            return false;
        }
        debug!(selectable_id = id, priority = selectable.priority(), "Selectable registered");
        self.selectables.push(selectable);
        true
    }

    pub fn add_selectables(
        &mut self,
        selectables: impl IntoIterator<Item = Arc<dyn Selectable>>,
    ) {
        for selectable in selectables {
            self.add_selectable(selectable);
        }
    }

    /// Deregisters `selectable`, returning whether it was registered
    pub fn remove_selectable(
        &mut self,
        selectable: &dyn Selectable,
    ) -> bool {
        let id = selectable.selectable_id();
        let before = self.selectables.len();
        self.selectables.retain(|s| s.selectable_id() != id);
        let removed = self.selectables.len() != before;
        if removed {
            debug!(selectable_id = id, "Selectable removed");
        }
        removed
    }

    pub fn contains(
        &self,
        id: SelectableId,
    ) -> bool {
        self.selectables.iter().any(|s| s.selectable_id() == id)
    }

    pub fn len(&self) -> usize {
        self.selectables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectables.is_empty()
    }

    /// Waits until at least one registered object is ready.
    ///
    /// `None` (or a timeout too large to represent, e.g. `Duration::MAX`)
    /// waits forever, `Some(Duration::ZERO)` only polls. Errors never
    /// escape as `Err`: they come back as [`SelectOutcome::Error`].
    pub async fn select(
        &self,
        timeout: Option<Duration>,
    ) -> SelectOutcome {
        // A timeout past the end of the clock waits forever
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        if self.selectables.is_empty() && deadline.is_none() {
            return SelectOutcome::Error(SelectError::NothingRegistered.into());
        }

        loop {
            match self.ready_ids() {
                Err(e) => {
                    warn!(error = %e, "Failed to poll selectable readiness");
                    return SelectOutcome::Error(e);
                }
                Ok(ids) if !ids.is_empty() => {
                    trace!(?ids, "Select ready");
                    return SelectOutcome::Object(ids);
                }
                Ok(_) => {}
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    trace!("Select timed out");
                    return SelectOutcome::Timeout;
                }
            }

            if self.selectables.is_empty() {
                // Only reachable with a deadline
                if let Some(deadline) = deadline {
                    tokio::time::sleep_until(deadline).await;
                }
                return SelectOutcome::Timeout;
            }

            let notifiers: Vec<_> = self.selectables.iter().map(|s| s.notifier()).collect();
            let wait_any = select_all(notifiers.iter().map(|n| Box::pin(n.notified())));

            match deadline {
                None => {
                    wait_any.await;
                }
                Some(deadline) => {
                    tokio::select! {
                        _ = wait_any => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
            }
        }
    }

    /// [`Select::select`] with the configured default timeout
    pub async fn select_default(&self) -> SelectOutcome {
        self.select(self.default_timeout).await
    }

    fn ready_ids(&self) -> Result<Vec<SelectableId>> {
        let mut ready = Vec::new();
        for selectable in &self.selectables {
            if selectable.has_pending()? {
                ready.push((selectable.priority(), selectable.selectable_id()));
            }
        }
        // Stable: equal priorities keep registration order
        ready.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ready.into_iter().map(|(_, id)| id).collect())
    }
}
