use serde::Serialize;

use crate::overlay::Dimension;

/// Load status of a single overlay dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DimensionStatus {
    pub has_loaded: bool,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Permission to fetch one dimension for one model generation.
///
/// Handed out by [`ViewState::activate`] and returned through
/// [`ViewState::complete`] or [`ViewState::fail`]. A ticket from an older
/// generation is refused so that late results never land on a newer rack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub dimension: Dimension,
}

/// Outcome of activating a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The caller must fetch the dimension and report back with the ticket.
    Fetch(FetchTicket),
    /// Data is already merged; only the active dimension changed.
    Switched,
    /// A fetch for this dimension is already in flight.
    Pending,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Switched => "switched",
            Self::Pending => "pending",
        }
    }
}

/// Which dimension is shown and which ones have been fetched for the current model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    generation: u64,
    active: Dimension,
    clases: DimensionStatus,
    inventario: DimensionStatus,
    quiebres: DimensionStatus,
}

impl ViewState {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            active: Dimension::Clases,
            clases: DimensionStatus::default(),
            inventario: DimensionStatus::default(),
            quiebres: DimensionStatus::default(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active(&self) -> Dimension {
        self.active
    }

    pub fn status(&self, dimension: Dimension) -> &DimensionStatus {
        match dimension {
            Dimension::Clases => &self.clases,
            Dimension::Inventario => &self.inventario,
            Dimension::Quiebres => &self.quiebres,
        }
    }

    fn status_mut(&mut self, dimension: Dimension) -> &mut DimensionStatus {
        match dimension {
            Dimension::Clases => &mut self.clases,
            Dimension::Inventario => &mut self.inventario,
            Dimension::Quiebres => &mut self.quiebres,
        }
    }

    pub fn has_loaded(&self, dimension: Dimension) -> bool {
        self.status(dimension).has_loaded
    }

    pub fn is_loading(&self, dimension: Dimension) -> bool {
        self.status(dimension).is_loading
    }

    /// Makes `dimension` the active one and decides whether it needs a fetch.
    pub fn activate(&mut self, dimension: Dimension) -> Activation {
        self.active = dimension;
        let generation = self.generation;
        let status = self.status_mut(dimension);
        if status.has_loaded {
            return Activation::Switched;
        }
        if status.is_loading {
            return Activation::Pending;
        }
        status.is_loading = true;
        Activation::Fetch(FetchTicket {
            generation,
            dimension,
        })
    }

    /// Records a successful fetch. Returns `false` when the ticket is stale.
    pub fn complete(&mut self, ticket: FetchTicket) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        let status = self.status_mut(ticket.dimension);
        status.is_loading = false;
        status.has_loaded = true;
        status.last_error = None;
        true
    }

    /// Records a failed fetch, leaving the dimension retryable.
    /// Returns `false` when the ticket is stale.
    pub fn fail(&mut self, ticket: FetchTicket, error: impl Into<String>) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        let status = self.status_mut(ticket.dimension);
        status.is_loading = false;
        status.has_loaded = false;
        status.last_error = Some(error.into());
        true
    }

    /// Whether a ticket belongs to the current generation and is still in flight.
    pub fn accepts(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation && self.is_loading(ticket.dimension)
    }

    /// Starts over for a freshly built model; the active dimension is kept.
    pub fn reset(&mut self, generation: u64) {
        let active = self.active;
        *self = Self::new(generation);
        self.active = active;
    }

    /// Dimensions ordered as [`Dimension::ALL`] with their status.
    pub fn statuses(&self) -> impl Iterator<Item = (Dimension, &DimensionStatus)> {
        Dimension::ALL
            .into_iter()
            .map(move |dimension| (dimension, self.status(dimension)))
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(activation: Activation) -> FetchTicket {
        match activation {
            Activation::Fetch(ticket) => ticket,
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn starts_on_classes_with_nothing_loaded() {
        let view = ViewState::new(1);
        assert_eq!(view.active(), Dimension::Clases);
        for (_, status) in view.statuses() {
            assert_eq!(status, &DimensionStatus::default());
        }
    }

    #[test]
    fn first_activation_requests_fetch() {
        let mut view = ViewState::new(1);
        let ticket = ticket(view.activate(Dimension::Inventario));
        assert_eq!(ticket.generation, 1);
        assert_eq!(ticket.dimension, Dimension::Inventario);
        assert_eq!(view.active(), Dimension::Inventario);
        assert!(view.is_loading(Dimension::Inventario));
        assert!(!view.has_loaded(Dimension::Inventario));
    }

    #[test]
    fn repeat_activation_while_loading_is_pending() {
        let mut view = ViewState::new(1);
        let _ = ticket(view.activate(Dimension::Inventario));
        assert_eq!(view.activate(Dimension::Inventario), Activation::Pending);
        assert_eq!(view.activate(Dimension::Clases).as_str(), "fetch");
        assert_eq!(view.activate(Dimension::Inventario), Activation::Pending);
    }

    #[test]
    fn loaded_dimension_switches_without_fetch() {
        let mut view = ViewState::new(1);
        let inventario = ticket(view.activate(Dimension::Inventario));
        assert!(view.complete(inventario));
        let _ = view.activate(Dimension::Quiebres);
        assert_eq!(view.activate(Dimension::Inventario), Activation::Switched);
        assert_eq!(view.active(), Dimension::Inventario);
    }

    #[test]
    fn failure_is_retryable_and_keeps_other_dimensions() {
        let mut view = ViewState::new(1);
        let clases = ticket(view.activate(Dimension::Clases));
        assert!(view.complete(clases));

        let quiebres = ticket(view.activate(Dimension::Quiebres));
        assert!(view.fail(quiebres, "timeout"));
        assert!(!view.has_loaded(Dimension::Quiebres));
        assert!(!view.is_loading(Dimension::Quiebres));
        assert_eq!(
            view.status(Dimension::Quiebres).last_error.as_deref(),
            Some("timeout")
        );
        assert!(view.has_loaded(Dimension::Clases));

        let retry = ticket(view.activate(Dimension::Quiebres));
        assert!(view.complete(retry));
        assert!(view.status(Dimension::Quiebres).last_error.is_none());
    }

    #[test]
    fn reset_clears_flags_and_rejects_old_tickets() {
        let mut view = ViewState::new(1);
        let clases = ticket(view.activate(Dimension::Clases));
        assert!(view.complete(clases));
        let stale = ticket(view.activate(Dimension::Inventario));

        view.reset(2);
        assert_eq!(view.generation(), 2);
        assert_eq!(view.active(), Dimension::Inventario);
        assert!(!view.has_loaded(Dimension::Clases));
        assert!(!view.is_loading(Dimension::Inventario));

        assert!(!view.complete(stale));
        assert!(!view.fail(stale, "late"));
        assert!(!view.has_loaded(Dimension::Inventario));

        let fresh = ticket(view.activate(Dimension::Inventario));
        assert_eq!(fresh.generation, 2);
    }

    #[test]
    fn ticket_is_refused_once_used() {
        let mut view = ViewState::new(3);
        let inventario = ticket(view.activate(Dimension::Inventario));
        assert!(view.complete(inventario));
        assert!(!view.complete(inventario));
        assert!(!view.fail(inventario, "duplicate"));
        assert!(view.has_loaded(Dimension::Inventario));
    }
}
