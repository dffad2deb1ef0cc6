//! Presentation snapshot

use crate::core::Stamped;

/// Everything a presentation layer needs to render one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot<T, U = T> {
    /// Merged optimistic view (base plus pending mutations)
    pub view: Option<T>,
    /// Number of unconfirmed mutations folded into `view`
    pub pending_mutations: usize,
    /// Live input value
    pub live: Option<Stamped<T>>,
    /// Last published derived value
    pub settled: Option<Stamped<U>>,
    /// Whether `settled` lags `live`
    pub catching_up: bool,
}

impl<T, U> ViewSnapshot<T, U> {
    /// Whether any write is still unconfirmed
    pub fn is_pending(&self) -> bool {
        self.pending_mutations > 0
    }

    /// Whether the snapshot is fully confirmed and settled
    pub fn is_quiescent(&self) -> bool {
        !self.is_pending() && !self.catching_up
    }
}

impl<T, U> Default for ViewSnapshot<T, U> {
    fn default() -> Self {
        Self {
            view: None,
            pending_mutations: 0,
            live: None,
            settled: None,
            catching_up: false,
        }
    }
}
