//! Speculative mutations and the handles that resolve them.

use std::fmt;
use std::sync::Arc;

use crate::core::{Epoch, Mutation};

/// Identifier of a speculative mutation, unique within one overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl MutationId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Caller's token for reconciling or reverting a proposed mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationHandle<K> {
    /// Channel the mutation was proposed on
    pub channel: K,
    /// Mutation identifier
    pub id: MutationId,
    /// Epoch the mutation was stamped with
    pub epoch: Epoch,
}

/// Outcome of resolving a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The mutation was pending and has now been removed
    Resolved,
    /// The mutation was already gone (reconciled, reverted or discarded)
    AlreadyResolved,
}

impl Resolution {
    /// Whether this call removed the mutation
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved)
    }
}

/// A pending, unconfirmed transformation of a channel's base value
pub struct SpeculativeMutation<T> {
    id: MutationId,
    epoch: Epoch,
    label: Option<String>,
    apply: Arc<dyn Mutation<T>>,
}

impl<T> SpeculativeMutation<T> {
    /// Create a mutation
    pub fn new(
        id: MutationId,
        epoch: Epoch,
        label: Option<String>,
        apply: Arc<dyn Mutation<T>>,
    ) -> Self {
        Self {
            id,
            epoch,
            label,
            apply,
        }
    }

    /// Mutation identifier
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// Epoch at which the mutation was proposed
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Presentation label, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Apply the mutation to a base value
    pub fn apply(&self, base: T) -> T {
        self.apply.apply(base)
    }

    /// Borrowed summary for presentation
    pub fn info(&self) -> MutationInfo<'_> {
        MutationInfo {
            id: self.id,
            epoch: self.epoch,
            label: self.label.as_deref(),
        }
    }
}

impl<T> Clone for SpeculativeMutation<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            epoch: self.epoch,
            label: self.label.clone(),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<T> fmt::Debug for SpeculativeMutation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeculativeMutation")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Summary of a pending mutation, for "saving..." style indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationInfo<'a> {
    /// Mutation identifier
    pub id: MutationId,
    /// Epoch at which the mutation was proposed
    pub epoch: Epoch,
    /// Presentation label, if any
    pub label: Option<&'a str>,
}
