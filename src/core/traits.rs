//! Collaborator traits.
//!
//! Callers own their domain values and the pure functions that transform
//! them. The engine only needs to call them, so both traits are
//! blanket-implemented for plain closures.

/// A speculative, pure transformation of an authoritative base value.
///
/// # Requirements
///
/// - `apply` MUST be deterministic: the merged view is recomputed from the
///   base on every read.
/// - Mutations MUST compose in proposal order. Confirmations may arrive in
///   any order, but the fold always runs in the order mutations were proposed.
///
/// # Example
///
/// ```
/// use speculative_view::core::Mutation;
///
/// let increment = |n: i64| n + 1;
/// assert_eq!(Mutation::apply(&increment, 10), 11);
/// ```
pub trait Mutation<T>: Send + Sync {
    /// Apply the mutation to a base value.
    fn apply(&self, base: T) -> T;
}

impl<T, F> Mutation<T> for F
where
    F: Fn(T) -> T + Send + Sync,
{
    fn apply(&self, base: T) -> T {
        self(base)
    }
}

/// An expensive, pure derivation from a live input to a settled output.
///
/// `compute` MUST be side-effect free. Results computed for a superseded
/// input are discarded, so running it more than once is harmless.
pub trait Derivation<T, U>: Send + Sync {
    /// Derive the settled value from a live value.
    fn compute(&self, live: &T) -> U;
}

impl<T, U, F> Derivation<T, U> for F
where
    F: Fn(&T) -> U + Send + Sync,
{
    fn compute(&self, live: &T) -> U {
        self(live)
    }
}
