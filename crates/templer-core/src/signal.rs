//! Change signals
//!
//! A [`ChangeSignal`] is an ordered list of listeners. Firing it yields the
//! listeners in subscription order; the owner of the listeners invokes them
//! and decides what to do with their errors.

/// Ordered set of listeners notified when a source changes
///
/// Subscribing the same listener twice registers it twice, and it is yielded
/// twice when the signal fires.
#[derive(Debug, Clone)]
pub struct ChangeSignal<L> {
    listeners: Vec<L>,
}

impl<L> Default for ChangeSignal<L> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<L: Clone + PartialEq> ChangeSignal<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener
    pub fn subscribe(&mut self, listener: L) {
        self.listeners.push(listener);
    }

    /// Remove the first registration of `listener`, if any
    ///
    /// Returns `true` when a registration was removed.
    pub fn unsubscribe(&mut self, listener: &L) -> bool {
        match self.listeners.iter().position(|l| l == listener) {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the listeners to notify, in subscription order
    ///
    /// The snapshot is detached from the signal so listeners may subscribe or
    /// unsubscribe while it is being dispatched.
    #[must_use]
    pub fn fire(&self) -> Vec<L> {
        self.listeners.clone()
    }

    pub fn listeners(&self) -> &[L] {
        &self.listeners
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
