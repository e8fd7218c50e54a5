//! Request-scoped constraints supplied by the caller.

use std::time::SystemTime;

/// Constraints describing what the caller already holds.
///
/// ```rust
/// # use cachine::Predicates;
/// # use std::time::SystemTime;
/// let predicates = Predicates::new().min_mod_time(SystemTime::UNIX_EPOCH);
/// assert!(predicates.min_mod_time.is_some());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Predicates {
    /// Modification time of the copy the caller already holds.
    ///
    /// `None` means the caller holds nothing and always receives the payload.
    pub min_mod_time: Option<SystemTime>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that the caller holds a copy as of `time`.
    pub fn min_mod_time(mut self, time: SystemTime) -> Self {
        self.min_mod_time = Some(time);
        self
    }
}
