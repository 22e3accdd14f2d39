use dashmap::DashMap;

/// Last working candidate index per `(provider, operation)`.
///
/// Optimistic: the remembered index is only a hint for ordering. It is
/// replaced when another candidate wins and dropped when nothing works.
#[derive(Default)]
pub struct CandidateMemo {
    winners: DashMap<(String, String), usize>,
}

impl CandidateMemo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, provider_id: &str, operation: &str) -> Option<usize> {
        self.winners
            .get(&(provider_id.to_owned(), operation.to_owned()))
            .map(|v| *v)
    }

    /// Remembers `index`. Returns the previous value when it changed.
    #[must_use]
    pub fn record(&self, provider_id: &str, operation: &str, index: usize) -> Option<usize> {
        let previous = self
            .winners
            .insert((provider_id.to_owned(), operation.to_owned()), index);
        previous.filter(|p| *p != index)
    }

    #[must_use]
    pub fn forget(&self, provider_id: &str, operation: &str) -> bool {
        self.winners
            .remove(&(provider_id.to_owned(), operation.to_owned()))
            .is_some()
    }
}
