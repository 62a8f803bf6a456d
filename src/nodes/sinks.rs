//! Sink behaviors capturing observed values.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::export_methods;

/// Shared view of the strings a [`Record`] sink has seen.
#[derive(Clone, Default)]
pub struct RecordTape {
    items: Arc<Mutex<Vec<String>>>,
}

impl RecordTape {
    /// Copy of the recorded strings, oldest first.
    #[must_use]
    pub fn items(&self) -> Vec<String> {
        self.items.lock().clone()
    }

    /// Number of recorded strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// `true` while nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// String sink: records every input on a shared tape.
#[derive(Default)]
pub struct Record {
    tape: RecordTape,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the shared tape; keep it before moving the behavior into
    /// a node.
    #[must_use]
    pub fn tape(&self) -> RecordTape {
        self.tape.clone()
    }

    fn forward(&mut self, input: String) {
        self.tape.items.lock().push(input);
    }
}

export_methods!(Record, "Record", {
    fn forward(String) -> ();
});

/// Shared view of the integers a [`Tally`] sink has seen.
#[derive(Clone, Default)]
pub struct TallyTape {
    items: Arc<Mutex<Vec<i64>>>,
}

impl TallyTape {
    /// Copy of the recorded values, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<i64> {
        self.items.lock().clone()
    }

    /// Number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// `true` while nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// Integer sink: records every input on a shared tape.
#[derive(Default)]
pub struct Tally {
    tape: TallyTape,
}

impl Tally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the shared tape.
    #[must_use]
    pub fn tape(&self) -> TallyTape {
        self.tape.clone()
    }

    fn forward(&mut self, input: i64) {
        self.tape.items.lock().push(input);
    }
}

export_methods!(Tally, "Tally", {
    fn forward(i64) -> ();
});
