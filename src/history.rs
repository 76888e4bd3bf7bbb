//! Snapshot-based undo/redo history.
//!
//! Holds an ordered, never-empty sequence of immutable snapshots plus a cursor.
//! Pushing after an undo discards the redo branch (linear history), and a push
//! equal to the current snapshot is ignored so no duplicate entries appear.

/// Linear undo/redo container over whole-state snapshots.
#[derive(Clone, Debug)]
pub struct HistoryStore<T> {
    entries: Vec<T>,
    cursor: usize,
}

impl<T: PartialEq> HistoryStore<T> {
    pub fn new(seed: T) -> Self {
        Self {
            entries: vec![seed],
            cursor: 0,
        }
    }

    /// Push a new snapshot. Returns `false` (and changes nothing) when `next`
    /// equals the current snapshot.
    pub fn push(&mut self, next: T) -> bool {
        if next == *self.current() {
            return false;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(next);
        self.cursor = self.entries.len() - 1;
        true
    }

    /// Push a snapshot derived from the current one.
    pub fn push_with(&mut self, derive: impl FnOnce(&T) -> T) -> bool {
        let next = derive(self.current());
        self.push(next)
    }

    /// Replace the whole history with `[seed]`.
    pub fn reset(&mut self, seed: T) {
        self.entries.clear();
        self.entries.push(seed);
        self.cursor = 0;
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: the history is seeded on construction and on reset.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}

impl<T: PartialEq + Default> Default for HistoryStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
