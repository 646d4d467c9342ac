use std::iter::FusedIterator;
use std::vec;

/// Immutable, ordered copy of a history taken at read time.
///
/// A snapshot owns its values, so writes made to the store after the read
/// never show up in it. Values are yielded oldest first.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    values: vec::IntoIter<T>,
}

impl<T> Snapshot<T> {
    pub fn empty() -> Self {
        Self::from(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }

    /// Remaining values as a slice, without consuming the snapshot.
    pub fn as_slice(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values.collect()
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for Snapshot<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values: values.into_iter() }
    }
}

impl<T> Iterator for Snapshot<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.values.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<T> DoubleEndedIterator for Snapshot<T> {
    fn next_back(&mut self) -> Option<T> {
        self.values.next_back()
    }
}

impl<T> ExactSizeIterator for Snapshot<T> {}

impl<T> FusedIterator for Snapshot<T> {}
