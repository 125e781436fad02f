use std::cmp::Ordering;

/// Heap entry ordered by score only.
#[derive(Debug, Clone)]
pub struct ScoredItem<T> {
    pub score: f32,
    pub item: T,
}

impl<T> PartialEq for ScoredItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score) == Ordering::Equal
    }
}

impl<T> Eq for ScoredItem<T> {}

impl<T> PartialOrd for ScoredItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ScoredItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // total_cmp keeps the heap consistent if a NaN slips in
        self.score.total_cmp(&other.score)
    }
}
