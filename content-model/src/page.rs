use serde::Deserialize;
use serde::Serialize;

/// One page of search results and the total number of matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultsPage<T> {
    pub results: Vec<T>,
    pub total: u64,
}

impl<T> ResultsPage<T> {
    pub fn new(results: Vec<T>, total: u64) -> Self {
        Self { results, total }
    }

    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ResultsPage<U> {
        ResultsPage {
            results: self.results.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T> Default for ResultsPage<T> {
    fn default() -> Self {
        Self::empty()
    }
}
