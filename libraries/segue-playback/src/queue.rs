//! Playback queue
//!
//! Ordered, duplicate-free list of items with a movable current position.
//! Played-through items stay in place until removed, so navigation is
//! index-based and non-destructive.

use crate::error::{PlaybackError, Result};
use crate::types::{Locator, MediaItem};

/// Ordered queue of media items
///
/// Structure:
/// ```text
///   [0] A   (consumed, retained)
///   [1] B   <- current
///   [2] C
///   [3] D
/// ```
///
/// Invariants: no two entries share a locator, and `current` (if set) always
/// indexes a valid entry.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    items: Vec<MediaItem>,
    current: Option<usize>,
}

/// Outcome of a structural removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Index the item occupied
    pub index: usize,

    /// Whether it was the current item
    pub was_current: bool,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item
    ///
    /// Rejected when the locator is already queued. The current item is
    /// always a queue member, so re-adding it is rejected by the same check.
    /// The first item enqueued into an empty queue becomes current.
    pub fn enqueue(&mut self, item: MediaItem) -> Result<()> {
        if self.contains(item.locator()) {
            return Err(PlaybackError::DuplicateEnqueue(item.locator().clone()));
        }

        self.items.push(item);
        if self.current.is_none() {
            self.current = Some(0);
        }
        Ok(())
    }

    /// Append items independently, in order
    ///
    /// Returns one result per input item.
    pub fn enqueue_each(&mut self, items: impl IntoIterator<Item = MediaItem>) -> Vec<Result<()>> {
        items.into_iter().map(|item| self.enqueue(item)).collect()
    }

    /// Append items independently, in order
    ///
    /// Returns whether every item was accepted. Accepted items stay queued
    /// even if others were rejected.
    pub fn enqueue_batch(&mut self, items: impl IntoIterator<Item = MediaItem>) -> bool {
        self.enqueue_each(items).iter().all(Result::is_ok)
    }

    /// Remove the entry with the given locator
    ///
    /// Pure structural removal. Removing an entry before the current one
    /// shifts the current index left. Removing the current entry keeps the
    /// index (now the following entry) or clears it if nothing follows.
    pub fn remove(&mut self, locator: &Locator) -> Option<Removal> {
        let index = self.position(locator)?;
        self.items.remove(index);

        let was_current = self.current == Some(index);
        self.current = match self.current {
            Some(current) if current > index => Some(current - 1),
            Some(current) if current == index => {
                if index < self.items.len() {
                    Some(index)
                } else {
                    None
                }
            }
            other => other,
        };

        Some(Removal { index, was_current })
    }

    /// Clear entire queue
    pub fn remove_all(&mut self) {
        self.items.clear();
        self.current = None;
    }

    /// Move to the next entry
    ///
    /// Returns the new current item, or `None` when the queue is exhausted.
    /// Nothing is removed and the current index is left alone on exhaustion.
    pub fn advance(&mut self) -> Option<&MediaItem> {
        let next = self.current? + 1;
        if next < self.items.len() {
            self.current = Some(next);
            self.items.get(next)
        } else {
            None
        }
    }

    /// Move back one entry (for "previous")
    pub fn retreat(&mut self) -> Option<&MediaItem> {
        let current = self.current?;
        if current == 0 {
            return None;
        }
        self.current = Some(current - 1);
        self.items.get(current - 1)
    }

    /// Reset current to the first entry
    pub fn rewind(&mut self) {
        self.current = if self.items.is_empty() { None } else { Some(0) };
    }

    /// Make an existing entry current
    ///
    /// Returns its index.
    pub fn select(&mut self, locator: &Locator) -> Option<usize> {
        let index = self.position(locator)?;
        self.current = Some(index);
        Some(index)
    }

    /// Drop every entry before the current one
    ///
    /// Returns the number of entries dropped.
    pub fn drop_consumed(&mut self) -> usize {
        let Some(current) = self.current else {
            return 0;
        };
        self.items.drain(..current);
        self.current = Some(0);
        current
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.items.get(self.current?)
    }

    pub fn current_mut(&mut self) -> Option<&mut MediaItem> {
        self.items.get_mut(self.current?)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn find_mut(&mut self, locator: &Locator) -> Option<&mut MediaItem> {
        self.items.iter_mut().find(|item| item.locator() == locator)
    }

    pub fn position(&self, locator: &Locator) -> Option<usize> {
        self.items.iter().position(|item| item.locator() == locator)
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.position(locator).is_some()
    }

    /// Whether an entry follows the current one
    pub fn has_next(&self) -> bool {
        self.current.is_some_and(|current| current + 1 < self.items.len())
    }

    /// All locators in queue order
    pub fn locators(&self) -> Vec<Locator> {
        self.items.iter().map(|item| item.locator().clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> MediaItem {
        MediaItem::new(locator(name))
    }

    fn locator(name: &str) -> Locator {
        Locator::parse(&format!("file:///music/{name}.mp3")).unwrap()
    }

    fn names(queue: &PlaybackQueue) -> Vec<String> {
        queue
            .iter()
            .map(|i| {
                i.locator()
                    .as_str()
                    .trim_start_matches("file:///music/")
                    .trim_end_matches(".mp3")
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn create_empty_queue() {
        let queue = PlaybackQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn first_enqueue_becomes_current() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue(item("a")).unwrap();
        queue.enqueue(item("b")).unwrap();

        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().unwrap().locator(), &locator("a"));
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue(item("a")).unwrap();

        let err = queue.enqueue(item("a")).unwrap_err();
        assert_eq!(err, PlaybackError::DuplicateEnqueue(locator("a")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn batch_reports_partial_success() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue(item("b")).unwrap();

        let all = queue.enqueue_batch(vec![item("a"), item("b"), item("c")]);
        assert!(!all);
        assert_eq!(names(&queue), vec!["b", "a", "c"]);
    }

    #[test]
    fn enqueue_each_returns_per_item_results() {
        let mut queue = PlaybackQueue::new();
        let results = queue.enqueue_each(vec![item("a"), item("a"), item("b")]);

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn advance_moves_without_removing() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b")]);

        assert_eq!(queue.advance().unwrap().locator(), &locator("b"));
        assert_eq!(queue.len(), 2);

        // Exhausted: index stays on the last item
        assert!(queue.advance().is_none());
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn remove_before_current_shifts_index() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b"), item("c")]);
        queue.advance();
        queue.advance();

        let removal = queue.remove(&locator("a")).unwrap();
        assert!(!removal.was_current);
        assert_eq!(queue.current().unwrap().locator(), &locator("c"));
    }

    #[test]
    fn remove_current_keeps_index_on_follower() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b"), item("c")]);
        queue.advance();

        let removal = queue.remove(&locator("b")).unwrap();
        assert!(removal.was_current);
        assert_eq!(queue.current().unwrap().locator(), &locator("c"));
    }

    #[test]
    fn remove_last_current_clears_index() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b")]);
        queue.advance();

        queue.remove(&locator("b")).unwrap();
        assert_eq!(queue.current_index(), None);
        assert_eq!(queue.len(), 1);

        queue.rewind();
        assert_eq!(queue.current().unwrap().locator(), &locator("a"));
    }

    #[test]
    fn remove_unknown_returns_none() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue(item("a")).unwrap();
        assert!(queue.remove(&locator("zzz")).is_none());
    }

    #[test]
    fn retreat_stops_at_head() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b")]);
        queue.advance();

        assert_eq!(queue.retreat().unwrap().locator(), &locator("a"));
        assert!(queue.retreat().is_none());
    }

    #[test]
    fn drop_consumed_keeps_current_and_followers() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b"), item("c")]);
        queue.advance();

        assert_eq!(queue.drop_consumed(), 1);
        assert_eq!(names(&queue), vec!["b", "c"]);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn select_moves_current() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b"), item("c")]);

        assert_eq!(queue.select(&locator("c")), Some(2));
        assert!(!queue.has_next());
        assert_eq!(queue.select(&locator("x")), None);
    }

    #[test]
    fn remove_all_clears() {
        let mut queue = PlaybackQueue::new();
        queue.enqueue_batch(vec![item("a"), item("b")]);
        queue.remove_all();

        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }
}
