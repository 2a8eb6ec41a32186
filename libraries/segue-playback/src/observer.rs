//! Item readiness observation
//!
//! Filters raw engine signals down to the events the state machine may act
//! on. Only the live observation is honoured; anything tagged with an older
//! observation id is stale and dropped.

use crate::engine::{ItemSignal, ObservationId};
use crate::types::{Locator, MediaItem};
use std::time::Duration;
use tracing::debug;

/// Event surfaced for the observed item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    BecameReady(Option<Duration>),
    Failed(String),
    ReachedEnd,
}

impl ItemEvent {
    /// `Failed` and `ReachedEnd` end the playback attempt
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemEvent::BecameReady(_))
    }
}

#[derive(Debug, Clone)]
struct Observation {
    id: ObservationId,
    locator: Locator,
    ready_seen: bool,
}

/// Watches the engine's current target
///
/// Guarantees per playback attempt: `BecameReady` at most once and never
/// after a terminal event; at most one terminal event, after which the
/// observation is detached.
#[derive(Debug, Default)]
pub struct ItemReadinessObserver {
    next_id: u64,
    live: Option<Observation>,
}

impl ItemReadinessObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing a new playback attempt of `locator`
    ///
    /// Any previous observation is superseded.
    pub fn attach(&mut self, locator: Locator) -> ObservationId {
        self.next_id += 1;
        let id = ObservationId(self.next_id);
        self.live = Some(Observation {
            id,
            locator,
            ready_seen: false,
        });
        id
    }

    /// Stop observing; later events for the old attempt are dropped
    pub fn detach(&mut self) {
        self.live = None;
    }

    /// Locator under observation
    pub fn observed(&self) -> Option<&Locator> {
        self.live.as_ref().map(|o| &o.locator)
    }

    pub fn is_attached(&self) -> bool {
        self.live.is_some()
    }

    /// Filter an engine signal
    ///
    /// Returns the locator and event to apply, or `None` if the signal is
    /// stale or would break the at-most-once guarantees.
    pub fn accept(
        &mut self,
        observation: ObservationId,
        signal: ItemSignal,
    ) -> Option<(Locator, ItemEvent)> {
        let live = match self.live.as_mut() {
            Some(live) if live.id == observation => live,
            _ => {
                debug!(%observation, ?signal, "Dropping signal for superseded item");
                return None;
            }
        };

        let event = match signal {
            ItemSignal::Ready { duration } => {
                if live.ready_seen {
                    debug!(%observation, "Dropping repeated ready signal");
                    return None;
                }
                live.ready_seen = true;
                ItemEvent::BecameReady(duration)
            }
            ItemSignal::Failed { reason } => ItemEvent::Failed(reason),
            ItemSignal::ReachedEnd => ItemEvent::ReachedEnd,
        };

        let locator = live.locator.clone();
        if event.is_terminal() {
            self.live = None;
        }
        Some((locator, event))
    }

    /// Mark an item as loading when it becomes the engine's target
    pub fn mark_loading(item: &mut MediaItem) {
        item.set_loading();
    }

    /// Record an accepted event on the item
    pub fn apply(event: &ItemEvent, item: &mut MediaItem) {
        match event {
            ItemEvent::BecameReady(duration) => item.set_ready(*duration),
            ItemEvent::Failed(reason) => item.set_failed(reason.clone()),
            ItemEvent::ReachedEnd => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadinessStatus;

    fn locator(name: &str) -> Locator {
        Locator::parse(&format!("https://cdn.example.com/{name}.m4a")).unwrap()
    }

    fn ready(secs: u64) -> ItemSignal {
        ItemSignal::Ready {
            duration: Some(Duration::from_secs(secs)),
        }
    }

    #[test]
    fn accepts_live_observation() {
        let mut observer = ItemReadinessObserver::new();
        let id = observer.attach(locator("a"));

        let (loc, event) = observer.accept(id, ready(30)).unwrap();
        assert_eq!(loc, locator("a"));
        assert_eq!(event, ItemEvent::BecameReady(Some(Duration::from_secs(30))));
        assert!(observer.is_attached());
    }

    #[test]
    fn drops_superseded_observation() {
        let mut observer = ItemReadinessObserver::new();
        let old = observer.attach(locator("a"));
        let new = observer.attach(locator("b"));
        assert_ne!(old, new);

        assert!(observer.accept(old, ItemSignal::ReachedEnd).is_none());
        assert_eq!(observer.observed(), Some(&locator("b")));
    }

    #[test]
    fn ready_fires_at_most_once() {
        let mut observer = ItemReadinessObserver::new();
        let id = observer.attach(locator("a"));

        assert!(observer.accept(id, ready(30)).is_some());
        assert!(observer.accept(id, ready(31)).is_none());
    }

    #[test]
    fn terminal_event_detaches() {
        let mut observer = ItemReadinessObserver::new();
        let id = observer.attach(locator("a"));

        let (_, event) = observer
            .accept(
                id,
                ItemSignal::Failed {
                    reason: "404".to_string(),
                },
            )
            .unwrap();
        assert!(event.is_terminal());
        assert!(!observer.is_attached());

        // No second terminal event, no late ready
        assert!(observer.accept(id, ItemSignal::ReachedEnd).is_none());
        assert!(observer.accept(id, ready(30)).is_none());
    }

    #[test]
    fn detach_drops_everything() {
        let mut observer = ItemReadinessObserver::new();
        let id = observer.attach(locator("a"));
        observer.detach();

        assert!(observer.accept(id, ready(1)).is_none());
    }

    #[test]
    fn apply_updates_item() {
        let mut item = MediaItem::new(locator("a"));
        ItemReadinessObserver::mark_loading(&mut item);
        assert_eq!(item.readiness(), ReadinessStatus::Loading);

        ItemReadinessObserver::apply(
            &ItemEvent::BecameReady(Some(Duration::from_secs(5))),
            &mut item,
        );
        assert_eq!(item.duration(), Some(Duration::from_secs(5)));

        ItemReadinessObserver::apply(&ItemEvent::Failed("gone".to_string()), &mut item);
        assert_eq!(item.readiness(), ReadinessStatus::Failed);
    }
}
