//! Staggered reveal scheduling for gallery cards.
//!
//! Per-card state machine:
//!
//! ```text
//! Unobserved ──register──▶ Observed ──intersects──▶ Visible
//! ```
//!
//! `Visible` is terminal: the element is released from the observer as soon
//! as it is reached. In immediate mode (animations disabled, reduced motion,
//! or no observer on the platform) every card is visible from mount.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tracing::{debug, trace};

use crate::platform::{
    ElementId, EventSink, IntersectionEntry, IntersectionObserver, ObserverOptions, Platform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Unobserved,
    Observed,
    Visible,
}

/// What the rendering layer needs to animate one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardAnimation {
    pub visible: bool,
    pub delay: Duration,
}

pub struct AnimationScheduler {
    stagger: Duration,
    immediate: bool,
    observer: Option<Box<dyn IntersectionObserver>>,
    /// Observed, not yet visible.
    observed: HashMap<ElementId, usize>,
    /// Grows monotonically until the scheduler is dropped.
    visible: BTreeSet<usize>,
    card_count: usize,
}

impl AnimationScheduler {
    /// Create the scheduler for a freshly mounted gallery of `card_count` cards.
    ///
    /// When `immediate` is false an intersection observer is requested from
    /// the platform; if the platform has none, the scheduler degrades to
    /// immediate mode.
    pub fn new(
        platform: &dyn Platform,
        sink: EventSink,
        options: ObserverOptions,
        stagger: Duration,
        immediate: bool,
        card_count: usize,
    ) -> Self {
        let observer = if immediate {
            None
        } else {
            let observer = platform.intersection_observer(options, sink);
            if observer.is_none() {
                debug!("Intersection observer unavailable, revealing all cards");
            }
            observer
        };
        let immediate = immediate || observer.is_none();

        let mut scheduler = Self {
            stagger,
            immediate,
            observer,
            observed: HashMap::new(),
            visible: BTreeSet::new(),
            card_count,
        };
        if immediate {
            scheduler.reveal_all();
        }
        scheduler
    }

    /// Called by the rendering layer once per card element on mount.
    pub fn register_card(&mut self, element: ElementId, index: usize) {
        self.card_count = self.card_count.max(index.saturating_add(1));
        if self.immediate {
            self.visible.insert(index);
            return;
        }
        if self.visible.contains(&index) {
            return;
        }
        if let Some(observer) = self.observer.as_mut() {
            if self.observed.insert(element, index).is_none() {
                observer.observe(element);
                trace!(?element, index, "Observing card");
            }
        }
    }

    /// Apply observer callbacks. Returns the indices that became visible.
    pub fn handle_entries(&mut self, entries: &[IntersectionEntry]) -> Vec<usize> {
        let mut revealed = Vec::new();
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            let Some(index) = self.observed.remove(&entry.element) else {
                continue;
            };
            if let Some(observer) = self.observer.as_mut() {
                observer.unobserve(entry.element);
            }
            if self.visible.insert(index) {
                revealed.push(index);
            }
        }
        if !revealed.is_empty() {
            trace!(count = revealed.len(), "Cards revealed");
        }
        revealed
    }

    /// Switch to immediate mode at runtime, e.g. when reduced motion turns on.
    ///
    /// Leaving immediate mode never hides cards that were already revealed.
    pub fn set_immediate(&mut self, immediate: bool) {
        if immediate && !self.immediate {
            self.immediate = true;
            self.release_observer();
            self.reveal_all();
        }
    }

    pub fn set_stagger(&mut self, stagger: Duration) {
        self.stagger = stagger;
    }

    /// Track a new card count after the artwork list changes.
    pub fn set_card_count(&mut self, card_count: usize) {
        self.card_count = card_count;
        if self.immediate {
            self.reveal_all();
        }
    }

    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.visible.contains(&index)
    }

    /// `index × stagger` once the card is visible, zero before.
    pub fn delay(&self, index: usize) -> Duration {
        if self.is_visible(index) {
            let factor = u32::try_from(index).unwrap_or(u32::MAX);
            self.stagger.saturating_mul(factor)
        } else {
            Duration::ZERO
        }
    }

    pub fn animation(&self, index: usize) -> CardAnimation {
        CardAnimation {
            visible: self.is_visible(index),
            delay: self.delay(index),
        }
    }

    pub fn phase(&self, index: usize) -> CardPhase {
        if self.visible.contains(&index) {
            CardPhase::Visible
        } else if self.observed.values().any(|i| *i == index) {
            CardPhase::Observed
        } else {
            CardPhase::Unobserved
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Disconnect the observer and forget element handles. Visibility state is kept.
    pub fn dispose(&mut self) {
        self.release_observer();
    }

    fn release_observer(&mut self) {
        if let Some(mut observer) = self.observer.take() {
            observer.disconnect();
            debug!(pending = self.observed.len(), "Intersection observer disconnected");
        }
        self.observed.clear();
    }

    fn reveal_all(&mut self) {
        self.visible.extend(0..self.card_count);
    }
}

impl Drop for AnimationScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}
