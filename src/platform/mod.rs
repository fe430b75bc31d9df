//! Boundary between the gallery core and the host UI platform.
//!
//! Every listener the gallery installs comes back as a [`Subscription`] whose
//! drop unregisters it, so tearing down a gallery is just dropping its
//! [`SubscriptionSet`]. Events are delivered through a flume channel and
//! drained by the owner on its own thread.

pub mod headless;

use flume::Sender;

pub use headless::HeadlessPlatform;

/// Opaque handle the rendering layer uses to identify a card element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Resize,
    OrientationChange,
    Scroll,
    ReducedMotion,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub element: ElementId,
    pub is_intersecting: bool,
    pub ratio: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    Resize(Viewport),
    OrientationChange(Viewport),
    Scroll { scroll_top: f32 },
    AnimationFrame,
    ReducedMotionChanged(bool),
    Intersection(Vec<IntersectionEntry>),
}

pub type EventSink = Sender<PlatformEvent>;

/// Trigger settings for an intersection observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    /// Fraction of the element that must be on screen, in `[0, 1]`.
    pub threshold: f32,
    /// Pixels added above and below the viewport when testing intersection.
    pub root_margin_px: f32,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin_px: 50.0,
        }
    }
}

pub trait IntersectionObserver {
    fn observe(&mut self, element: ElementId);
    fn unobserve(&mut self, element: ElementId);
    /// Stop all observation. Further calls are no-ops.
    fn disconnect(&mut self);
}

/// Host UI services consumed by the gallery.
pub trait Platform {
    fn viewport(&self) -> Viewport;

    /// Current reduced-motion preference, `None` when the platform cannot report it.
    fn prefers_reduced_motion(&self) -> Option<bool>;

    /// Install a listener. `None` when the platform does not support the event kind.
    fn subscribe(&self, kind: EventKind, sink: EventSink) -> Option<Subscription>;

    /// Deliver one [`PlatformEvent::AnimationFrame`] to `sink` before the next paint.
    fn request_animation_frame(&self, sink: EventSink);

    /// `None` when intersection observation is unavailable.
    fn intersection_observer(
        &self,
        options: ObserverOptions,
        sink: EventSink,
    ) -> Option<Box<dyn IntersectionObserver>>;
}

/// A registered listener. Dropping it unregisters.
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new<F>(dispose: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

/// Subscriptions collected during mount and released together on teardown.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Dispose in reverse registration order.
    pub fn dispose_all(&mut self) {
        while let Some(subscription) = self.subscriptions.pop() {
            subscription.dispose();
        }
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscription_disposes_once_on_drop() {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        {
            let _sub = Subscription::new(move || *c.borrow_mut() += 1);
        }
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_set_disposes_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut set = SubscriptionSet::new();
        for i in 0..3 {
            let o = Rc::clone(&order);
            set.push(Subscription::new(move || o.borrow_mut().push(i)));
        }
        assert_eq!(set.len(), 3);
        drop(set);
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }
}
