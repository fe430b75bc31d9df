//! In-process platform with no window system.
//!
//! Used by the CLI simulation and the tests. Geometry comes from card
//! rectangles the caller registers; scrolling re-evaluates every live
//! intersection observer against the viewport band.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::{
    ElementId, EventKind, EventSink, IntersectionEntry, IntersectionObserver, ObserverOptions,
    Platform, PlatformEvent, Subscription, Viewport,
};
use crate::models::CardRect;

struct Listener {
    id: u64,
    kind: EventKind,
    sink: EventSink,
}

struct ObserverState {
    options: ObserverOptions,
    sink: EventSink,
    /// Observed elements and whether each was last reported as intersecting.
    observed: HashMap<ElementId, bool>,
    connected: bool,
}

struct HeadlessState {
    viewport: Viewport,
    reduced_motion: Option<bool>,
    supports_observer: bool,
    scroll_top: f32,
    next_listener_id: u64,
    listeners: Vec<Listener>,
    frame_requests: Vec<EventSink>,
    observers: Vec<Rc<RefCell<ObserverState>>>,
    rects: HashMap<ElementId, CardRect>,
}

/// Cloneable handle to a shared headless platform.
#[derive(Clone)]
pub struct HeadlessPlatform {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessPlatform {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                viewport,
                reduced_motion: Some(false),
                supports_observer: true,
                scroll_top: 0.0,
                next_listener_id: 0,
                listeners: Vec::new(),
                frame_requests: Vec::new(),
                observers: Vec::new(),
                rects: HashMap::new(),
            })),
        }
    }

    /// Simulate a platform without intersection observation.
    pub fn without_intersection_observer(self) -> Self {
        self.state.borrow_mut().supports_observer = false;
        self
    }

    /// Simulate a platform whose media queries cannot report reduced motion.
    pub fn without_media_queries(self) -> Self {
        self.state.borrow_mut().reduced_motion = None;
        self
    }

    pub fn set_element_rect(&self, element: ElementId, rect: CardRect) {
        self.state.borrow_mut().rects.insert(element, rect);
    }

    pub fn resize(&self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        self.state.borrow_mut().viewport = viewport;
        self.emit(EventKind::Resize, PlatformEvent::Resize(viewport));
        self.evaluate_observers();
    }

    pub fn rotate(&self) {
        let viewport = {
            let mut state = self.state.borrow_mut();
            state.viewport = Viewport::new(state.viewport.height, state.viewport.width);
            state.viewport
        };
        self.emit(
            EventKind::OrientationChange,
            PlatformEvent::OrientationChange(viewport),
        );
        self.evaluate_observers();
    }

    pub fn scroll_to(&self, scroll_top: f32) {
        let scroll_top = scroll_top.max(0.0);
        self.state.borrow_mut().scroll_top = scroll_top;
        self.emit(EventKind::Scroll, PlatformEvent::Scroll { scroll_top });
        self.evaluate_observers();
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        let supported = {
            let mut state = self.state.borrow_mut();
            if state.reduced_motion.is_none() {
                false
            } else {
                state.reduced_motion = Some(reduced);
                true
            }
        };
        if supported {
            self.emit(
                EventKind::ReducedMotion,
                PlatformEvent::ReducedMotionChanged(reduced),
            );
        }
    }

    /// Run one animation frame, answering every pending frame request.
    pub fn advance_frame(&self) -> usize {
        let requests = std::mem::take(&mut self.state.borrow_mut().frame_requests);
        let count = requests.len();
        for sink in requests {
            let _ = sink.send(PlatformEvent::AnimationFrame);
        }
        count
    }

    pub fn scroll_top(&self) -> f32 {
        self.state.borrow().scroll_top
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn pending_frame_requests(&self) -> usize {
        self.state.borrow().frame_requests.len()
    }

    pub fn connected_observer_count(&self) -> usize {
        self.state
            .borrow()
            .observers
            .iter()
            .filter(|o| o.borrow().connected)
            .count()
    }

    pub fn observed_element_count(&self) -> usize {
        self.state
            .borrow()
            .observers
            .iter()
            .map(|o| o.borrow().observed.len())
            .sum()
    }

    fn emit(&self, kind: EventKind, event: PlatformEvent) {
        let sinks: Vec<EventSink> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.sink.clone())
            .collect();
        for sink in sinks {
            let _ = sink.send(event.clone());
        }
    }

    fn evaluate_observers(&self) {
        let observers = self.state.borrow().observers.clone();
        for observer in observers {
            let entries = {
                let state = self.state.borrow();
                let mut obs = observer.borrow_mut();
                if !obs.connected {
                    continue;
                }
                let options = obs.options;
                let mut entries = Vec::new();
                for (element, last) in obs.observed.iter_mut() {
                    let entry = intersect(&state, *element, options);
                    if entry.is_intersecting != *last {
                        *last = entry.is_intersecting;
                        entries.push(entry);
                    }
                }
                entries
            };
            if !entries.is_empty() {
                let sink = observer.borrow().sink.clone();
                let _ = sink.send(PlatformEvent::Intersection(entries));
            }
        }
    }
}

fn intersect(state: &HeadlessState, element: ElementId, options: ObserverOptions) -> IntersectionEntry {
    let Some(rect) = state.rects.get(&element) else {
        return IntersectionEntry {
            element,
            is_intersecting: false,
            ratio: 0.0,
        };
    };
    let top = state.scroll_top - options.root_margin_px;
    let bottom = state.scroll_top + state.viewport.height as f32 + options.root_margin_px;
    let ratio = rect.visible_fraction(top, bottom);
    IntersectionEntry {
        element,
        is_intersecting: ratio > 0.0 && ratio >= options.threshold,
        ratio,
    }
}

impl Platform for HeadlessPlatform {
    fn viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    fn prefers_reduced_motion(&self) -> Option<bool> {
        self.state.borrow().reduced_motion
    }

    fn subscribe(&self, kind: EventKind, sink: EventSink) -> Option<Subscription> {
        let mut state = self.state.borrow_mut();
        if kind == EventKind::ReducedMotion && state.reduced_motion.is_none() {
            return None;
        }
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push(Listener { id, kind, sink });
        trace!(id, ?kind, "Listener added");

        let weak: Weak<RefCell<HeadlessState>> = Rc::downgrade(&self.state);
        Some(Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().listeners.retain(|l| l.id != id);
                trace!(id, "Listener removed");
            }
        }))
    }

    fn request_animation_frame(&self, sink: EventSink) {
        self.state.borrow_mut().frame_requests.push(sink);
    }

    fn intersection_observer(
        &self,
        options: ObserverOptions,
        sink: EventSink,
    ) -> Option<Box<dyn IntersectionObserver>> {
        let mut state = self.state.borrow_mut();
        if !state.supports_observer {
            return None;
        }
        let observer = Rc::new(RefCell::new(ObserverState {
            options,
            sink,
            observed: HashMap::new(),
            connected: true,
        }));
        state.observers.push(Rc::clone(&observer));
        Some(Box::new(HeadlessObserver {
            platform: Rc::downgrade(&self.state),
            observer,
        }))
    }
}

struct HeadlessObserver {
    platform: Weak<RefCell<HeadlessState>>,
    observer: Rc<RefCell<ObserverState>>,
}

impl IntersectionObserver for HeadlessObserver {
    fn observe(&mut self, element: ElementId) {
        let Some(platform) = self.platform.upgrade() else {
            return;
        };
        let mut obs = self.observer.borrow_mut();
        if !obs.connected || obs.observed.contains_key(&element) {
            return;
        }
        // Observers report the initial state of every newly observed element.
        let entry = intersect(&platform.borrow(), element, obs.options);
        obs.observed.insert(element, entry.is_intersecting);
        let _ = obs.sink.send(PlatformEvent::Intersection(vec![entry]));
    }

    fn unobserve(&mut self, element: ElementId) {
        self.observer.borrow_mut().observed.remove(&element);
    }

    fn disconnect(&mut self) {
        let mut obs = self.observer.borrow_mut();
        obs.connected = false;
        obs.observed.clear();
    }
}

impl Drop for HeadlessObserver {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(platform) = self.platform.upgrade() {
            platform
                .borrow_mut()
                .observers
                .retain(|o| !Rc::ptr_eq(o, &self.observer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(y: f32, height: f32) -> CardRect {
        CardRect {
            x: 0.0,
            y,
            width: 100.0,
            height,
        }
    }

    #[test]
    fn test_subscription_drop_removes_listener() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let (tx, rx) = flume::unbounded();
        let sub = platform.subscribe(EventKind::Resize, tx).unwrap();
        assert_eq!(platform.listener_count(), 1);

        platform.resize(900, 800);
        assert!(matches!(rx.try_recv(), Ok(PlatformEvent::Resize(v)) if v.width == 900));

        drop(sub);
        assert_eq!(platform.listener_count(), 0);
        platform.resize(700, 800);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_observer_reports_initial_and_changes() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        platform.set_element_rect(ElementId(1), rect(0.0, 300.0));
        platform.set_element_rect(ElementId(2), rect(2000.0, 300.0));

        let (tx, rx) = flume::unbounded();
        let mut observer = platform
            .intersection_observer(ObserverOptions::default(), tx)
            .unwrap();
        observer.observe(ElementId(1));
        observer.observe(ElementId(2));

        let initial: Vec<_> = rx.try_iter().collect();
        assert_eq!(initial.len(), 2);

        platform.scroll_to(1500.0);
        let events: Vec<_> = rx.try_iter().collect();
        let PlatformEvent::Intersection(entries) = &events[0] else {
            panic!("expected intersection event");
        };
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.element == ElementId(2) && e.is_intersecting));
        assert!(entries.iter().any(|e| e.element == ElementId(1) && !e.is_intersecting));
    }

    #[test]
    fn test_dropping_observer_disconnects() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let (tx, _rx) = flume::unbounded();
        let observer = platform.intersection_observer(ObserverOptions::default(), tx);
        assert_eq!(platform.connected_observer_count(), 1);
        drop(observer);
        assert_eq!(platform.connected_observer_count(), 0);
    }

    #[test]
    fn test_unsupported_features() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800))
            .without_intersection_observer()
            .without_media_queries();
        let (tx, _rx) = flume::unbounded();
        assert!(platform
            .intersection_observer(ObserverOptions::default(), tx.clone())
            .is_none());
        assert!(platform.subscribe(EventKind::ReducedMotion, tx).is_none());
        assert_eq!(platform.prefers_reduced_motion(), None);
    }

    #[test]
    fn test_animation_frame_is_one_shot() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let (tx, rx) = flume::unbounded();
        platform.request_animation_frame(tx);
        assert_eq!(platform.advance_frame(), 1);
        assert_eq!(platform.advance_frame(), 0);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
