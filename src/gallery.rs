//! A mounted gallery.
//!
//! [`Gallery`] owns everything one mount of the masonry gallery needs: the
//! resolved configuration, the column set, the animation scheduler, the
//! preloader and the platform listeners. Platform events arrive on a flume
//! channel and are applied by [`Gallery::pump`] on the owner's thread, with
//! the owner supplying the clock. Unmounting (or dropping) releases every
//! listener, the intersection observer and pending timers.

use std::time::Instant;

use flume::Receiver;
use tracing::{debug, info, trace};

use crate::animation::{AnimationScheduler, CardAnimation};
use crate::config::GalleryConfig;
use crate::layout::masonry::{self, BalanceStats, MasonryLayout};
use crate::layout::{Breakpoint, CachedLayoutComputer, LayoutConfig, ResponsiveConfig};
use crate::models::{Artwork, CardRect, ColumnModel};
use crate::perf::{self, PerformanceMonitor};
use crate::platform::{
    ElementId, EventKind, EventSink, Platform, PlatformEvent, SubscriptionSet, Viewport,
};
use crate::preload::{ImagePreloader, PreloadSink, PreloadStats};
use crate::timing::Debouncer;

const SUBSCRIBED_EVENTS: [EventKind; 4] = [
    EventKind::Resize,
    EventKind::OrientationChange,
    EventKind::Scroll,
    EventKind::ReducedMotion,
];

/// What changed during one [`Gallery::pump`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryUpdate {
    /// The configuration changed and the columns were rebuilt.
    pub relayout: bool,
    /// Card indices revealed by intersection, in delivery order.
    pub revealed: Vec<usize>,
}

pub struct Gallery<P: Platform, S: PreloadSink> {
    platform: P,
    sink: S,
    perf: PerformanceMonitor,
    responsive: ResponsiveConfig,
    computer: CachedLayoutComputer,
    artworks: Vec<Artwork>,
    viewport: Viewport,
    reduced_motion: bool,
    config: LayoutConfig,
    columns: Vec<ColumnModel>,
    scheduler: AnimationScheduler,
    preloader: ImagePreloader,
    resize: Debouncer,
    events_tx: EventSink,
    events_rx: Receiver<PlatformEvent>,
    subscriptions: SubscriptionSet,
    mounted: bool,
}

impl<P: Platform, S: PreloadSink> Gallery<P, S> {
    /// Mount a gallery on `platform`, issuing the critical preloads through `sink`.
    pub fn mount(
        platform: P,
        sink: S,
        artworks: Vec<Artwork>,
        settings: &GalleryConfig,
        perf: PerformanceMonitor,
        now: Instant,
    ) -> Self {
        let viewport = platform.viewport();
        let reduced_motion = platform.prefers_reduced_motion().unwrap_or_else(|| {
            debug!("Reduced-motion preference unavailable, assuming false");
            false
        });

        let responsive = settings.responsive();
        let config = perf.time(perf::RESOLVE, || {
            responsive.resolve(viewport.width, reduced_motion)
        });
        let computer = CachedLayoutComputer::new(MasonryLayout::new(settings.layout.strategy));
        let columns = perf.time(perf::LAYOUT, || computer.compute(&artworks, &config));

        let (events_tx, events_rx) = flume::unbounded();

        let immediate = !settings.animation.enabled
            || (reduced_motion && responsive.respect_reduced_motion);
        let scheduler = AnimationScheduler::new(
            &platform,
            events_tx.clone(),
            settings.observer_options(),
            config.animation_delay,
            immediate,
            artworks.len(),
        );

        let mut subscriptions = SubscriptionSet::new();
        for kind in SUBSCRIBED_EVENTS {
            match platform.subscribe(kind, events_tx.clone()) {
                Some(subscription) => subscriptions.push(subscription),
                None => debug!(?kind, "Platform does not support event, skipping"),
            }
        }

        let mut preloader =
            ImagePreloader::new(settings.preload.settings(), &artworks, config.column_count());
        preloader.mount(now, &sink);

        info!(
            items = artworks.len(),
            breakpoint = %config.breakpoint,
            columns = config.columns,
            immediate = scheduler.is_immediate(),
            "Gallery mounted"
        );

        Self {
            platform,
            sink,
            perf,
            responsive,
            computer,
            artworks,
            viewport,
            reduced_motion,
            config,
            columns,
            scheduler,
            preloader,
            resize: Debouncer::new(settings.layout.resize_debounce()),
            events_tx,
            events_rx,
            subscriptions,
            mounted: true,
        }
    }

    /// Rendering-layer callback, invoked once per card element after it is laid out.
    pub fn register_card(&mut self, element: ElementId, index: usize) {
        if self.mounted {
            self.scheduler.register_card(element, index);
        }
    }

    /// Apply queued platform events and advance timers to `now`.
    pub fn pump(&mut self, now: Instant) -> GalleryUpdate {
        let mut update = GalleryUpdate::default();
        if !self.mounted {
            return update;
        }

        let events: Vec<PlatformEvent> = self.events_rx.try_iter().collect();
        for event in events {
            match event {
                PlatformEvent::Resize(viewport) => {
                    self.viewport = viewport;
                    self.resize.trigger(now);
                }
                PlatformEvent::OrientationChange(viewport) => {
                    self.viewport = viewport;
                    self.resize.cancel();
                    update.relayout |= self.refresh_config();
                }
                PlatformEvent::Scroll { scroll_top } => {
                    if self.preloader.on_scroll(scroll_top) {
                        self.platform.request_animation_frame(self.events_tx.clone());
                    }
                }
                PlatformEvent::AnimationFrame => self.preloader.on_animation_frame(&self.sink),
                PlatformEvent::ReducedMotionChanged(reduced) => {
                    update.relayout |= self.set_reduced_motion(reduced);
                }
                PlatformEvent::Intersection(entries) => {
                    update.revealed.extend(self.scheduler.handle_entries(&entries));
                }
            }
        }

        if self.resize.poll(now) {
            update.relayout |= self.refresh_config();
        }
        self.preloader.tick(now, &self.sink);
        update
    }

    /// Replace the artwork list, keeping the current configuration.
    ///
    /// A list with different images gets its own critical preload at `now`.
    pub fn set_artworks(&mut self, artworks: Vec<Artwork>, now: Instant) {
        self.artworks = artworks;
        self.scheduler.set_card_count(self.artworks.len());
        self.relayout();
        if self.mounted && self.preloader.replace(&self.artworks, now, &self.sink) {
            debug!(items = self.artworks.len(), "Preloading replaced artwork list");
        }
    }

    /// Release listeners, the observer and pending timers. Idempotent.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.subscriptions.dispose_all();
        self.scheduler.dispose();
        self.preloader.dispose();
        self.resize.cancel();
        let _ = self.events_rx.drain();
        debug!("Gallery unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.config.breakpoint
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    pub fn artworks(&self) -> &[Artwork] {
        &self.artworks
    }

    /// Per-column render lists.
    pub fn columns(&self) -> &[ColumnModel] {
        &self.columns
    }

    pub fn card_animation(&self, index: usize) -> CardAnimation {
        self.scheduler.animation(index)
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    /// Card rectangles for a container `container_width` pixels wide, by artwork index.
    pub fn card_rects(&self, container_width: f32) -> Vec<CardRect> {
        masonry::card_rects(&self.columns, &self.config, container_width)
    }

    pub fn content_height(&self) -> f32 {
        masonry::content_height(&self.columns, self.config.gap)
    }

    pub fn balance(&self) -> BalanceStats {
        BalanceStats::of(&self.columns)
    }

    pub fn preload_stats(&self) -> PreloadStats {
        self.preloader.stats()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn perf(&self) -> &PerformanceMonitor {
        &self.perf
    }

    fn set_reduced_motion(&mut self, reduced: bool) -> bool {
        debug!(reduced, "Reduced-motion preference changed");
        self.reduced_motion = reduced;
        if reduced && self.responsive.respect_reduced_motion {
            self.scheduler.set_immediate(true);
        }
        self.refresh_config()
    }

    /// Re-resolve the configuration; rebuild the columns when it changed.
    fn refresh_config(&mut self) -> bool {
        let config = self.perf.time(perf::RESOLVE, || {
            self.responsive.resolve(self.viewport.width, self.reduced_motion)
        });
        if config == self.config {
            trace!(width = self.viewport.width, "Layout config unchanged");
            return false;
        }
        if config.breakpoint != self.config.breakpoint {
            debug!(from = %self.config.breakpoint, to = %config.breakpoint, "Breakpoint changed");
        }
        self.scheduler.set_stagger(config.animation_delay);
        self.config = config;
        self.relayout();
        true
    }

    fn relayout(&mut self) {
        let columns = self.perf.time(perf::LAYOUT, || {
            self.computer.compute(&self.artworks, &self.config)
        });
        self.columns = columns;
        self.preloader.set_columns(self.config.column_count());
        debug!(
            columns = self.columns.len(),
            items = self.artworks.len(),
            "Layout recomputed"
        );
    }
}

impl<P: Platform, S: PreloadSink> Drop for Gallery<P, S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardVariant;
    use crate::platform::HeadlessPlatform;
    use crate::preload::{PreloadRequest, PreloadStage};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        requests: RefCell<Vec<PreloadRequest>>,
    }

    impl PreloadSink for RecordingSink {
        fn submit(&self, request: PreloadRequest) -> bool {
            self.requests.borrow_mut().push(request);
            true
        }
    }

    impl RecordingSink {
        fn count(&self, stage: PreloadStage) -> usize {
            self.requests.borrow().iter().filter(|r| r.stage == stage).count()
        }
    }

    fn artworks(n: usize) -> Vec<Artwork> {
        (0..n)
            .map(|i| Artwork::new(format!("a{i}"), format!("Work {i}"), format!("/t/{i}.jpg")))
            .collect()
    }

    fn mount(
        platform: &HeadlessPlatform,
        n: usize,
        settings: &GalleryConfig,
        now: Instant,
    ) -> (Gallery<HeadlessPlatform, Rc<RecordingSink>>, Rc<RecordingSink>) {
        let sink = Rc::new(RecordingSink::default());
        let gallery = Gallery::mount(
            platform.clone(),
            Rc::clone(&sink),
            artworks(n),
            settings,
            PerformanceMonitor::new(),
            now,
        );
        (gallery, sink)
    }

    /// Place every card on the platform and register it, as a renderer would.
    fn render(gallery: &mut Gallery<HeadlessPlatform, Rc<RecordingSink>>, platform: &HeadlessPlatform) {
        let width = gallery.viewport().width as f32;
        for (index, rect) in gallery.card_rects(width).into_iter().enumerate() {
            let element = ElementId(index as u64);
            platform.set_element_rect(element, rect);
            gallery.register_card(element, index);
        }
    }

    #[test]
    fn test_mount_resolves_layout_and_subscribes() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let (gallery, sink) = mount(&platform, 12, &GalleryConfig::default(), Instant::now());

        assert_eq!(gallery.breakpoint(), Breakpoint::Desktop);
        assert_eq!(gallery.columns().len(), 3);
        assert_eq!(gallery.columns()[0].items[0].variant, CardVariant::Small);
        assert_eq!(gallery.subscription_count(), 4);
        assert_eq!(platform.listener_count(), 4);
        assert_eq!(platform.connected_observer_count(), 1);
        assert_eq!(sink.count(PreloadStage::Critical), 6);
        assert_eq!(gallery.perf().count(perf::LAYOUT), 1);
    }

    #[test]
    fn test_cards_reveal_on_scroll() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let now = Instant::now();
        let (mut gallery, _sink) = mount(&platform, 12, &GalleryConfig::default(), now);
        render(&mut gallery, &platform);

        let update = gallery.pump(now);
        assert!(update.revealed.contains(&0));
        assert!(gallery.card_animation(2).visible);
        assert_eq!(gallery.card_animation(2).delay, Duration::from_millis(200));
        assert!(!gallery.card_animation(11).visible);
        assert_eq!(gallery.card_animation(11).delay, Duration::ZERO);

        platform.scroll_to(1000.0);
        let update = gallery.pump(now);
        assert!(update.revealed.contains(&11));
        assert_eq!(gallery.card_animation(11).delay, Duration::from_millis(1100));
    }

    #[test]
    fn test_resize_is_debounced() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let start = Instant::now();
        let (mut gallery, _sink) = mount(&platform, 9, &GalleryConfig::default(), start);

        platform.resize(900, 800);
        platform.resize(700, 800);
        assert!(!gallery.pump(start).relayout);
        assert_eq!(gallery.columns().len(), 3);

        assert!(!gallery.pump(start + Duration::from_millis(149)).relayout);
        assert!(gallery.pump(start + Duration::from_millis(150)).relayout);
        assert_eq!(gallery.breakpoint(), Breakpoint::Mobile);
        assert_eq!(gallery.columns().len(), 1);
    }

    #[test]
    fn test_resize_within_bracket_keeps_columns() {
        let platform = HeadlessPlatform::new(Viewport::new(1100, 800));
        let start = Instant::now();
        let (mut gallery, _sink) = mount(&platform, 9, &GalleryConfig::default(), start);

        platform.resize(1150, 800);
        gallery.pump(start);
        assert!(!gallery.pump(start + Duration::from_secs(1)).relayout);

        platform.resize(1300, 800);
        gallery.pump(start + Duration::from_secs(1));
        assert!(gallery.pump(start + Duration::from_secs(2)).relayout);
        assert_eq!(gallery.columns().len(), 4);
    }

    #[test]
    fn test_orientation_change_relayouts_immediately() {
        let platform = HeadlessPlatform::new(Viewport::new(1024, 700));
        let now = Instant::now();
        let (mut gallery, _sink) = mount(&platform, 6, &GalleryConfig::default(), now);
        assert_eq!(gallery.breakpoint(), Breakpoint::Desktop);

        platform.rotate();
        assert!(gallery.pump(now).relayout);
        assert_eq!(gallery.breakpoint(), Breakpoint::Mobile);
    }

    #[test]
    fn test_scroll_preload_waits_for_frame() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let now = Instant::now();
        let (mut gallery, sink) = mount(&platform, 60, &GalleryConfig::default(), now);

        platform.scroll_to(2000.0);
        platform.scroll_to(4000.0);
        gallery.pump(now);
        assert_eq!(platform.pending_frame_requests(), 1);
        assert_eq!(sink.count(PreloadStage::Scroll), 0);

        assert_eq!(platform.advance_frame(), 1);
        gallery.pump(now);
        assert_eq!(sink.count(PreloadStage::NextBatch), 6);
        assert!(sink.count(PreloadStage::Scroll) > 0);

        let stages: Vec<_> = sink.requests.borrow().iter().map(|r| r.stage).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
    }

    #[test]
    fn test_reduced_motion_reveals_everything() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let now = Instant::now();
        let (mut gallery, _sink) = mount(&platform, 12, &GalleryConfig::default(), now);
        render(&mut gallery, &platform);
        gallery.pump(now);
        assert!(!gallery.card_animation(11).visible);

        platform.set_reduced_motion(true);
        assert!(gallery.pump(now).relayout);
        assert!(gallery.scheduler().is_immediate());
        assert_eq!(gallery.config().animation_delay, Duration::ZERO);
        assert_eq!(
            gallery.card_animation(11),
            CardAnimation {
                visible: true,
                delay: Duration::ZERO
            }
        );
        assert_eq!(platform.connected_observer_count(), 0);
    }

    #[test]
    fn test_reduced_motion_at_mount() {
        let platform = HeadlessPlatform::new(Viewport::new(400, 800));
        platform.set_reduced_motion(true);
        let (gallery, _sink) = mount(&platform, 5, &GalleryConfig::default(), Instant::now());

        assert!(gallery.reduced_motion());
        assert!(gallery.scheduler().is_immediate());
        assert_eq!(platform.connected_observer_count(), 0);
        assert!((0..5).all(|i| gallery.card_animation(i).visible));
    }

    #[test]
    fn test_ignored_reduced_motion_keeps_stagger() {
        let platform = HeadlessPlatform::new(Viewport::new(400, 800));
        platform.set_reduced_motion(true);
        let mut settings = GalleryConfig::default();
        settings.animation.respect_reduced_motion = false;
        let (gallery, _sink) = mount(&platform, 5, &settings, Instant::now());

        assert!(!gallery.scheduler().is_immediate());
        assert_eq!(gallery.config().animation_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_animation_disabled_keeps_delays() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let mut settings = GalleryConfig::default();
        settings.animation.enabled = false;
        let (gallery, _sink) = mount(&platform, 4, &settings, Instant::now());

        assert_eq!(platform.connected_observer_count(), 0);
        assert_eq!(gallery.card_animation(3).delay, Duration::from_millis(300));
    }

    #[test]
    fn test_missing_media_queries_and_observer() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800))
            .without_media_queries()
            .without_intersection_observer();
        let (gallery, _sink) = mount(&platform, 3, &GalleryConfig::default(), Instant::now());

        assert!(!gallery.reduced_motion());
        assert_eq!(gallery.subscription_count(), 3);
        assert!(gallery.scheduler().is_immediate());
        assert!(gallery.card_animation(2).visible);
    }

    #[test]
    fn test_set_artworks_relayouts() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let (mut gallery, _sink) = mount(&platform, 3, &GalleryConfig::default(), Instant::now());
        gallery.set_artworks(artworks(7), Instant::now());

        let placed: usize = gallery.columns().iter().map(ColumnModel::len).sum();
        assert_eq!(placed, 7);
        assert_eq!(gallery.columns()[0].len(), 3);
    }

    #[test]
    fn test_set_artworks_preloads_new_list() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let start = Instant::now();
        let (mut gallery, sink) = mount(&platform, 20, &GalleryConfig::default(), start);
        gallery.pump(start + Duration::from_secs(1));
        assert_eq!(sink.requests.borrow().len(), 12);

        let fresh: Vec<Artwork> = (0..20)
            .map(|i| Artwork::new(format!("n{i}"), "", format!("/new/{i}.jpg")))
            .collect();
        let swapped = start + Duration::from_secs(10);
        gallery.set_artworks(fresh, swapped);
        gallery.pump(swapped + Duration::from_secs(1));

        let fresh_requests: Vec<(usize, PreloadStage)> = sink
            .requests
            .borrow()
            .iter()
            .filter(|r| r.url.starts_with("/new/"))
            .map(|r| (r.index, r.stage))
            .collect();
        let critical: Vec<usize> = fresh_requests
            .iter()
            .filter(|(_, stage)| *stage == PreloadStage::Critical)
            .map(|(index, _)| *index)
            .collect();
        assert_eq!(critical, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(fresh_requests.len(), 12);
    }

    #[test]
    fn test_unmount_releases_everything() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        let start = Instant::now();
        let (mut gallery, sink) = mount(&platform, 20, &GalleryConfig::default(), start);
        render(&mut gallery, &platform);
        platform.resize(500, 800);

        gallery.unmount();
        assert!(!gallery.is_mounted());
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.connected_observer_count(), 0);

        let update = gallery.pump(start + Duration::from_secs(5));
        assert_eq!(update, GalleryUpdate::default());
        assert_eq!(gallery.breakpoint(), Breakpoint::Desktop);
        assert_eq!(sink.count(PreloadStage::NextBatch), 0);

        gallery.unmount();
    }

    #[test]
    fn test_drop_unmounts() {
        let platform = HeadlessPlatform::new(Viewport::new(1200, 800));
        {
            let (_gallery, _sink) = mount(&platform, 4, &GalleryConfig::default(), Instant::now());
            assert_eq!(platform.listener_count(), 4);
        }
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.connected_observer_count(), 0);
    }
}
