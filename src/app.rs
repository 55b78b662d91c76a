use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assets::AssetCache;
use crate::catalog::{CatalogError, CategoryId};
use crate::gesture::{Gesture, GestureClassifier, GestureConfig, HandUpdate};
use crate::renderer::{OverlayConfig, OverlayRenderer, Surface};
use crate::scheduler::{FrameOffer, FrameScheduler};
use crate::selection::SelectionState;
use crate::source::Detection;
use crate::types::{Frame, SharedFrame, SourceKind};

/// Signals for the UI layer (status dot, flash, menus).
#[derive(Debug, Clone, PartialEq)]
pub enum UiSignal {
    HandPresence(bool),
    GestureFlash(Gesture),
    TryAll(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryOnSettings {
    pub gesture: GestureConfig,
    pub overlay: OverlayConfig,
    pub try_all_interval: Duration,
    pub flash: Duration,
}

impl Default for TryOnSettings {
    fn default() -> Self {
        Self {
            gesture: GestureConfig::default(),
            overlay: OverlayConfig::default(),
            try_all_interval: Duration::from_millis(1500),
            flash: Duration::from_millis(250),
        }
    }
}

/// Indicator state derived from signals, read by the HUD every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Status {
    pub hand_present: bool,
    pub flash_until: Option<Instant>,
    pub face_renders: u64,
}

impl Status {
    pub fn is_flashing(&self, now: Instant) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }
}

/// Owns every component and routes results between them on one thread.
///
/// Detection runs on the sources' worker threads; everything that touches
/// selection state or the surface happens inside `on_frame`/`pump`.
pub struct TryOnApp<S: Surface> {
    scheduler: FrameScheduler,
    classifier: GestureClassifier,
    renderer: OverlayRenderer,
    selection: SelectionState,
    cache: AssetCache,
    surface: S,
    settings: TryOnSettings,
    latest_frame: Option<SharedFrame>,
    last_try_all_step: Option<Instant>,
    status: Status,
    signals: Vec<UiSignal>,
}

impl<S: Surface> TryOnApp<S> {
    pub fn new(scheduler: FrameScheduler, cache: AssetCache, surface: S, settings: TryOnSettings) -> Self {
        Self {
            scheduler,
            classifier: GestureClassifier::new(settings.gesture.clone()),
            renderer: OverlayRenderer::new(settings.overlay.clone()),
            selection: SelectionState::new(),
            cache,
            surface,
            settings,
            latest_frame: None,
            last_try_all_step: None,
            status: Status::default(),
            signals: Vec::new(),
        }
    }

    /// Camera callback: remember the frame and offer it to idle detectors.
    pub fn on_frame(&mut self, frame: Frame, now: Instant) -> FrameOffer {
        let frame = Arc::new(frame);
        self.latest_frame = Some(frame.clone());
        self.step_try_all(now);
        self.scheduler.on_frame(&frame)
    }

    /// Handle every result that has arrived. Returns how many were handled.
    pub fn pump(&mut self, now: Instant) -> usize {
        let detections = self.scheduler.poll();
        let n = detections.len();
        for det in detections {
            self.handle_detection(det, now);
        }
        n
    }

    /// Wait for in-flight detections, then handle them.
    pub fn settle(&mut self, timeout: Duration, now: Instant) -> usize {
        let detections = self.scheduler.settle(timeout);
        let n = detections.len();
        for det in detections {
            self.handle_detection(det, now);
        }
        n
    }

    pub fn handle_detection(&mut self, det: Detection, now: Instant) {
        match det.kind {
            SourceKind::Face => self.on_face(det),
            SourceKind::Hand => {
                let palm_allowed = self.selection.active_category().is_some();
                let update = self.classifier.update(det.landmarks.as_ref(), now, palm_allowed);
                self.on_hand(update, now);
            }
        }
    }

    fn on_face(&mut self, det: Detection) {
        let Some(frame) = self.latest_frame.clone() else {
            return;
        };
        if self.selection.refresh() {
            debug!("Selection promoted a decoded item");
        }
        self.renderer
            .render(&mut self.surface, &frame, det.landmarks.as_ref(), &self.selection);
        self.status.face_renders += 1;
    }

    fn on_hand(&mut self, update: HandUpdate, now: Instant) {
        if update.presence_changed {
            self.status.hand_present = update.present;
            self.signals.push(UiSignal::HandPresence(update.present));
        }

        let Some(gesture) = update.gesture else {
            return;
        };
        match gesture {
            Gesture::Navigate(dir) => {
                self.selection.navigate(&self.cache, dir);
            }
            Gesture::OpenPalm => {
                let on = self.selection.toggle_try_all();
                self.last_try_all_step = Some(now);
                self.signals.push(UiSignal::TryAll(on));
            }
        }
        self.status.flash_until = Some(now + self.settings.flash);
        self.signals.push(UiSignal::GestureFlash(gesture));
    }

    fn step_try_all(&mut self, now: Instant) {
        if !self.selection.try_all() {
            return;
        }
        let due = self
            .last_try_all_step
            .map_or(true, |last| now.saturating_duration_since(last) >= self.settings.try_all_interval);
        if due {
            self.selection.navigate(&self.cache, 1);
            self.last_try_all_step = Some(now);
        }
    }

    pub fn select_category(&mut self, id: &str) -> Result<CategoryId, CatalogError> {
        self.selection.select_category(&mut self.cache, id)
    }

    /// Select by catalog position (keyboard binding).
    pub fn select_category_at(&mut self, n: usize) -> Option<CategoryId> {
        let id = self.cache.catalog().nth(n)?;
        self.selection.select_category_id(&mut self.cache, id);
        Some(id)
    }

    pub fn pick_item(&mut self, id: &str, index: usize) -> Result<bool, CatalogError> {
        self.selection.pick_item(&self.cache, id, index)
    }

    /// Pick from the active category, if any.
    pub fn pick_active_item(&mut self, index: usize) -> bool {
        match self.selection.active_category() {
            Some(id) => self.selection.pick_item_id(&self.cache, id, index),
            None => false,
        }
    }

    pub fn navigate(&mut self, dir: i32) -> Option<usize> {
        self.selection.navigate(&self.cache, dir)
    }

    pub fn toggle_try_all(&mut self, now: Instant) -> bool {
        let on = self.selection.toggle_try_all();
        self.last_try_all_step = Some(now);
        self.signals.push(UiSignal::TryAll(on));
        on
    }

    pub fn drain_signals(&mut self) -> Vec<UiSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn log_summary(&self) {
        let stats = self.scheduler.stats();
        info!(
            "{} frames, {} face renders, dropped face {} / hand {}",
            stats.frames, self.status.face_renders, stats.face_dropped, stats.hand_dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::ManualLoader;
    use crate::catalog::{default_entries, Catalog};
    use crate::gesture::tests::{open_palm, pointing_hand};
    use crate::renderer::tests::{face, RecordingSurface};
    use crate::source::tests::gated;
    use crate::types::Landmarks;
    use image::RgbaImage;
    use std::sync::mpsc::Sender;

    const WAIT: Duration = Duration::from_secs(5);

    struct Rig {
        app: TryOnApp<RecordingSurface>,
        face: Sender<Option<Landmarks>>,
        hand: Sender<Option<Landmarks>>,
    }

    fn rig(settings: TryOnSettings) -> Rig {
        let (face_src, face) = gated(SourceKind::Face);
        let (hand_src, hand) = gated(SourceKind::Hand);
        let catalog = Arc::new(Catalog::new(&default_entries()).unwrap());
        let cache = AssetCache::new(catalog, "assets", Box::new(ManualLoader::default()));
        let app = TryOnApp::new(
            FrameScheduler::new(face_src, hand_src),
            cache,
            RecordingSurface::default(),
            settings,
        );
        Rig { app, face, hand }
    }

    impl Rig {
        /// One camera frame where both detectors answer.
        fn tick(&mut self, now: Instant, face: Option<Landmarks>, hand: Option<Landmarks>) {
            let offer = self.app.on_frame(Frame::new(100, 100), now);
            if offer.face_submitted {
                self.face.send(face).unwrap();
            }
            if offer.hand_submitted {
                self.hand.send(hand).unwrap();
            }
            self.app.settle(WAIT, now);
        }
    }

    #[test]
    fn test_gesture_navigates_and_flashes() {
        let mut rig = rig(TryOnSettings::default());
        rig.app.select_category("gold_earrings").unwrap();
        let t0 = Instant::now();

        rig.tick(t0, None, Some(pointing_hand(0.3)));
        assert_eq!(rig.app.selection().current_index(rig.app.cache()), Some(0));
        assert!(rig.app.status().hand_present);
        assert!(rig.app.status().is_flashing(t0));
        assert!(!rig.app.status().is_flashing(t0 + Duration::from_millis(300)));
        assert_eq!(
            rig.app.drain_signals(),
            vec![UiSignal::HandPresence(true), UiSignal::GestureFlash(Gesture::Navigate(1))]
        );

        // Inside the cooldown: ignored.
        rig.tick(t0 + Duration::from_millis(100), None, Some(pointing_hand(0.3)));
        assert_eq!(rig.app.selection().current_index(rig.app.cache()), Some(0));

        rig.tick(t0 + Duration::from_millis(700), None, None);
        assert_eq!(rig.app.drain_signals(), vec![UiSignal::HandPresence(false)]);
    }

    #[test]
    fn test_face_result_renders_selected_items() {
        let mut rig = rig(TryOnSettings::default());
        let id = rig.app.select_category("gold_necklaces").unwrap();
        assert!(rig.app.pick_item("gold_necklaces", 1).unwrap());
        let t0 = Instant::now();

        rig.tick(t0, Some(face()), None);
        assert!(rig.app.surface().image_rects().is_empty(), "not decoded yet");

        rig.app.cache().item(id, 1).unwrap().complete(RgbaImage::new(60, 20));
        rig.tick(t0, Some(face()), None);
        let rects = rig.app.surface().image_rects();
        assert_eq!(rects.len(), 1);
        // Ears 20px apart on a 100px frame.
        assert!((rects[0].width - 24.0).abs() < 1e-3);
        assert_eq!(rig.app.status().face_renders, 2);
    }

    #[test]
    fn test_open_palm_toggles_try_all() {
        let settings = TryOnSettings {
            gesture: GestureConfig { palm_enabled: true, ..GestureConfig::default() },
            ..TryOnSettings::default()
        };
        let mut rig = rig(settings);
        let t0 = Instant::now();

        // No category: palm vetoed.
        rig.tick(t0, None, Some(open_palm()));
        assert!(!rig.app.selection().try_all());

        rig.app.select_category("diamond_earrings").unwrap();
        rig.tick(t0, None, Some(open_palm()));
        assert!(rig.app.selection().try_all());
        assert!(rig.app.drain_signals().contains(&UiSignal::TryAll(true)));

        // Auto-advance once per interval.
        rig.tick(t0 + Duration::from_millis(1000), None, None);
        assert_eq!(rig.app.selection().current_index(rig.app.cache()), None);
        rig.tick(t0 + Duration::from_millis(1500), None, None);
        assert_eq!(rig.app.selection().current_index(rig.app.cache()), Some(0));
        rig.tick(t0 + Duration::from_millis(3000), None, None);
        assert_eq!(rig.app.selection().current_index(rig.app.cache()), Some(1));
    }

    #[test]
    fn test_keyboard_helpers() {
        let mut rig = rig(TryOnSettings::default());
        assert!(!rig.app.pick_active_item(0));
        assert!(rig.app.select_category_at(9).is_none());

        let id = rig.app.select_category_at(3).unwrap();
        assert_eq!(rig.app.cache().catalog().get(id).name, "diamond_necklaces");
        assert!(rig.app.pick_active_item(5));
        assert_eq!(rig.app.navigate(1), Some(0));
        assert!(rig.app.toggle_try_all(Instant::now()));
    }
}
