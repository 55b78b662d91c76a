//! Hand gesture recognition.
//!
//! Turns the per-frame hand landmark stream into discrete events: point right
//! (next item), point left (previous item) and, optionally, an open palm.
//! One cooldown window is shared by every gesture type, so at most one event
//! is accepted per window regardless of the camera frame rate.

use log::info;
use std::time::{Duration, Instant};

use crate::types::{
    Landmarks, HAND_INDEX_MCP, HAND_INDEX_PIP, HAND_INDEX_TIP, HAND_PINKY_PIP, HAND_PINKY_TIP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Advance the active slot by `+1` or `-1`.
    Navigate(i32),
    /// All fingers upright.
    OpenPalm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    pub cooldown: Duration,
    /// Minimum horizontal fingertip-to-knuckle offset, in normalized frame units.
    pub threshold: f32,
    pub palm_enabled: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(600),
            threshold: 0.12,
            palm_enabled: false,
        }
    }
}

/// Outcome of one hand result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandUpdate {
    pub present: bool,
    /// True when `present` differs from the previous result.
    pub presence_changed: bool,
    pub gesture: Option<Gesture>,
}

pub struct GestureClassifier {
    config: GestureConfig,
    last_gesture: Option<Instant>,
    hand_present: bool,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            last_gesture: None,
            hand_present: false,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn hand_present(&self) -> bool {
        self.hand_present
    }

    /// `palm_allowed` lets the caller veto the palm gesture (no category active).
    pub fn update(&mut self, hand: Option<&Landmarks>, now: Instant, palm_allowed: bool) -> HandUpdate {
        let present = hand.is_some();
        let presence_changed = present != self.hand_present;
        self.hand_present = present;

        let gesture = match hand {
            Some(landmarks) if !self.cooling_down(now) => {
                let gesture = self.classify(landmarks, palm_allowed);
                if let Some(g) = gesture {
                    self.last_gesture = Some(now);
                    info!("Gesture accepted: {:?}", g);
                }
                gesture
            }
            _ => None,
        };

        HandUpdate {
            present,
            presence_changed,
            gesture,
        }
    }

    fn cooling_down(&self, now: Instant) -> bool {
        match self.last_gesture {
            Some(last) => now.saturating_duration_since(last) < self.config.cooldown,
            None => false,
        }
    }

    fn classify(&self, hand: &Landmarks, palm_allowed: bool) -> Option<Gesture> {
        let diff = horizontal_diff(hand)?;

        if diff > self.config.threshold {
            return Some(Gesture::Navigate(1));
        }
        if diff < -self.config.threshold {
            return Some(Gesture::Navigate(-1));
        }

        if self.config.palm_enabled && palm_allowed && is_open_palm(hand) {
            return Some(Gesture::OpenPalm);
        }
        None
    }
}

/// Index fingertip x minus index knuckle x. Positive = pointing right in frame.
pub fn horizontal_diff(hand: &Landmarks) -> Option<f32> {
    let tip = hand.get(HAND_INDEX_TIP)?;
    let knuckle = hand.get(HAND_INDEX_MCP)?;
    Some(tip.x - knuckle.x)
}

/// Index and pinky tips above their middle joints (image y grows downward).
pub fn is_open_palm(hand: &Landmarks) -> bool {
    match (
        hand.get(HAND_INDEX_TIP),
        hand.get(HAND_INDEX_PIP),
        hand.get(HAND_PINKY_TIP),
        hand.get(HAND_PINKY_PIP),
    ) {
        (Some(index_tip), Some(index_pip), Some(pinky_tip), Some(pinky_pip)) => {
            index_tip.y < index_pip.y && pinky_tip.y < pinky_pip.y
        }
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Point3D, HAND_POINTS};

    /// Hand whose index fingertip sits `diff` to the right of its knuckle, fingers curled.
    pub fn pointing_hand(diff: f32) -> Landmarks {
        let mut points = vec![Point3D::new(0.5, 0.5, 0.0); HAND_POINTS];
        points[HAND_INDEX_MCP] = Point3D::new(0.5, 0.5, 0.0);
        points[HAND_INDEX_TIP] = Point3D::new(0.5 + diff, 0.5, 0.0);
        // Tips below PIP joints: not a palm.
        points[HAND_INDEX_PIP] = Point3D::new(0.5, 0.45, 0.0);
        points[HAND_PINKY_PIP] = Point3D::new(0.5, 0.45, 0.0);
        points[HAND_PINKY_TIP] = Point3D::new(0.5, 0.55, 0.0);
        Landmarks::new(points)
    }

    pub fn open_palm() -> Landmarks {
        let mut points = vec![Point3D::new(0.5, 0.5, 0.0); HAND_POINTS];
        points[HAND_INDEX_PIP] = Point3D::new(0.5, 0.4, 0.0);
        points[HAND_INDEX_TIP] = Point3D::new(0.5, 0.3, 0.0);
        points[HAND_PINKY_PIP] = Point3D::new(0.6, 0.45, 0.0);
        points[HAND_PINKY_TIP] = Point3D::new(0.6, 0.35, 0.0);
        Landmarks::new(points)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_direction_thresholds() {
        let t0 = Instant::now();

        let mut c = GestureClassifier::new(GestureConfig::default());
        assert_eq!(c.update(Some(&pointing_hand(0.20)), t0, true).gesture, Some(Gesture::Navigate(1)));

        let mut c = GestureClassifier::new(GestureConfig::default());
        assert_eq!(c.update(Some(&pointing_hand(-0.20)), t0, true).gesture, Some(Gesture::Navigate(-1)));

        let mut c = GestureClassifier::new(GestureConfig::default());
        assert_eq!(c.update(Some(&pointing_hand(0.05)), t0, true).gesture, None);
    }

    #[test]
    fn test_cooldown_discards_results() {
        let t0 = Instant::now();
        let mut c = GestureClassifier::new(GestureConfig::default());

        assert!(c.update(Some(&pointing_hand(0.2)), t0, true).gesture.is_some());
        assert!(c.update(Some(&pointing_hand(0.2)), t0 + ms(100), true).gesture.is_none());
        assert!(c.update(Some(&pointing_hand(-0.2)), t0 + ms(599), true).gesture.is_none());
        assert_eq!(
            c.update(Some(&pointing_hand(-0.2)), t0 + ms(600), true).gesture,
            Some(Gesture::Navigate(-1))
        );
    }

    #[test]
    fn test_neutral_hand_does_not_consume_cooldown() {
        let t0 = Instant::now();
        let mut c = GestureClassifier::new(GestureConfig::default());
        assert!(c.update(Some(&pointing_hand(0.0)), t0, true).gesture.is_none());
        assert!(c.update(Some(&pointing_hand(0.3)), t0 + ms(10), true).gesture.is_some());
    }

    #[test]
    fn test_events_are_spaced_by_cooldown() {
        let t0 = Instant::now();
        let mut c = GestureClassifier::new(GestureConfig::default());
        let mut accepted = Vec::new();

        // 30 fps stream of alternating strong gestures for three seconds.
        for frame in 0..90u64 {
            let now = t0 + ms(frame * 33);
            let diff = if frame % 2 == 0 { 0.25 } else { -0.25 };
            if c.update(Some(&pointing_hand(diff)), now, true).gesture.is_some() {
                accepted.push(now);
            }
        }

        assert!(accepted.len() >= 4);
        for pair in accepted.windows(2) {
            assert!(pair[1] - pair[0] >= ms(600), "events {:?} apart", pair[1] - pair[0]);
        }
    }

    #[test]
    fn test_presence_transitions() {
        let t0 = Instant::now();
        let mut c = GestureClassifier::new(GestureConfig::default());

        let u = c.update(None, t0, true);
        assert!(!u.present && !u.presence_changed && u.gesture.is_none());

        let u = c.update(Some(&pointing_hand(0.2)), t0, true);
        assert!(u.present && u.presence_changed);

        // Presence is still reported while cooling down.
        let u = c.update(Some(&pointing_hand(0.2)), t0 + ms(10), true);
        assert!(u.present && !u.presence_changed && u.gesture.is_none());

        let u = c.update(None, t0 + ms(20), true);
        assert!(!u.present && u.presence_changed && u.gesture.is_none());
        assert!(!c.hand_present());
    }

    #[test]
    fn test_open_palm_gated_by_config_and_caller() {
        let t0 = Instant::now();
        let mut off = GestureClassifier::new(GestureConfig::default());
        assert_eq!(off.update(Some(&open_palm()), t0, true).gesture, None);

        let config = GestureConfig { palm_enabled: true, ..GestureConfig::default() };
        let mut on = GestureClassifier::new(config.clone());
        assert_eq!(on.update(Some(&open_palm()), t0, false).gesture, None);
        assert_eq!(on.update(Some(&open_palm()), t0, true).gesture, Some(Gesture::OpenPalm));

        // Pointing wins over palm.
        let mut pointing = GestureClassifier::new(config);
        let mut hand = open_palm();
        hand.points[HAND_INDEX_TIP].x = 0.8;
        assert_eq!(pointing.update(Some(&hand), t0, true).gesture, Some(Gesture::Navigate(1)));
    }

    #[test]
    fn test_truncated_hand_is_ignored() {
        let mut c = GestureClassifier::new(GestureConfig::default());
        let hand = Landmarks::new(vec![Point3D::default(); 4]);
        let u = c.update(Some(&hand), Instant::now(), true);
        assert!(u.present);
        assert!(u.gesture.is_none());
    }
}
