use crate::blink::BlinkDetector;
use crate::config::Settings;
use crate::draw::Overlay;
use crate::landmarks::{self, Detection};
use crate::pixelate::Pixelation;
use crate::shapes::Rect;
use crate::spawn::{EyeSpawner, SpawnedEye};
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;
use tracing::{Level, debug, span, trace};

/// Result of composing one frame.
pub struct RenderedFrame {
    pub image: RgbaImage,
    /// Face box computed this frame, if a face was present.
    pub face_box: Option<Rect>,
    pub hands_pixelated: usize,
    pub triggered: bool,
    pub spawned: usize,
}

/// Per-session effect state, owned by the frame loop.
pub struct Session {
    hand_confidence: f32,
    face_margin: f32,
    show_ear: bool,
    hand_px: Pixelation,
    eye_px: Pixelation,
    blink: BlinkDetector,
    spawner: EyeSpawner,
    face_box: Option<Rect>,
    overlay: Overlay,
    hand_dots: bool,
}

impl Session {
    pub fn new(settings: &Settings, overlay: Overlay) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            hand_confidence: settings.hand_confidence,
            face_margin: settings.face_margin,
            show_ear: settings.show_ear,
            hand_px: settings.hand_pixelation(),
            eye_px: settings.eye_pixelation(),
            blink: BlinkDetector::new(settings.blink_threshold),
            spawner: EyeSpawner::new(settings.spawn(), rng),
            face_box: None,
            overlay,
            hand_dots: false,
        }
    }

    pub fn set_hand_dots(&mut self, on: bool) {
        if on != self.hand_dots {
            debug!("Hand keypoint overlay {}", if on { "on" } else { "off" });
        }
        self.hand_dots = on;
    }

    pub fn eyes(&self) -> impl Iterator<Item = &SpawnedEye> {
        self.spawner.eyes()
    }

    pub fn cooldown(&self) -> i32 {
        self.spawner.cooldown()
    }

    /// Last face box ever computed.
    pub fn face_box(&self) -> Option<Rect> {
        self.face_box
    }

    /// Compose the effect for `frame` with the latest `detection`.
    pub fn render(&mut self, frame: &RgbaImage, detection: &Detection, now: Instant) -> RenderedFrame {
        let span = span!(Level::DEBUG, "render");
        let _guard = span.enter();

        let face = detection.face();
        let spawned = self.spawner.fire_due(now, frame, face.is_some());

        let mut canvas = frame.clone();

        let hands_span = span!(Level::DEBUG, "pixelate_hands");
        let hands_guard = hands_span.enter();
        let mut hands_pixelated = 0;
        for hand in detection.hands.iter().filter(|h| h.confidence > self.hand_confidence) {
            if self
                .hand_px
                .apply(frame, &mut canvas, hand.keypoints.points())
                .is_some()
            {
                hands_pixelated += 1;
            }
        }
        drop(hands_guard);

        let mut face_box = None;
        let mut triggered = false;
        if let Some(face) = face {
            let face_span = span!(Level::DEBUG, "face");
            let face_guard = face_span.enter();

            face_box = Rect::bounding(
                face.keypoints.points(),
                self.face_margin,
                frame.width(),
                frame.height(),
            );

            let eye_idxs = landmarks::L_EYE_IDXS.iter().chain(landmarks::R_EYE_IDXS.iter());
            let eye_points = eye_idxs.filter_map(|i| face.keypoints.get(*i));
            self.eye_px.apply(frame, &mut canvas, eye_points);

            let blinking = self.blink.is_blinking(face);
            if let Some(fb) = face_box {
                triggered = self.spawner.maybe_trigger(blinking, face, fb, now);
                self.face_box = Some(fb);
            }

            drop(face_guard);
        }

        self.spawner.tick();

        if let Some(fb) = self.face_box {
            for eye in self.spawner.eyes() {
                self.overlay.spawned_eye(&mut canvas, eye, eye.position(&fb));
            }
        }

        if let Some(fb) = face_box {
            self.overlay.face_box(&mut canvas, fb);
        }

        if self.hand_dots {
            // dots only skip hands below the threshold, pixelation needs more than it
            for hand in detection.hands.iter().filter(|h| h.confidence >= self.hand_confidence) {
                self.overlay.hand_dots(&mut canvas, hand);
            }
        }

        if self.show_ear {
            if let Some(ear) = self.blink.last_ear() {
                self.overlay.ear(&mut canvas, ear);
            }
        }

        trace!(
            "Rendered frame, {} eyes, {} pending, cooldown {}",
            self.spawner.len(),
            self.spawner.pending(),
            self.spawner.cooldown()
        );

        RenderedFrame {
            image: canvas,
            face_box,
            hands_pixelated,
            triggered,
            spawned,
        }
    }
}
