use crate::landmarks::{self, Face};
use crate::shapes::{Point, Rect};
use image::RgbaImage;
use image::imageops;
use placement::{Placement, PlacementRules};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

pub mod placement;

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSettings {
    pub cooldown_frames: i32,
    pub delay: Duration,
    pub capture_padding: f32,
    pub max_eyes: Option<usize>,
    pub placement: PlacementRules,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            cooldown_frames: 20,
            delay: Duration::from_millis(150),
            capture_padding: 20.,
            max_eyes: None,
            placement: PlacementRules::default(),
        }
    }
}

/// A captured eye pinned next to the face. Image and size are fixed at
/// capture; only the face box it is drawn relative to moves.
#[derive(Debug, Clone)]
pub struct SpawnedEye {
    pub image: RgbaImage,
    pub offset: Point,
    pub w: u32,
    pub h: u32,
    pub label: String,
    pub placement: Placement,
}

impl SpawnedEye {
    pub fn position(&self, face_box: &Rect) -> Point {
        face_box.origin().offset(self.offset.x, self.offset.y)
    }
}

// Face state as of the blink that scheduled the spawn
#[derive(Debug, Clone)]
struct PendingSpawn {
    due: Instant,
    face: Face,
    face_box: Rect,
}

pub struct EyeSpawner {
    settings: SpawnSettings,
    rng: StdRng,
    cooldown: i32,
    next_id: u32,
    pending: Vec<PendingSpawn>,
    eyes: VecDeque<SpawnedEye>,
}

impl EyeSpawner {
    pub fn new(settings: SpawnSettings, rng: StdRng) -> Self {
        Self {
            settings,
            rng,
            cooldown: 0,
            next_id: 1,
            pending: Vec::new(),
            eyes: VecDeque::new(),
        }
    }

    pub fn cooldown(&self) -> i32 {
        self.cooldown
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn eyes(&self) -> impl Iterator<Item = &SpawnedEye> {
        self.eyes.iter()
    }

    pub fn len(&self) -> usize {
        self.eyes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eyes.is_empty()
    }

    /// Schedule a spawn if `blinking` and the cooldown has run out.
    pub fn maybe_trigger(&mut self, blinking: bool, face: &Face, face_box: Rect, now: Instant) -> bool {
        if !blinking || self.cooldown > 0 {
            return false;
        }

        self.cooldown = self.settings.cooldown_frames;
        self.pending.push(PendingSpawn {
            due: now + self.settings.delay,
            face: face.clone(),
            face_box,
        });
        debug!("Blink, eye spawn scheduled");

        true
    }

    // once per frame
    pub fn tick(&mut self) {
        if self.cooldown > 0 {
            self.cooldown -= 1;
        }
    }

    /// Run every spawn that is due. Spawns coming due while no face is
    /// detected are dropped, not retried. Returns how many eyes were added.
    pub fn fire_due(&mut self, now: Instant, frame: &RgbaImage, face_present: bool) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;

        let mut spawned = 0;
        for p in due {
            if !face_present {
                debug!("No face when spawn came due, dropping it");
                continue;
            }

            if let Some(eye) = self.capture(frame, &p.face, &p.face_box) {
                info!("Spawned eye {} at {:?}", eye.label, eye.placement);
                self.push(eye);
                spawned += 1;
            }
        }

        spawned
    }

    fn capture(&mut self, frame: &RgbaImage, face: &Face, face_box: &Rect) -> Option<SpawnedEye> {
        let [a, b] = if self.rng.random_bool(0.5) {
            landmarks::L_EYE_CORNERS
        } else {
            landmarks::R_EYE_CORNERS
        };
        let p1 = face.keypoints.get(a)?;
        let p2 = face.keypoints.get(b)?;

        let rect = capture_rect(p1, p2, self.settings.capture_padding);
        let image = snapshot(frame, &rect)?;
        let (w, h) = image.dimensions();

        let (placement, offset) =
            self.settings
                .placement
                .choose(&mut self.rng, face_box, w as f32, h as f32);

        let label = format!("{:03}", self.next_id);
        self.next_id += 1;

        Some(SpawnedEye {
            image,
            offset,
            w,
            h,
            label,
            placement,
        })
    }

    fn push(&mut self, eye: SpawnedEye) {
        self.eyes.push_back(eye);

        if let Some(max) = self.settings.max_eyes {
            while self.eyes.len() > max {
                if let Some(old) = self.eyes.pop_front() {
                    trace!("Evicted eye {}", old.label);
                }
            }
        }
    }
}

/// Extent of two eye corners padded on every side.
pub fn capture_rect(a: Point, b: Point, padding: f32) -> Rect {
    let x = a.x.min(b.x) - padding;
    let y = a.y.min(b.y) - padding;
    let w = (a.x - b.x).abs() + padding * 2.;
    let h = (a.y - b.y).abs() + padding * 2.;

    Rect::new(x, y, w, h)
}

/// Owned copy of `rect` from `frame`. Whatever falls outside the frame stays
/// transparent.
pub fn snapshot(frame: &RgbaImage, rect: &Rect) -> Option<RgbaImage> {
    let x = rect.x.round() as i64;
    let y = rect.y.round() as i64;
    let w = rect.w.round() as u32;
    let h = rect.h.round() as u32;
    if w == 0 || h == 0 {
        return None;
    }

    let mut img = RgbaImage::new(w, h);
    imageops::replace(&mut img, frame, -x, -y);

    Some(img)
}
