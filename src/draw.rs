use crate::landmarks::{Hand, Handedness};
use crate::shapes::{Point, Rect};
use crate::spawn::SpawnedEye;
use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::imageops;
use image::{Rgba, RgbaImage};
use imageproc::drawing;
use std::f32::consts::{FRAC_PI_2, PI};
use std::path::Path;
use tracing::warn;

pub const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

const STROKE: u32 = 3;
const FACE_RADIUS: f32 = 12.;
const EYE_RADIUS: f32 = 6.;
const FACE_LABEL: &str = "face detected: 001";
const FACE_LABEL_SIZE: f32 = 18.;
const EYE_LABEL_SIZE: f32 = 16.;
const DOT_RADIUS: i32 = 4;
const ARC_STEPS: usize = 8;

/// Outline of `rect` with rounded corners. The stroke is centered on the edge.
pub fn draw_rounded_rect_mut(
    canvas: &mut RgbaImage,
    rect: Rect,
    radius: f32,
    weight: u32,
    color: Rgba<u8>,
) {
    let half = (weight.max(1) - 1) as f32 / 2.;

    for i in 0..weight.max(1) {
        let inset = i as f32 - half;
        let x0 = rect.left() + inset;
        let y0 = rect.top() + inset;
        let x1 = rect.right() - inset;
        let y1 = rect.bottom() - inset;
        if x1 < x0 || y1 < y0 {
            continue;
        }

        let r = (radius - inset).max(0.).min((x1 - x0) / 2.).min((y1 - y0) / 2.);

        drawing::draw_line_segment_mut(canvas, (x0 + r, y0), (x1 - r, y0), color);
        drawing::draw_line_segment_mut(canvas, (x0 + r, y1), (x1 - r, y1), color);
        drawing::draw_line_segment_mut(canvas, (x0, y0 + r), (x0, y1 - r), color);
        drawing::draw_line_segment_mut(canvas, (x1, y0 + r), (x1, y1 - r), color);

        if r > 0. {
            draw_arc(canvas, Point::new(x0 + r, y0 + r), r, PI, color);
            draw_arc(canvas, Point::new(x1 - r, y0 + r), r, PI + FRAC_PI_2, color);
            draw_arc(canvas, Point::new(x1 - r, y1 - r), r, 0., color);
            draw_arc(canvas, Point::new(x0 + r, y1 - r), r, FRAC_PI_2, color);
        }
    }
}

// quarter circle starting at `start` radians, clockwise on screen
fn draw_arc(canvas: &mut RgbaImage, center: Point, r: f32, start: f32, color: Rgba<u8>) {
    let at = |theta: f32| (center.x + r * theta.cos(), center.y + r * theta.sin());

    let mut prev = at(start);
    for step in 1..=ARC_STEPS {
        let next = at(start + FRAC_PI_2 * step as f32 / ARC_STEPS as f32);
        drawing::draw_line_segment_mut(canvas, prev, next, color);
        prev = next;
    }
}

/// Everything drawn on top of the video: outlines, labels and debug marks.
#[derive(Clone, Default)]
pub struct Overlay {
    font: Option<FontArc>,
}

impl Overlay {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Overlay using the font at `path`; labels are skipped if it can't be read.
    pub fn load(path: &Path) -> Self {
        match load_font(path) {
            Ok(font) => Self::new(Some(font)),
            Err(e) => {
                warn!("Labels disabled: {e:?}");
                Self::new(None)
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn face_box(&self, canvas: &mut RgbaImage, face_box: Rect) {
        draw_rounded_rect_mut(canvas, face_box, FACE_RADIUS, STROKE, YELLOW);

        // baseline 28px under the box
        let x = face_box.left().round() as i32;
        let y = (face_box.bottom() + 28. - FACE_LABEL_SIZE).round() as i32;
        self.text(canvas, x, y, FACE_LABEL_SIZE, FACE_LABEL, YELLOW);
    }

    pub fn spawned_eye(&self, canvas: &mut RgbaImage, eye: &SpawnedEye, at: Point) {
        imageops::overlay(canvas, &eye.image, at.x.round() as i64, at.y.round() as i64);

        let bounds = Rect::new(at.x, at.y, eye.w as f32, eye.h as f32);
        draw_rounded_rect_mut(canvas, bounds, EYE_RADIUS, STROKE, YELLOW);

        let label_center = Point::new(at.x + eye.w as f32 / 2., at.y - 14.);
        self.outlined_label(canvas, label_center, EYE_LABEL_SIZE, &eye.label);
    }

    pub fn hand_dots(&self, canvas: &mut RgbaImage, hand: &Hand) {
        let color = match hand.handedness {
            Handedness::Left => MAGENTA,
            Handedness::Right => YELLOW,
        };

        for p in hand.keypoints.points() {
            drawing::draw_filled_circle_mut(
                canvas,
                (p.x.round() as i32, p.y.round() as i32),
                DOT_RADIUS,
                color,
            );
        }
    }

    pub fn ear(&self, canvas: &mut RgbaImage, ear: f32) {
        self.text(canvas, 10, 4, 16., &format!("EAR: {ear:.3}"), WHITE);
    }

    fn text(&self, canvas: &mut RgbaImage, x: i32, y: i32, size: f32, text: &str, color: Rgba<u8>) {
        if let Some(font) = &self.font {
            drawing::draw_text_mut(canvas, color, x, y, PxScale::from(size), font, text);
        }
    }

    // black text with a yellow outline, centered on `center`
    fn outlined_label(&self, canvas: &mut RgbaImage, center: Point, size: f32, text: &str) {
        let Some(font) = &self.font else {
            return;
        };

        let scale = PxScale::from(size);
        let (w, h) = drawing::text_size(scale, font, text);
        let x = (center.x - w as f32 / 2.).round() as i32;
        let y = (center.y - h as f32 / 2.).round() as i32;

        for (dx, dy) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
            drawing::draw_text_mut(canvas, YELLOW, x + dx, y + dy, scale, font, text);
        }
        drawing::draw_text_mut(canvas, BLACK, x, y, scale, font, text);
    }
}

pub fn load_font(path: &Path) -> Result<FontArc> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    let font = FontArc::try_from_vec(data)
        .with_context(|| format!("Invalid font {}", path.display()))?;

    Ok(font)
}
