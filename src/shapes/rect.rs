use super::point::Point;

// top-left origin, frame coordinates
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

// Integer rect on the pixel grid of a frame, always non-empty
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect { x, y, w, h }
    }

    pub fn left(&self) -> f32 {
        self.x
    }
    pub fn right(&self) -> f32 {
        self.x + self.w
    }
    pub fn top(&self) -> f32 {
        self.y
    }
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Axis-aligned bounds of `points`, padded by `margin` on every side and
    /// clamped to a `frame_w` x `frame_h` frame. `None` when there are no points.
    pub fn bounding(
        points: impl IntoIterator<Item = Point>,
        margin: f32,
        frame_w: u32,
        frame_h: u32,
    ) -> Option<Rect> {
        let mut points = points.into_iter();
        let first = points.next()?;

        let (min_x, min_y, max_x, max_y) = points.fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        );

        let left = (min_x - margin).max(0.);
        let top = (min_y - margin).max(0.);
        let right = (max_x + margin).min(frame_w as f32);
        let bottom = (max_y + margin).min(frame_h as f32);

        Some(Rect {
            x: left,
            y: top,
            w: (right - left).max(0.),
            h: (bottom - top).max(0.),
        })
    }

    /// Snap to whole pixels and clip to the frame. `None` if nothing is left.
    pub fn to_pixels(&self, frame_w: u32, frame_h: u32) -> Option<PixelRect> {
        let left = self.left().round().clamp(0., frame_w as f32) as u32;
        let right = self.right().round().clamp(0., frame_w as f32) as u32;
        let top = self.top().round().clamp(0., frame_h as f32) as u32;
        let bottom = self.bottom().round().clamp(0., frame_h as f32) as u32;

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left,
            y: top,
            w: right - left,
            h: bottom - top,
        })
    }
}
