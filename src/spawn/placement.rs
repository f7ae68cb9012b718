use crate::shapes::{Point, Rect};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Corner(Corner),
    Edge(Edge),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRules {
    pub corner_chance: f64,
    pub corner_offset: f32,
    pub corner_jitter: f32,
    pub edge_offset: f32,
    pub edge_jitter: f32,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            corner_chance: 0.2,
            corner_offset: 25.,
            corner_jitter: 25.,
            edge_offset: 20.,
            edge_jitter: 30.,
        }
    }
}

// uniform in [lo, hi), collapsing to lo for an empty range
fn uniform<R: Rng>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

impl PlacementRules {
    /// Pick where a `w` x `h` sprite goes around `face_box`. The returned
    /// offset is relative to the face box origin so it follows the face.
    pub fn choose<R: Rng>(&self, rng: &mut R, face_box: &Rect, w: f32, h: f32) -> (Placement, Point) {
        if rng.random_bool(self.corner_chance.clamp(0., 1.)) {
            let corner = match rng.random_range(0..4) {
                0 => Corner::TopLeft,
                1 => Corner::TopRight,
                2 => Corner::BottomLeft,
                _ => Corner::BottomRight,
            };

            let j = self.corner_jitter;
            let jx = uniform(rng, -j, j);
            let jy = uniform(rng, -j, j);
            let (x, y) = self.corner_anchor(corner, face_box, w, h);

            return (Placement::Corner(corner), Point::new(x + jx, y + jy));
        }

        let edge = match rng.random_range(0..4) {
            0 => Edge::Left,
            1 => Edge::Right,
            2 => Edge::Top,
            _ => Edge::Bottom,
        };

        let off = self.edge_offset;
        let j = self.edge_jitter;
        let offset = match edge {
            Edge::Left => Point::new(-w - off, uniform(rng, -j, face_box.h + j)),
            Edge::Right => Point::new(face_box.w + off, uniform(rng, -j, face_box.h + j)),
            Edge::Top => Point::new(uniform(rng, -j, face_box.w + j), -h - off),
            Edge::Bottom => Point::new(uniform(rng, -j, face_box.w + j), face_box.h + off),
        };

        (Placement::Edge(edge), offset)
    }

    fn corner_anchor(&self, corner: Corner, face_box: &Rect, w: f32, h: f32) -> (f32, f32) {
        let off = self.corner_offset;
        let left = -w - off;
        let right = face_box.w + off;
        let top = -h - off;
        let bottom = face_box.h + off;

        match corner {
            Corner::TopLeft => (left, top),
            Corner::TopRight => (right, top),
            Corner::BottomLeft => (left, bottom),
            Corner::BottomRight => (right, bottom),
        }
    }
}
