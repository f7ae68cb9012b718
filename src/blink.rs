use crate::landmarks::{self, Face, Mesh};
use tracing::trace;

pub const EAR_THRESHOLD: f32 = 0.26;

#[derive(Debug, Clone, Copy)]
pub struct EyeLandmarks {
    pub top: usize,
    pub bottom: usize,
    pub outer: usize,
    pub inner: usize,
}

pub const LEFT_EYE: EyeLandmarks = EyeLandmarks {
    top: landmarks::L_EYE_TOP,
    bottom: landmarks::L_EYE_BOTTOM,
    outer: landmarks::L_EYE_OUTER,
    inner: landmarks::L_EYE_INNER,
};

pub const RIGHT_EYE: EyeLandmarks = EyeLandmarks {
    top: landmarks::R_EYE_TOP,
    bottom: landmarks::R_EYE_BOTTOM,
    outer: landmarks::R_EYE_OUTER,
    inner: landmarks::R_EYE_INNER,
};

/// Vertical opening over horizontal width for one eye.
pub fn eye_aspect_ratio(mesh: &Mesh, eye: &EyeLandmarks) -> Option<f32> {
    let top = mesh.get(eye.top)?;
    let bottom = mesh.get(eye.bottom)?;
    let outer = mesh.get(eye.outer)?;
    let inner = mesh.get(eye.inner)?;

    let width = outer.dist(&inner);
    if width <= 0. {
        return None;
    }

    Some(top.dist(&bottom) / width)
}

/// Mean EAR over both eyes, `None` if any of the 8 landmarks is missing.
pub fn mean_aspect_ratio(mesh: &Mesh, a: &EyeLandmarks, b: &EyeLandmarks) -> Option<f32> {
    let a = eye_aspect_ratio(mesh, a)?;
    let b = eye_aspect_ratio(mesh, b)?;

    Some((a + b) / 2.)
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    threshold: f32,
    last_ear: Option<f32>,
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(EAR_THRESHOLD)
    }
}

impl BlinkDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            last_ear: None,
        }
    }

    pub fn is_blinking(&mut self, face: &Face) -> bool {
        match mean_aspect_ratio(&face.keypoints, &LEFT_EYE, &RIGHT_EYE) {
            Some(ear) => {
                trace!("EAR {ear:.3}");
                self.last_ear = Some(ear);
                ear < self.threshold
            }
            None => false,
        }
    }

    // Last EAR computed, for the debug overlay
    pub fn last_ear(&self) -> Option<f32> {
        self.last_ear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Point;
    use approx::assert_relative_eq;

    fn eye(mesh: &mut Mesh, eye: &EyeLandmarks, cx: f32, cy: f32, width: f32, opening: f32) {
        mesh.set(eye.outer, Point::new(cx - width / 2., cy));
        mesh.set(eye.inner, Point::new(cx + width / 2., cy));
        mesh.set(eye.top, Point::new(cx, cy - opening / 2.));
        mesh.set(eye.bottom, Point::new(cx, cy + opening / 2.));
    }

    fn face(left_opening: f32, right_opening: f32) -> Face {
        let mut mesh = Mesh::from(vec![Point::new(200., 200.); 468]);
        eye(&mut mesh, &LEFT_EYE, 170., 150., 30., left_opening);
        eye(&mut mesh, &RIGHT_EYE, 230., 150., 30., right_opening);
        Face::new(mesh)
    }

    #[test]
    fn test_ear_value() {
        let f = face(12., 6.);
        assert_relative_eq!(
            eye_aspect_ratio(&f.keypoints, &LEFT_EYE).unwrap(),
            0.4,
            epsilon = 1e-6
        );
        assert_relative_eq!(
            mean_aspect_ratio(&f.keypoints, &LEFT_EYE, &RIGHT_EYE).unwrap(),
            0.3,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_ear_symmetric() {
        let f = face(12., 3.);
        let ab = mean_aspect_ratio(&f.keypoints, &LEFT_EYE, &RIGHT_EYE).unwrap();
        let ba = mean_aspect_ratio(&f.keypoints, &RIGHT_EYE, &LEFT_EYE).unwrap();
        assert_eq!(ab, ba);

        let swapped = face(3., 12.);
        let swapped = mean_aspect_ratio(&swapped.keypoints, &LEFT_EYE, &RIGHT_EYE).unwrap();
        assert_relative_eq!(ab, swapped, epsilon = 1e-6);
    }

    #[test]
    fn test_closed_eyes_blink() {
        let f = face(0., 0.);
        assert_eq!(
            mean_aspect_ratio(&f.keypoints, &LEFT_EYE, &RIGHT_EYE),
            Some(0.)
        );

        let mut detector = BlinkDetector::default();
        assert!(detector.is_blinking(&f));
        assert_eq!(detector.last_ear(), Some(0.));
    }

    #[test]
    fn test_open_eyes() {
        let mut detector = BlinkDetector::default();
        assert!(!detector.is_blinking(&face(12., 12.)));
        // just under the threshold on both sides
        assert!(detector.is_blinking(&face(7.5, 7.5)));
    }

    #[test]
    fn test_missing_landmarks() {
        let mut detector = BlinkDetector::default();
        let f = Face::new(vec![Point::new(0., 0.); 200]);

        assert!(!detector.is_blinking(&f));
        assert_eq!(detector.last_ear(), None);
    }

    #[test]
    fn test_zero_width_eye() {
        let mut mesh = Mesh::from(vec![Point::new(10., 10.); 468]);
        mesh.set(LEFT_EYE.top, Point::new(10., 5.));

        let mut detector = BlinkDetector::default();
        assert!(!detector.is_blinking(&Face::new(mesh)));
    }
}
