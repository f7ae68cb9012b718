use crate::shapes::Point;
use serde::Deserialize;
use std::sync::Arc;

pub mod latest;
pub mod source;

pub use latest::Latest;
pub use source::{DetectorProcess, LandmarkMessage, Landmarks};

// Face mesh indices, see the MediaPipe face landmark keypoint diagram
pub const L_EYE_TOP: usize = 159;
pub const L_EYE_BOTTOM: usize = 145;
pub const L_EYE_OUTER: usize = 33;
pub const L_EYE_INNER: usize = 133;

pub const R_EYE_TOP: usize = 386;
pub const R_EYE_BOTTOM: usize = 374;
pub const R_EYE_OUTER: usize = 263;
pub const R_EYE_INNER: usize = 362;

pub const L_EYE_CORNERS: [usize; 2] = [L_EYE_OUTER, L_EYE_INNER];
pub const R_EYE_CORNERS: [usize; 2] = [R_EYE_OUTER, R_EYE_INNER];

// Outline of each eye, used for the censor box
pub const L_EYE_IDXS: [usize; 10] = [33, 7, 163, 144, 145, 153, 154, 155, 133, 173];
pub const R_EYE_IDXS: [usize; 10] = [263, 249, 390, 373, 374, 380, 381, 382, 362, 398];

/// A single landmark as delivered by the detector. Either `[x, y, z?]` or
/// `{"x": .., "y": .., "z": ..}` depending on how the model is configured.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Keypoint {
    Array(Vec<f32>),
    Object {
        x: f32,
        y: f32,
        #[serde(default)]
        z: Option<f32>,
    },
}

impl Keypoint {
    pub fn xy(&self) -> Option<Point> {
        match self {
            Keypoint::Array(coords) => match coords.as_slice() {
                [x, y, ..] => Some(Point::new(*x, *y)),
                _ => None,
            },
            Keypoint::Object { x, y, .. } => Some(Point::new(*x, *y)),
        }
    }
}

impl From<Point> for Keypoint {
    fn from(p: Point) -> Keypoint {
        Keypoint::Object {
            x: p.x,
            y: p.y,
            z: None,
        }
    }
}

pub fn to_xy(kp: Option<&Keypoint>) -> Option<Point> {
    kp.and_then(Keypoint::xy)
}

/// Ordered landmark list. Entries may be missing (`null`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Mesh(Vec<Option<Keypoint>>);

impl Mesh {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Point> {
        to_xy(self.0.get(idx).and_then(Option::as_ref))
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.0.iter().filter_map(|kp| to_xy(kp.as_ref()))
    }

    pub fn select<'a>(&'a self, idxs: &'a [usize]) -> impl Iterator<Item = Point> + 'a {
        idxs.iter().filter_map(|i| self.get(*i))
    }

    pub fn set(&mut self, idx: usize, p: Point) {
        if idx >= self.0.len() {
            self.0.resize(idx + 1, None);
        }
        self.0[idx] = Some(p.into());
    }
}

impl From<Vec<Point>> for Mesh {
    fn from(points: Vec<Point>) -> Mesh {
        Mesh(points.into_iter().map(|p| Some(p.into())).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hand {
    pub keypoints: Mesh,
    pub handedness: Handedness,
    pub confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "FaceKeys")]
pub struct Face {
    pub keypoints: Mesh,
}

// Detectors name the mesh differently, some send more than one
#[derive(Deserialize)]
struct FaceKeys {
    #[serde(rename = "scaledMesh")]
    scaled_mesh: Option<Mesh>,
    mesh: Option<Mesh>,
    keypoints: Option<Mesh>,
}

impl From<FaceKeys> for Face {
    fn from(keys: FaceKeys) -> Face {
        let keypoints = keys
            .scaled_mesh
            .or(keys.mesh)
            .or(keys.keypoints)
            .unwrap_or_default();

        Face { keypoints }
    }
}

impl Face {
    pub fn new(keypoints: impl Into<Mesh>) -> Face {
        Face {
            keypoints: keypoints.into(),
        }
    }
}

/// Snapshot of the latest hand and face results, read once per frame.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub hands: Arc<Vec<Hand>>,
    pub faces: Arc<Vec<Face>>,
}

impl Detection {
    pub fn new(hands: Vec<Hand>, faces: Vec<Face>) -> Detection {
        Detection {
            hands: Arc::new(hands),
            faces: Arc::new(faces),
        }
    }

    // Only the first face is tracked
    pub fn face(&self) -> Option<&Face> {
        self.faces.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_forms() {
        let kps: Vec<Keypoint> =
            serde_json::from_str(r#"[[1.5, 2.5], [3, 4, -0.2], {"x": 5, "y": 6}, {"x": 7, "y": 8, "z": 1}]"#)
                .unwrap();

        let xy: Vec<Option<Point>> = kps.iter().map(Keypoint::xy).collect();
        assert_eq!(
            xy,
            vec![
                Some(Point::new(1.5, 2.5)),
                Some(Point::new(3., 4.)),
                Some(Point::new(5., 6.)),
                Some(Point::new(7., 8.)),
            ]
        );
    }

    #[test]
    fn test_to_xy_missing() {
        assert_eq!(to_xy(None), None);
        assert_eq!(to_xy(Some(&Keypoint::Array(vec![1.]))), None);
    }

    #[test]
    fn test_mesh_nulls() {
        let mesh: Mesh = serde_json::from_str(r#"[{"x": 1, "y": 2}, null, [3, 4]]"#).unwrap();

        assert_eq!(mesh.len(), 3);
        assert_eq!(mesh.get(0), Some(Point::new(1., 2.)));
        assert_eq!(mesh.get(1), None);
        assert_eq!(mesh.get(7), None);
        assert_eq!(mesh.points().count(), 2);
        assert_eq!(mesh.select(&[2, 1, 0]).collect::<Vec<_>>().len(), 2);
    }

    #[test]
    fn test_face_mesh_keys() {
        for key in ["keypoints", "mesh", "scaledMesh"] {
            let json = format!(r#"{{"{key}": [[1, 2], [3, 4]]}}"#);
            let face: Face = serde_json::from_str(&json).unwrap();
            assert_eq!(face.keypoints.get(1), Some(Point::new(3., 4.)));
        }
    }

    #[test]
    fn test_face_mesh_key_priority() {
        let face: Face = serde_json::from_str(
            r#"{"mesh": [[0.1, 0.2]], "scaledMesh": [[64, 96]], "keypoints": [[1, 1]]}"#,
        )
        .unwrap();
        assert_eq!(face.keypoints.get(0), Some(Point::new(64., 96.)));

        let face: Face =
            serde_json::from_str(r#"{"mesh": [[3, 4]], "keypoints": [[1, 1]]}"#).unwrap();
        assert_eq!(face.keypoints.get(0), Some(Point::new(3., 4.)));

        let face: Face = serde_json::from_str("{}").unwrap();
        assert!(face.keypoints.is_empty());
    }

    #[test]
    fn test_hand() {
        let hand: Hand = serde_json::from_str(
            r#"{"keypoints": [{"x": 10, "y": 20, "z": 0}], "handedness": "Left", "confidence": 0.93}"#,
        )
        .unwrap();

        assert_eq!(hand.handedness, Handedness::Left);
        assert_eq!(hand.keypoints.get(0), Some(Point::new(10., 20.)));
        assert!(hand.confidence > 0.9);
    }

    #[test]
    fn test_mesh_set_grows() {
        let mut mesh = Mesh::default();
        mesh.set(3, Point::new(1., 1.));

        assert_eq!(mesh.len(), 4);
        assert_eq!(mesh.get(0), None);
        assert_eq!(mesh.get(3), Some(Point::new(1., 1.)));
    }
}
