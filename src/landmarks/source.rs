use super::latest::Latest;
use super::{Detection, Face, Hand};
use crate::process::stop_child;
use anyhow::{Context, Error, Result};
use image::RgbaImage;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// One line of detector output. A present key replaces that stream's snapshot,
/// an absent key leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LandmarkMessage {
    pub hands: Option<Vec<Hand>>,
    pub faces: Option<Vec<Face>>,
}

impl LandmarkMessage {
    pub fn parse(line: &str) -> Result<Option<LandmarkMessage>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(line)?))
    }
}

/// Latest hand and face results, written by the detector threads and read by
/// the frame loop.
#[derive(Debug, Clone, Default)]
pub struct Landmarks {
    hands: Latest<Vec<Hand>>,
    faces: Latest<Vec<Face>>,
}

impl Landmarks {
    pub fn apply(&self, msg: LandmarkMessage) {
        if let Some(hands) = msg.hands {
            trace!("{} hands", hands.len());
            self.hands.publish(hands);
        }

        if let Some(faces) = msg.faces {
            trace!("{} faces", faces.len());
            self.faces.publish(faces);
        }
    }

    pub fn detection(&self) -> Detection {
        Detection {
            hands: self.hands.snapshot(),
            faces: self.faces.snapshot(),
        }
    }

    /// Read JSON lines from `reader` until EOF, publishing each one. With
    /// `pace` set, sleeps between lines to approximate a live stream.
    pub fn consume(&self, reader: impl BufRead, pace: Option<Duration>) -> usize {
        let mut applied = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read landmarks: {e:?}");
                    break;
                }
            };

            match LandmarkMessage::parse(&line) {
                Ok(Some(msg)) => {
                    self.apply(msg);
                    applied += 1;
                }
                Ok(None) => continue,
                Err(e) => warn!("Skipping malformed landmark line {}: {e}", idx + 1),
            }

            if let Some(pace) = pace {
                thread::sleep(pace);
            }
        }

        debug!("Landmark stream ended after {applied} messages");
        applied
    }

    pub fn spawn_reader(
        &self,
        reader: impl BufRead + Send + 'static,
        pace: Option<Duration>,
    ) -> Result<JoinHandle<usize>> {
        let landmarks = self.clone();
        let handle = thread::Builder::new()
            .name("landmark-reader".to_string())
            .spawn(move || landmarks.consume(reader, pace))?;

        Ok(handle)
    }
}

/// External detector running as a child process. Frames go in on its stdin as
/// raw RGBA, landmark JSON lines come back on its stdout.
pub struct DetectorProcess {
    child: Child,
    frames: flume::Sender<RgbaImage>,
    width: u32,
    height: u32,
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        stop_child(&mut self.child, "detector");
    }
}

impl DetectorProcess {
    pub fn spawn(command: &str, width: u32, height: u32, landmarks: &Landmarks) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::msg("Empty detector command"))?;

        let mut child = Command::new(program)
            .args(parts)
            .args(["--width", &width.to_string(), "--height", &height.to_string()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start detector `{command}`"))?;
        info!("Started detector `{command}` for {width}x{height} frames");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::msg("Detector stdout unavailable"))?;
        landmarks.spawn_reader(BufReader::new(stdout), None)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::msg("Detector stdin unavailable"))?;

        // One frame in flight at most; the frame loop never waits on the detector
        let (frames, rx) = flume::bounded::<RgbaImage>(1);
        thread::Builder::new()
            .name("detector-writer".to_string())
            .spawn(move || {
                for frame in rx.iter() {
                    if let Err(e) = stdin.write_all(frame.as_raw()).and_then(|_| stdin.flush()) {
                        error!("Failed to send frame to detector: {e:?}");
                        break;
                    }
                }
            })?;

        Ok(Self {
            child,
            frames,
            width,
            height,
        })
    }

    /// Hand a frame to the detector if it is idle. Returns whether it was taken.
    pub fn submit(&self, frame: &RgbaImage) -> bool {
        if frame.width() != self.width || frame.height() != self.height {
            warn!(
                "Frame is {}x{}, detector expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
            return false;
        }

        if self.frames.is_full() {
            return false;
        }

        self.frames.try_send(frame.clone()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Point;
    use std::io::Cursor;

    const STREAM: &str = r#"{"hands": [{"keypoints": [[10, 10], [20, 30]], "handedness": "Right", "confidence": 0.8}]}

{"faces": [{"scaledMesh": [[1, 1], [2, 2]]}]}
not json
{"hands": []}
"#;

    #[test]
    fn test_parse_blank() {
        assert!(LandmarkMessage::parse("   ").unwrap().is_none());
        assert!(LandmarkMessage::parse("{").is_err());
    }

    #[test]
    fn test_face_with_both_meshes() {
        let msg = LandmarkMessage::parse(r#"{"faces": [{"mesh": [[0.1, 0.2]], "scaledMesh": [[64, 96]]}]}"#)
            .unwrap()
            .unwrap();

        let faces = msg.faces.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].keypoints.get(0), Some(Point::new(64., 96.)));
    }

    #[test]
    fn test_streams_independent() {
        let landmarks = Landmarks::default();
        let applied = landmarks.consume(Cursor::new(STREAM), None);
        assert_eq!(applied, 3);

        // later hands update does not clear faces
        let detection = landmarks.detection();
        assert!(detection.hands.is_empty());
        assert_eq!(detection.faces.len(), 1);
        assert_eq!(
            detection.face().unwrap().keypoints.get(1),
            Some(Point::new(2., 2.))
        );
    }

    #[test]
    fn test_reader_thread() {
        let landmarks = Landmarks::default();
        let handle = landmarks
            .spawn_reader(Cursor::new(STREAM.lines().take(1).collect::<String>()), None)
            .unwrap();
        assert_eq!(handle.join().unwrap(), 1);

        let detection = landmarks.detection();
        assert_eq!(detection.hands.len(), 1);
        assert!(detection.face().is_none());
    }

    #[test]
    fn test_empty_before_first_result() {
        let detection = Landmarks::default().detection();
        assert!(detection.hands.is_empty());
        assert!(detection.faces.is_empty());
    }
}
