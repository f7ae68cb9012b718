use anyhow::{Error, Result};
use eyespawn::process::stop_child;
use image::{EncodableLayout, RgbaImage};
use tracing::{debug, info};

use std::io::Write;
use std::process::{Command, Stdio};

use nokhwa::{
    Camera, nokhwa_initialize,
    pixel_format::RgbAFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
};

/// Open a camera, the last one found unless `index` picks one.
pub fn create_input_stream(fps: u32, index: Option<u32>) -> Result<Camera> {
    nokhwa_initialize(|granted| {
        debug!("User said {}", granted);
    });

    let cameras = query(ApiBackend::Auto)?;
    cameras
        .iter()
        .for_each(|cam| debug!("Found camera: {:?}", cam));

    let index = match index {
        Some(i) => CameraIndex::Index(i),
        None => cameras
            .last()
            .ok_or_else(|| Error::msg("No camera found"))?
            .index()
            .clone(),
    };

    let mut camera = Camera::new(
        index,
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
    )?;

    camera.set_frame_rate(fps)?;
    camera.open_stream()?;

    let resolution = camera.resolution();
    info!(
        "Camera open at {}x{}",
        resolution.width(),
        resolution.height()
    );
    Ok(camera)
}

/// ffplay filter fitting the window to `display_width`, `None` if it already fits.
fn display_scale(width: u32, display_width: u32) -> Option<String> {
    if display_width == 0 || width <= display_width {
        return None;
    }

    Some(format!("scale={display_width}:-2"))
}

pub struct OutputVideoStream {
    output_proc: std::process::Child,
}

impl Drop for OutputVideoStream {
    fn drop(&mut self) {
        stop_child(&mut self.output_proc, "output");
    }
}

impl OutputVideoStream {
    pub fn new(width: u32, height: u32, device: Option<String>, display_width: u32) -> Result<Self> {
        let size = format!("{}x{}", width, height);
        let mut command = match device {
            Some(d) => {
                let mut command = Command::new("ffmpeg");
                command.args([
                    "-f",
                    "rawvideo",
                    "-pix_fmt",
                    "rgba",
                    "-s",
                    &size,
                    "-i",
                    "-",
                    "-map",
                    "0:v",
                    "-preset",
                    "fast",
                    "-vf",
                    "format=yuv420p",
                    "-f",
                    "v4l2",
                    &format!("/dev/{d}"),
                ]);
                command
            }
            None => {
                let mut command = Command::new("ffplay");
                command.args([
                    "-f",
                    "rawvideo",
                    "-pixel_format",
                    "rgba",
                    "-video_size",
                    &size,
                    "-fflags",
                    "nobuffer",
                    "-flags",
                    "low_delay",
                ]);
                if let Some(scale) = display_scale(width, display_width) {
                    command.args(["-vf", &scale]);
                }
                command.arg("-");
                command
            }
        };
        let output_proc = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { output_proc })
    }

    pub fn write_frame(&mut self, img: RgbaImage) -> Result<()> {
        if let Some(stdin) = self.output_proc.stdin.as_mut() {
            stdin.write_all(img.as_bytes())?;
        }

        Ok(())
    }
}
