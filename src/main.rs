#![warn(unused_extern_crates)]
use anyhow::{Context, Result};
use clap::{Args, Parser};
use eyespawn::config::Settings;
use eyespawn::draw::Overlay;
use eyespawn::landmarks::{DetectorProcess, Landmarks};
use eyespawn::session::Session;
use image::RgbaImage;
use keys::{Controls, CrlfWriter, KeyListener};
use nokhwa::pixel_format::RgbAFormat;
use std::fs::File;
use std::io::{BufRead, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{Level, debug, error, info, span, trace, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use video::{OutputVideoStream, create_input_stream};

mod keys;
mod video;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CmdArgs {
    /// Target frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Camera index. Uses the last camera found if unset
    #[arg(long)]
    camera: Option<u32>,

    /// Settings file (JSON) to read from
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Landmark detector command. Receives raw RGBA frames on stdin
    #[arg(long, conflicts_with = "landmarks")]
    detector: Option<String>,

    /// Replay landmark JSON lines from a file, or - for stdin
    #[arg(long, value_name = "FILE")]
    landmarks: Option<PathBuf>,

    #[command(flatten)]
    out: Out,

    /// Process single input frame, reading from input path
    #[arg(short, long, requires = "output")]
    input: Option<PathBuf>,

    /// Seed for eye placement
    #[arg(long)]
    seed: Option<u64>,

    /// Drop the oldest spawned eyes beyond this many
    #[arg(long)]
    max_eyes: Option<usize>,

    /// Show the eye aspect ratio
    #[arg(long)]
    show_ear: bool,

    /// Font used for labels
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Width of the preview window
    #[arg(long)]
    display_width: Option<u32>,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct Out {
    /// Loopback device to write to. Displays in window if unset
    #[arg(group = "dest", short, long)]
    device: Option<String>,

    /// Process single input frame, writing to output path
    #[arg(group = "dest", short, long, requires = "input")]
    output: Option<PathBuf>,
}

impl CmdArgs {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;

        if let Some(seed) = self.seed {
            settings.seed = Some(seed);
        }
        if let Some(max) = self.max_eyes {
            settings.max_spawned_eyes = Some(max);
        }
        if self.show_ear {
            settings.show_ear = true;
        }
        if let Some(font) = &self.font {
            settings.font_path = font.clone();
        }
        if let Some(width) = self.display_width {
            settings.display_width = width;
        }

        Ok(settings)
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    let crlf = std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(move || CrlfWriter::new(std::io::stderr(), crlf))
        .init();

    let args = CmdArgs::parse();
    let settings = args.settings()?;
    debug!("{settings:?}");

    let overlay = Overlay::load(&settings.font_path);
    debug!("Labels enabled: {}", overlay.has_font());
    let mut session = Session::new(&settings, overlay);

    if let (Some(input), Some(output)) = (&args.input, &args.out.output) {
        // Process single image at file and exit
        return process_image(input, output, args.landmarks.as_deref(), &mut session);
    }

    let mut camera = create_input_stream(args.fps, args.camera)?;
    let resolution = camera.resolution();
    let (width, height) = (resolution.width(), resolution.height());
    let mut output_stream =
        OutputVideoStream::new(width, height, args.out.device.clone(), settings.display_width)?;

    let landmarks = Landmarks::default();
    let detector = match (&args.detector, &args.landmarks) {
        (Some(command), _) => Some(DetectorProcess::spawn(command, width, height, &landmarks)?),
        (None, Some(path)) => {
            // pace file replays to the frame rate, stdin is already live
            let pace = (path != Path::new("-")).then(|| Duration::from_secs(1) / args.fps.max(1));
            landmarks.spawn_reader(open_landmarks(path)?, pace)?;
            None
        }
        (None, None) => {
            warn!("No detector or landmark stream given, effects stay idle");
            None
        }
    };

    let keys = KeyListener::start()?;
    let mut controls = Controls::default();

    loop {
        let span = span!(Level::INFO, "frame_loop_iter");
        let _guard = span.enter();

        if let Some(keys) = &keys {
            keys.try_iter().for_each(|action| controls.handle(action));
        }
        if controls.quit {
            info!("Quitting");
            break;
        }
        session.set_hand_dots(controls.hand_dots);

        let get_frame_span = span!(Level::DEBUG, "get_frame");
        let get_frame_guard = get_frame_span.enter();
        let frame = match camera.frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to pull frame from webcam: {e:?}");
                break;
            }
        };
        drop(get_frame_guard);

        let decode_span = span!(Level::DEBUG, "decode_nokwha_buff");
        let decode_guard = decode_span.enter();
        let input_img: RgbaImage = match frame.decode_image::<RgbAFormat>() {
            Ok(img) => img,
            Err(e) => {
                error!("Failed to decode frame: {e:?}");
                continue;
            }
        };
        drop(decode_guard);

        if let Some(detector) = &detector {
            if !detector.submit(&input_img) {
                trace!("Detector busy, frame not submitted");
            }
        }

        let rendered = session.render(&input_img, &landmarks.detection(), Instant::now());
        if rendered.triggered {
            debug!("Blink at face box {:?}", rendered.face_box);
        }
        if rendered.spawned > 0 {
            debug!("{} eyes spawned", rendered.spawned);
        }
        trace!("{} hands pixelated", rendered.hands_pixelated);

        let write_frame_span = span!(Level::DEBUG, "write_frame");
        let write_frame_guard = write_frame_span.enter();
        match output_stream.write_frame(rendered.image) {
            Ok(_) => trace!("Rendered frame."),
            Err(e) => error!("Failed to render frame: {e:?}"),
        }
        drop(write_frame_guard);
    }

    // restore the terminal before tearing down the rest
    drop(keys);
    camera.stop_stream()?;

    Ok(())
}

fn open_landmarks(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open landmarks {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn process_image(
    src: &Path,
    dest: &Path,
    landmarks_path: Option<&Path>,
    session: &mut Session,
) -> Result<()> {
    let img = image::open(src)?.into_rgba8();

    let landmarks = Landmarks::default();
    if let Some(path) = landmarks_path {
        let applied = landmarks.consume(open_landmarks(path)?, None);
        debug!("Applied {applied} landmark messages");
    }

    let start = Instant::now();
    let rendered = session.render(&img, &landmarks.detection(), start);
    debug!("Took {:?}", start.elapsed());

    rendered.image.save(dest)?;
    info!("Result at {:?}", dest);
    Ok(())
}
