use crate::shapes::{Point, Rect};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::trace;

/// Size of the downsampled buffer for a `w` x `h` region.
pub fn block_dims(w: f32, h: f32, block: u32) -> Option<(u32, u32)> {
    if block == 0 {
        return None;
    }

    let dw = (w / block as f32).ceil();
    let dh = (h / block as f32).ceil();
    if dw <= 0. || dh <= 0. {
        return None;
    }

    Some((dw as u32, dh as u32))
}

/// Blocky copy of `region` of `source`, drawn onto `canvas` at the same spot.
/// Returns the downsampled dims, or `None` when the region is degenerate.
pub fn pixelate(
    source: &RgbaImage,
    canvas: &mut RgbaImage,
    region: Rect,
    block: u32,
) -> Option<(u32, u32)> {
    let (dw, dh) = block_dims(region.w, region.h, block)?;
    let px = region.to_pixels(source.width(), source.height())?;

    let view = imageops::crop_imm(source, px.x, px.y, px.w, px.h).to_image();
    let small = imageops::resize(&view, dw, dh, FilterType::Nearest);
    let blocky = imageops::resize(&small, px.w, px.h, FilterType::Nearest);
    imageops::replace(canvas, &blocky, px.x as i64, px.y as i64);

    trace!("Pixelated {px:?} via {dw}x{dh}");
    Some((dw, dh))
}

/// Pixelation of the padded bounding box around a set of landmarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixelation {
    pub padding: f32,
    pub block: u32,
}

impl Pixelation {
    pub fn new(padding: f32, block: u32) -> Self {
        Self { padding, block }
    }

    pub fn region(&self, points: impl IntoIterator<Item = Point>, frame: &RgbaImage) -> Option<Rect> {
        Rect::bounding(points, self.padding, frame.width(), frame.height())
    }

    pub fn apply(
        &self,
        source: &RgbaImage,
        canvas: &mut RgbaImage,
        points: impl IntoIterator<Item = Point>,
    ) -> Option<(u32, u32)> {
        let region = self.region(points, source)?;
        pixelate(source, canvas, region, self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashSet;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]))
    }

    #[test]
    fn test_block_dims() {
        assert_eq!(block_dims(37., 20., 18), Some((3, 2)));
        assert_eq!(block_dims(36., 18., 18), Some((2, 1)));
        assert_eq!(block_dims(0.5, 0.5, 15), Some((1, 1)));
        assert_eq!(block_dims(0., 20., 18), None);
        assert_eq!(block_dims(20., 20., 0), None);
    }

    #[test]
    fn test_pixelate_dims_repeatable() {
        let source = gradient(200, 100);
        let region = Rect::new(10., 10., 37., 20.);

        let mut a = source.clone();
        let mut b = source.clone();
        assert_eq!(pixelate(&source, &mut a, region, 18), Some((3, 2)));
        assert_eq!(pixelate(&source, &mut b, region, 18), Some((3, 2)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_pixelate_blocks() {
        let source = gradient(200, 100);
        let mut canvas = source.clone();
        let region = Rect::new(20., 30., 60., 45.);

        let (dw, dh) = pixelate(&source, &mut canvas, region, 15).unwrap();
        assert_eq!((dw, dh), (4, 3));

        let colors: HashSet<_> = (30..75)
            .flat_map(|y| (20..80).map(move |x| (x, y)))
            .map(|(x, y)| canvas.get_pixel(x, y).0)
            .collect();
        assert!(colors.len() <= (dw * dh) as usize);

        // outside the region is untouched
        assert_eq!(canvas.get_pixel(19, 30), source.get_pixel(19, 30));
        assert_eq!(canvas.get_pixel(80, 74), source.get_pixel(80, 74));
    }

    #[test]
    fn test_pixelate_reads_source_not_canvas() {
        let source = gradient(100, 100);
        let mut canvas = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        pixelate(&source, &mut canvas, Rect::new(0., 0., 50., 50.), 10).unwrap();

        assert_ne!(canvas.get_pixel(45, 45).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_pixelate_degenerate() {
        let source = gradient(100, 100);
        let mut canvas = source.clone();

        assert!(pixelate(&source, &mut canvas, Rect::new(10., 10., 0., 30.), 10).is_none());
        assert!(pixelate(&source, &mut canvas, Rect::new(150., 10., 30., 30.), 10).is_none());
        assert_eq!(canvas, source);
    }

    #[test]
    fn test_pixelation_apply() {
        let source = gradient(200, 200);
        let mut canvas = source.clone();
        let hand = Pixelation::new(20., 18);

        let points = [Point::new(50., 60.), Point::new(90., 100.)];
        assert_eq!(
            hand.region(points, &source),
            Some(Rect::new(30., 40., 80., 80.))
        );
        assert_eq!(hand.apply(&source, &mut canvas, points), Some((5, 5)));
        assert!(hand.apply(&source, &mut canvas, Vec::<Point>::new()).is_none());
    }
}
