//! Caption overlay applied to every generated scene.
//!
//! The caption is drawn the way a 2D canvas `fillText` would draw it with
//! `textAlign = right`, `textBaseline = bottom` and a blurred drop shadow:
//! the shadow pass goes first, then the fill, both blended source-over onto
//! the untouched original pixels.

use crate::error::{Result, SceneError};
use crate::image::types::WatermarkedImage;
use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use ::image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use std::io::Cursor;

/// Caption written onto every result.
pub const DEFAULT_CAPTION: &str = "Hội xe đạp thể thao Biên Hòa";

/// Smallest font size, in pixels, regardless of image width.
pub const MIN_FONT_SIZE: u32 = 16;

/// Image width is divided by this to get the font size.
const WIDTH_TO_FONT_RATIO: u32 = 45;

static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Font size in pixels for an image of the given width.
pub fn font_size_for_width(width: u32) -> u32 {
    (width / WIDTH_TO_FONT_RATIO).max(MIN_FONT_SIZE)
}

/// Colors and text of the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    /// Text to draw.
    pub caption: String,
    /// Fill color (RGB).
    pub fill: [u8; 3],
    /// Fill opacity in `0.0..=1.0`.
    pub fill_opacity: f32,
    /// Shadow color (RGB).
    pub shadow: [u8; 3],
    /// Shadow opacity in `0.0..=1.0`.
    pub shadow_opacity: f32,
    /// Shadow blur radius in canvas units (Gaussian sigma is half of it).
    pub shadow_blur: f32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            caption: DEFAULT_CAPTION.to_string(),
            fill: [255, 255, 255],
            fill_opacity: 0.6,
            shadow: [0, 0, 0],
            shadow_opacity: 0.7,
            shadow_blur: 5.0,
        }
    }
}

/// Builder for [`Watermarker`].
#[derive(Debug, Clone, Default)]
pub struct WatermarkerBuilder {
    style: WatermarkStyle,
    font: Option<Vec<u8>>,
}

impl WatermarkerBuilder {
    /// Creates a builder with the default caption, colors and font.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the caption text.
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.style.caption = caption.into();
        self
    }

    /// Replaces the whole style.
    pub fn style(mut self, style: WatermarkStyle) -> Self {
        self.style = style;
        self
    }

    /// Uses a different TrueType/OpenType font instead of the bundled bold face.
    pub fn font_bytes(mut self, data: Vec<u8>) -> Self {
        self.font = Some(data);
        self
    }

    /// Parses the font and builds the watermarker.
    pub fn build(self) -> Result<Watermarker> {
        let font = match self.font {
            Some(data) => FontArc::try_from_vec(data),
            None => FontArc::try_from_slice(DEFAULT_FONT),
        }
        .map_err(|e| SceneError::Compositing(format!("font unavailable: {e}")))?;

        Ok(Watermarker {
            font,
            style: self.style,
        })
    }
}

/// Draws the caption onto images and re-encodes them as PNG.
#[derive(Clone)]
pub struct Watermarker {
    font: FontArc,
    style: WatermarkStyle,
}

impl std::fmt::Debug for Watermarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watermarker")
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl Watermarker {
    /// Creates a watermarker with the default style and bundled font.
    pub fn new() -> Result<Self> {
        WatermarkerBuilder::new().build()
    }

    /// Creates a new `WatermarkerBuilder`.
    pub fn builder() -> WatermarkerBuilder {
        WatermarkerBuilder::new()
    }

    /// Style in use.
    pub fn style(&self) -> &WatermarkStyle {
        &self.style
    }

    /// Decodes `bytes`, draws the caption in the bottom-right corner and
    /// returns the result as PNG.
    pub fn apply(&self, bytes: &[u8]) -> Result<WatermarkedImage> {
        let decoded = ::image::load_from_memory(bytes)?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(SceneError::Compositing(format!(
                "cannot draw on a {width}x{height} surface"
            )));
        }

        let mut canvas: RgbaImage = decoded.to_rgba8();
        self.draw_caption(&mut canvas)?;

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png)?;

        tracing::debug!(width, height, bytes = png.len(), "watermark applied");
        Ok(WatermarkedImage { png, width, height })
    }

    fn draw_caption(&self, canvas: &mut RgbaImage) -> Result<()> {
        let (width, height) = canvas.dimensions();
        let font_size = font_size_for_width(width) as f32;
        let padding = font_size;

        // Canvas font sizes are em sizes; ab_glyph scales by ascent - descent.
        let units_per_em = self
            .font
            .units_per_em()
            .ok_or_else(|| SceneError::Compositing("font has no units-per-em".into()))?;
        let scale = PxScale::from(font_size * self.font.height_unscaled() / units_per_em);
        let scaled = self.font.as_scaled(scale);

        let mut advance = 0.0f32;
        let mut last = None;
        let mut laid_out = Vec::new();
        for ch in self.style.caption.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                advance += scaled.kern(prev, id);
            }
            laid_out.push((id, advance));
            advance += scaled.h_advance(id);
            last = Some(id);
        }

        let right = width as f32 - padding;
        let baseline = height as f32 - padding + scaled.descent();
        let start_x = right - advance;

        let outlined: Vec<_> = laid_out
            .into_iter()
            .filter_map(|(id, x)| {
                self.font
                    .outline_glyph(id.with_scale_and_position(scale, point(start_x + x, baseline)))
            })
            .collect();
        if outlined.is_empty() {
            return Ok(());
        }

        let sigma = self.style.shadow_blur / 2.0;
        let margin = (sigma * 3.0).ceil() as i64 + 1;

        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for glyph in &outlined {
            let b = glyph.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }

        let origin_x = min_x.floor() as i64 - margin;
        let origin_y = min_y.floor() as i64 - margin;
        let mask_w = (max_x.ceil() as i64 - min_x.floor() as i64 + 2 * margin).max(1) as u32;
        let mask_h = (max_y.ceil() as i64 - min_y.floor() as i64 + 2 * margin).max(1) as u32;

        let mut mask = GrayImage::new(mask_w, mask_h);
        for glyph in &outlined {
            let b = glyph.px_bounds();
            let gx = b.min.x as i64 - origin_x;
            let gy = b.min.y as i64 - origin_y;
            glyph.draw(|x, y, coverage| {
                let mx = gx + x as i64;
                let my = gy + y as i64;
                if mx < 0 || my < 0 || mx >= mask_w as i64 || my >= mask_h as i64 {
                    return;
                }
                let px = mask.get_pixel_mut(mx as u32, my as u32);
                let existing = px[0] as f32 / 255.0;
                let combined = 1.0 - (1.0 - existing) * (1.0 - coverage.clamp(0.0, 1.0));
                *px = Luma([(combined * 255.0).round() as u8]);
            });
        }

        let shadow = if sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&mask, sigma)
        } else {
            mask.clone()
        };

        // The shadow is cast by the translucent fill, so it inherits the fill opacity.
        let shadow_alpha = self.style.shadow_opacity * self.style.fill_opacity;
        composite_mask(canvas, &shadow, origin_x, origin_y, self.style.shadow, shadow_alpha);
        composite_mask(
            canvas,
            &mask,
            origin_x,
            origin_y,
            self.style.fill,
            self.style.fill_opacity,
        );
        Ok(())
    }
}

fn composite_mask(
    canvas: &mut RgbaImage,
    mask: &GrayImage,
    origin_x: i64,
    origin_y: i64,
    color: [u8; 3],
    opacity: f32,
) {
    let (width, height) = canvas.dimensions();
    for (mx, my, coverage) in mask.enumerate_pixels() {
        if coverage[0] == 0 {
            continue;
        }
        let x = origin_x + mx as i64;
        let y = origin_y + my as i64;
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            continue;
        }
        let alpha = opacity * coverage[0] as f32 / 255.0;
        blend_over(canvas.get_pixel_mut(x as u32, y as u32), color, alpha);
    }
}

/// Source-over blend of a solid color with straight (non-premultiplied) alpha.
fn blend_over(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let dst_alpha = dst[3] as f32 / 255.0;
    let out_alpha = alpha + dst_alpha * (1.0 - alpha);
    if out_alpha <= 0.0 {
        return;
    }
    for i in 0..3 {
        let c = (src[i] as f32 * alpha + dst[i] as f32 * dst_alpha * (1.0 - alpha)) / out_alpha;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}
