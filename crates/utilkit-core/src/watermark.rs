//! Text and image watermarks
//!
//! Decoding, resampling, compositing and glyph rasterization are done by the
//! `image`, `imageproc` and `ab_glyph` crates; this module only decides where
//! things go.

use crate::config::ImageFormat;
use crate::error::{Result, UtilkitError};
use crate::utils::validation;
use ab_glyph::{FontArc, PxScale};
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, instrument};

/// Anchor of a watermark inside the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    UpperLeft,
    UpperCenter,
    UpperRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 9] = [
        WatermarkPosition::UpperLeft,
        WatermarkPosition::UpperCenter,
        WatermarkPosition::UpperRight,
        WatermarkPosition::CenterLeft,
        WatermarkPosition::Center,
        WatermarkPosition::CenterRight,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::BottomCenter,
        WatermarkPosition::BottomRight,
    ];
}

impl FromStr for WatermarkPosition {
    type Err = UtilkitError;

    fn from_str(s: &str) -> Result<Self> {
        let position = match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "upper-left" | "top-left" => WatermarkPosition::UpperLeft,
            "upper-center" | "top-center" => WatermarkPosition::UpperCenter,
            "upper-right" | "top-right" => WatermarkPosition::UpperRight,
            "center-left" => WatermarkPosition::CenterLeft,
            "center" => WatermarkPosition::Center,
            "center-right" => WatermarkPosition::CenterRight,
            "bottom-left" => WatermarkPosition::BottomLeft,
            "bottom-center" => WatermarkPosition::BottomCenter,
            "bottom-right" => WatermarkPosition::BottomRight,
            _ => {
                return Err(UtilkitError::InvalidInput {
                    message: format!("Unknown watermark position: {}", s),
                })
            }
        };
        Ok(position)
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Parse `RRGGBB` or `RRGGBBAA`, with or without a leading `#`
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim_start_matches('#');
        let invalid = || UtilkitError::InvalidInput {
            message: format!("Invalid color '{}', expected RRGGBB or RRGGBBAA", hex),
        };
        if !(digits.len() == 6 || digits.len() == 8) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

/// Placement of a watermark box inside a background
#[derive(Debug)]
pub struct PositionCalculator;

impl PositionCalculator {
    /// Top-left corner of a `mark_width` x `mark_height` box anchored at
    /// `position`, kept `h_padding`/`v_padding` away from the edges it is
    /// anchored to
    ///
    /// Coordinates are signed: a mark larger than the background starts
    /// off-canvas and is clipped when drawn.
    pub fn calculate_position(
        position: WatermarkPosition,
        image_width: u32,
        image_height: u32,
        mark_width: u32,
        mark_height: u32,
        h_padding: u32,
        v_padding: u32,
    ) -> (i64, i64) {
        let (iw, ih) = (i64::from(image_width), i64::from(image_height));
        let (mw, mh) = (i64::from(mark_width), i64::from(mark_height));
        let (hp, vp) = (i64::from(h_padding), i64::from(v_padding));

        let left = hp;
        let center_x = (iw - mw) / 2;
        let right = iw - mw - hp;
        let top = vp;
        let center_y = (ih - mh) / 2;
        let bottom = ih - mh - vp;

        match position {
            WatermarkPosition::UpperLeft => (left, top),
            WatermarkPosition::UpperCenter => (center_x, top),
            WatermarkPosition::UpperRight => (right, top),
            WatermarkPosition::CenterLeft => (left, center_y),
            WatermarkPosition::Center => (center_x, center_y),
            WatermarkPosition::CenterRight => (right, center_y),
            WatermarkPosition::BottomLeft => (left, bottom),
            WatermarkPosition::BottomCenter => (center_x, bottom),
            WatermarkPosition::BottomRight => (right, bottom),
        }
    }
}

/// Load a TrueType/OpenType font from disk
pub fn load_font(path: &Path) -> Result<FontArc> {
    if !path.exists() {
        return Err(UtilkitError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    font_from_bytes(std::fs::read(path)?)
}

pub fn font_from_bytes(bytes: Vec<u8>) -> Result<FontArc> {
    FontArc::try_from_vec(bytes).map_err(|e| UtilkitError::InvalidFont {
        message: e.to_string(),
    })
}

/// How a text watermark is drawn
#[derive(Clone)]
pub struct TextMark {
    pub font: FontArc,
    /// Pixel height of the glyphs
    pub size: f32,
    pub color: Color,
    pub position: WatermarkPosition,
    pub h_padding: u32,
    pub v_padding: u32,
}

impl TextMark {
    pub fn new(font: FontArc, size: f32) -> Self {
        Self {
            font,
            size,
            color: Color::white(),
            position: WatermarkPosition::BottomRight,
            h_padding: 0,
            v_padding: 0,
        }
    }
}

impl std::fmt::Debug for TextMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextMark")
            .field("size", &self.size)
            .field("color", &self.color)
            .field("position", &self.position)
            .field("h_padding", &self.h_padding)
            .field("v_padding", &self.v_padding)
            .finish_non_exhaustive()
    }
}

/// Draw `text` onto a copy of `bg`
#[instrument(skip(bg, mark), fields(width = bg.width(), height = bg.height()))]
pub fn mark_text(bg: &DynamicImage, text: &str, mark: &TextMark) -> Result<RgbaImage> {
    if mark.size <= 0.0 || !mark.size.is_finite() {
        return Err(UtilkitError::InvalidInput {
            message: format!("Font size {} must be positive", mark.size),
        });
    }

    let mut canvas = bg.to_rgba8();
    let scale = PxScale::from(mark.size);
    let (text_width, text_height) = imageproc::drawing::text_size(scale, &mark.font, text);
    let (x, y) = PositionCalculator::calculate_position(
        mark.position,
        canvas.width(),
        canvas.height(),
        text_width,
        text_height,
        mark.h_padding,
        mark.v_padding,
    );
    debug!(text_width, text_height, x, y, "drawing text watermark");

    imageproc::drawing::draw_text_mut(
        &mut canvas,
        mark.color.to_rgba(),
        clamp_i32(x),
        clamp_i32(y),
        scale,
        &mark.font,
        text,
    );
    Ok(canvas)
}

/// Overlay `marker`, resized by `scale`, onto a copy of `bg`
#[instrument(skip(bg, marker), fields(width = bg.width(), height = bg.height()))]
pub fn mark_image(
    bg: &DynamicImage,
    marker: &DynamicImage,
    scale: f64,
    position: WatermarkPosition,
    h_padding: u32,
    v_padding: u32,
) -> Result<RgbaImage> {
    let marker = scale_marker(marker, scale)?;
    let mut canvas = bg.to_rgba8();

    let (x, y) = PositionCalculator::calculate_position(
        position,
        canvas.width(),
        canvas.height(),
        marker.width(),
        marker.height(),
        h_padding,
        v_padding,
    );
    debug!(x, y, marker_width = marker.width(), marker_height = marker.height(), "overlaying watermark");

    imageops::overlay(&mut canvas, &marker, x, y);
    Ok(canvas)
}

fn scale_marker(marker: &DynamicImage, scale: f64) -> Result<RgbaImage> {
    validation::validate_scale(scale)?;
    if (scale - 1.0).abs() < f64::EPSILON {
        return Ok(marker.to_rgba8());
    }

    let width = (f64::from(marker.width()) * scale) as u32;
    let height = (f64::from(marker.height()) * scale) as u32;
    if width == 0 || height == 0 {
        return Err(UtilkitError::InvalidInput {
            message: format!(
                "Scale {} shrinks a {}x{} watermark to nothing",
                scale,
                marker.width(),
                marker.height()
            ),
        });
    }
    Ok(marker.resize_exact(width, height, FilterType::Lanczos3).to_rgba8())
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Encode an image, using `quality` for lossy formats
///
/// WebP is lossy below quality 100 and lossless at 100.
pub fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    validation::validate_quality(quality)?;
    let mut buffer = Cursor::new(Vec::new());

    match format {
        ImageFormat::Png => img.write_to(&mut buffer, image::ImageFormat::Png)?,
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImageFormat::WebP => return encode_webp(img, quality),
    }

    Ok(buffer.into_inner())
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let lossless = quality == 100;
    let encoded = encoder
        .encode_simple(lossless, f32::from(quality))
        .map_err(|e| UtilkitError::ProcessingFailed {
            message: format!("WebP encoding failed: {:?}", e),
        })?;
    debug!(quality, lossless, bytes = encoded.len(), "encoded webp");
    Ok(encoded.to_vec())
}

/// A reusable image watermark
///
/// Stamps the same marker onto many images; cheap to clone.
#[derive(Debug, Clone)]
pub struct Watermarker {
    marker: Arc<DynamicImage>,
    scale: f64,
    position: WatermarkPosition,
    h_padding: u32,
    v_padding: u32,
    quality: u8,
}

impl Watermarker {
    /// Stamp `marker` at the upper-left corner, unscaled, with quality 70
    pub fn new(marker: DynamicImage) -> Self {
        Self {
            marker: Arc::new(marker),
            scale: 1.0,
            position: WatermarkPosition::UpperLeft,
            h_padding: 0,
            v_padding: 0,
            quality: 70,
        }
    }

    /// Decode a base64 encoded PNG watermark
    pub fn from_base64_png(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(UtilkitError::InvalidInput {
                message: "empty watermark image".to_string(),
            });
        }
        let data = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let marker = image::load_from_memory_with_format(&data, image::ImageFormat::Png)?;
        Ok(Self::new(marker))
    }

    pub fn with_placement(mut self, position: WatermarkPosition, scale: f64, h_padding: u32, v_padding: u32) -> Result<Self> {
        validation::validate_scale(scale)?;
        self.position = position;
        self.scale = scale;
        self.h_padding = h_padding;
        self.v_padding = v_padding;
        Ok(self)
    }

    pub fn with_quality(mut self, quality: u8) -> Result<Self> {
        validation::validate_quality(quality)?;
        self.quality = quality;
        Ok(self)
    }

    pub fn marker(&self) -> &DynamicImage {
        &self.marker
    }

    pub fn mark(&self, bg: &DynamicImage) -> Result<RgbaImage> {
        mark_image(bg, &self.marker, self.scale, self.position, self.h_padding, self.v_padding)
    }

    /// Decode `bg`, stamp the watermark and encode as `format`
    /// (`png`, `jpg`/`jpeg` or `webp`)
    pub fn mark_bytes(&self, bg: &[u8], format: &str) -> Result<Vec<u8>> {
        let format: ImageFormat = format.parse()?;
        let decoded = image::load_from_memory(bg)?;
        let marked = self.mark(&decoded)?;
        encode(&DynamicImage::ImageRgba8(marked), format, self.quality)
    }

    /// [`Watermarker::mark_bytes`] on the blocking thread pool
    pub async fn mark_bytes_async(&self, bg: Vec<u8>, format: String) -> Result<Vec<u8>> {
        let watermarker = self.clone();
        task::spawn_blocking(move || watermarker.mark_bytes(&bg, &format))
            .await
            .map_err(|e| UtilkitError::ProcessingFailed {
                message: format!("Task join error: {}", e),
            })?
    }
}
