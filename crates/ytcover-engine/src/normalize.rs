use std::env;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::{CoverError, Result};

pub const COVER_JPEG_QUALITY: u8 = 90;

/// Reshapes provider output into a 16:9 JPEG cover and persists it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decodes `raw`, stretches it onto a `W x round(W * 9 / 16)` white canvas
    /// and writes it as JPEG into `output_dir`.
    ///
    /// The image is fully encoded before the filesystem is touched, so an
    /// undecodable payload leaves neither a file nor a directory behind.
    pub fn normalize_and_save(
        &self,
        raw: &[u8],
        output_dir: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf> {
        let source = image::load_from_memory(raw).map_err(CoverError::Decode)?;
        let encoded = encode_cover(&source)?;

        let filename = filename
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_cover_filename);

        fs::create_dir_all(output_dir).map_err(|err| CoverError::io(output_dir, err))?;
        let output_dir =
            fs::canonicalize(output_dir).map_err(|err| CoverError::io(output_dir, err))?;
        let path = output_dir.join(filename);

        if let Err(err) = fs::write(&path, &encoded) {
            let _ = fs::remove_file(&path);
            return Err(CoverError::io(path, err));
        }
        Ok(path)
    }

    pub fn to_base64(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|err| CoverError::io(path, err))?;
        Ok(BASE64.encode(bytes))
    }

    pub fn mime_type_for(&self, path: &Path) -> &'static str {
        mime_type_for(path)
    }

    /// Copies the image verbatim onto a transparent RGBA canvas of the same
    /// size and saves it as PNG in the system temp directory.
    pub fn convert_to_png_with_alpha(&self, path: &Path) -> Result<PathBuf> {
        let bytes = fs::read(path).map_err(|err| CoverError::io(path, err))?;
        let source = image::load_from_memory(&bytes).map_err(CoverError::Decode)?;

        let mut canvas =
            RgbaImage::from_pixel(source.width(), source.height(), Rgba([0, 0, 0, 0]));
        imageops::replace(&mut canvas, &source.to_rgba8(), 0, 0);

        let mut encoded = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(CoverError::Encode)?;

        let target = env::temp_dir().join(format!("img_conv_{}.png", unique_token()));
        fs::write(&target, encoded).map_err(|err| CoverError::io(&target, err))?;
        Ok(target)
    }
}

/// Height of a 16:9 canvas for `width`, rounded half away from zero.
pub fn cover_height(width: u32) -> u32 {
    let scaled = (u64::from(width) * 9 + 8) / 16;
    scaled.max(1) as u32
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn default_cover_filename() -> String {
    format!("cover_{}_{}.jpeg", chrono::Utc::now().timestamp(), unique_token())
}

/// `<prefix>_<unixtime>_<token>.jpg`, used for provider output.
pub(crate) fn provider_cover_filename(prefix: &str) -> String {
    let token = unique_token();
    format!(
        "{prefix}_{}_{}.jpg",
        chrono::Utc::now().timestamp(),
        &token[..12]
    )
}

fn unique_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn encode_cover(source: &DynamicImage) -> Result<Vec<u8>> {
    let width = source.width();
    let height = cover_height(width);

    let rgba = source.to_rgba8();
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }

    let canvas = DynamicImage::ImageRgba8(flattened)
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, COVER_JPEG_QUALITY);
    encoder.encode_image(&canvas).map_err(CoverError::Encode)?;
    Ok(bytes)
}
