//! QR code rendering.
//!
//! The QR symbol itself comes from the `qrcode` crate. This module lays the
//! symbol out on a square target (quiet zone, integer scaling, centering)
//! and converts the resulting bit matrix into an RGBA bitmap, one pixel per
//! matrix cell.

use crate::{Error, Result};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use tracing::{debug, warn};

/// Side length requested when the caller has no preference.
pub const DEFAULT_QR_SIZE: u32 = 512;

/// Largest side length accepted by configuration.
pub const MAX_QR_SIZE: u32 = 4096;

/// Light modules kept around the symbol on every side.
pub const QUIET_ZONE: u32 = 4;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Square matrix of dark (`true`) and light (`false`) cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: u32,
    bits: Vec<bool>,
}

impl BitMatrix {
    fn new(width: u32) -> Self {
        let width_usize = width as usize;
        Self {
            width,
            bits: vec![false; width_usize * width_usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    fn set_region(&mut self, left: u32, top: u32, size: u32) {
        for y in top..top + size {
            let start = self.index(left, y);
            self.bits[start..start + size as usize].fill(true);
        }
    }
}

/// A rendered QR code: square, black on white, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrBitmap {
    image: RgbaImage,
}

impl QrBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encodes the bitmap as a PNG file.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(png)
    }
}

impl From<&BitMatrix> for QrBitmap {
    fn from(matrix: &BitMatrix) -> Self {
        let image = RgbaImage::from_fn(matrix.width(), matrix.width(), |x, y| {
            if matrix.get(x, y) { BLACK } else { WHITE }
        });
        Self { image }
    }
}

/// Encodes `content` as UTF-8 bytes and lays the symbol out on a
/// `size × size` matrix.
///
/// The symbol plus its quiet zone is scaled by the largest integer factor
/// that fits and centered. Fails with [`Error::QrDoesNotFit`] when even a
/// factor of one needs more than `size` cells.
pub fn render_matrix(content: &str, size: u32) -> Result<BitMatrix> {
    // Raw byte mode without an ECI header: non-ASCII text relies on the
    // scanner assuming UTF-8, which the common scanning apps do.
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::L)?;
    let input_width = code.width() as u32;
    let colors = code.to_colors();

    let qr_width = input_width + QUIET_ZONE * 2;
    if qr_width > size {
        return Err(Error::QrDoesNotFit {
            needed: qr_width,
            size,
        });
    }
    let multiple = size / qr_width;
    let padding = (size - input_width * multiple) / 2;

    let mut matrix = BitMatrix::new(size);
    for (index, color) in colors.iter().enumerate() {
        if *color == Color::Dark {
            let x = index as u32 % input_width;
            let y = index as u32 / input_width;
            matrix.set_region(padding + x * multiple, padding + y * multiple, multiple);
        }
    }

    debug!(
        version_width = input_width,
        size, multiple, "Laid out QR matrix"
    );
    Ok(matrix)
}

/// Renders `content` into a bitmap of `size × size` pixels.
///
/// Encoder failures (content too long for the symbol capacity, or a symbol
/// wider than `size`) are logged and reported as `None`.
pub fn render(content: &str, size: u32) -> Option<QrBitmap> {
    match render_matrix(content, size) {
        Ok(matrix) => Some(QrBitmap::from(&matrix)),
        Err(e) => {
            warn!(content_len = content.len(), size, "QR rendering failed: {}", e);
            None
        }
    }
}
