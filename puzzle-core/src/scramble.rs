use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, Pixel, Rgba,
    RgbaImage,
};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest edge, in pixels, of every stored rendition.
pub const DEFAULT_MAX_EDGE: u32 = 1000;
pub const DEFAULT_QUALITY: u8 = 90;

// Black at 20% opacity.
const GRID_LINE: Rgba<u8> = Rgba([0, 0, 0, 51]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScrambleError {
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
    #[error("image is {width}x{height}, too small for a {grid}x{grid} grid")]
    InvalidDimensions { width: u32, height: u32, grid: u32 },
}

/// Number of cells along each side of the scramble lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSize(u32);

impl GridSize {
    pub const FIFTEEN: GridSize = GridSize(15);
    pub const TEN: GridSize = GridSize(10);
    pub const FIVE: GridSize = GridSize(5);

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

/// The four stored renditions of a puzzle image, coarsest scramble first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Grid15,
    Grid10,
    Grid5,
    Original,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Grid15,
        Variant::Grid10,
        Variant::Grid5,
        Variant::Original,
    ];

    pub fn grid_size(self) -> Option<GridSize> {
        match self {
            Variant::Grid15 => Some(GridSize::FIFTEEN),
            Variant::Grid10 => Some(GridSize::TEN),
            Variant::Grid5 => Some(GridSize::FIVE),
            Variant::Original => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Grid15 => "grid15",
            Variant::Grid10 => "grid10",
            Variant::Grid5 => "grid5",
            Variant::Original => "original",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/webp" => Some(OutputFormat::WebP),
            "image/jpeg" => Some(OutputFormat::Jpeg),
            "image/png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ScrambleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            other => Err(ScrambleError::Encode(format!(
                "unsupported output format `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPos {
    pub x: u32,
    pub y: u32,
}

/// Every cell of the lattice in row-major order.
pub fn cell_positions(grid: GridSize) -> Vec<CellPos> {
    let n = grid.get();
    (0..n)
        .flat_map(|y| (0..n).map(move |x| CellPos { x, y }))
        .collect()
}

/// A fresh uniformly random permutation of [`cell_positions`].
pub fn shuffled_cells<R: Rng + ?Sized>(grid: GridSize, rng: &mut R) -> Vec<CellPos> {
    let mut cells = cell_positions(grid);
    cells.shuffle(rng);
    cells
}

/// Decodes any supported container into RGBA8, honouring EXIF orientation.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, ScrambleError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(decode_error)?;
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().map_err(decode_error)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);
    Ok(image.into_rgba8())
}

fn decode_error(err: impl fmt::Display) -> ScrambleError {
    ScrambleError::Decode(err.to_string())
}

/// Encodes `image` in `format`. `quality` (1-100) drives the lossy JPEG and
/// WebP codecs; PNG ignores it.
pub fn encode(image: &RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, ScrambleError> {
    let (width, height) = image.dimensions();
    let mut out = Vec::new();
    let written = match format {
        OutputFormat::Jpeg => {
            // JPEG carries no alpha channel.
            let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => PngEncoder::new(&mut out).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::WebP => {
            let encoded = webp::Encoder::from_rgba(image.as_raw(), width, height)
                .encode_simple(false, f32::from(quality.clamp(1, 100)))
                .map_err(|err| ScrambleError::Encode(format!("webp: {err:?}")))?;
            return Ok(encoded.to_vec());
        }
    };
    written.map_err(|err| ScrambleError::Encode(err.to_string()))?;
    Ok(out)
}

/// Uniformly downscales so the longer edge is at most `max_edge`. Never
/// enlarges; a `max_edge` of zero disables the cap.
pub fn normalize(image: &RgbaImage, max_edge: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if max_edge == 0 || longest <= max_edge {
        return image.clone();
    }
    let scale = f64::from(max_edge) / f64::from(longest);
    let next_width = ((f64::from(width) * scale).round().max(1.0) as u32).min(max_edge);
    let next_height = ((f64::from(height) * scale).round().max(1.0) as u32).min(max_edge);
    imageops::resize(image, next_width, next_height, FilterType::Lanczos3)
}

/// Builds the scrambled, grid-lined canvas without encoding it.
///
/// The output is `floor(w / n) * n` by `floor(h / n) * n`; remainder pixels
/// on the right and bottom edges are dropped.
pub fn scramble_canvas<R: Rng + ?Sized>(
    image: &RgbaImage,
    grid: GridSize,
    rng: &mut R,
) -> Result<RgbaImage, ScrambleError> {
    let (width, height) = image.dimensions();
    let n = grid.get();
    if width < n || height < n {
        return Err(ScrambleError::InvalidDimensions {
            width,
            height,
            grid: n,
        });
    }

    let cell_width = width / n;
    let cell_height = height / n;
    let sources = cell_positions(grid);
    let targets = shuffled_cells(grid, rng);

    let mut canvas = RgbaImage::new(cell_width * n, cell_height * n);
    for (from, to) in sources.iter().zip(&targets) {
        let cell = imageops::crop_imm(
            image,
            from.x * cell_width,
            from.y * cell_height,
            cell_width,
            cell_height,
        )
        .to_image();
        imageops::replace(
            &mut canvas,
            &cell,
            i64::from(to.x * cell_width),
            i64::from(to.y * cell_height),
        );
    }

    draw_grid_lines(&mut canvas, grid, cell_width, cell_height);
    Ok(canvas)
}

fn draw_grid_lines(canvas: &mut RgbaImage, grid: GridSize, cell_width: u32, cell_height: u32) {
    let (width, height) = canvas.dimensions();
    for k in 0..grid.get() {
        let x = k * cell_width;
        for y in 0..height {
            canvas.get_pixel_mut(x, y).blend(&GRID_LINE);
        }
        let y = k * cell_height;
        for x in 0..width {
            canvas.get_pixel_mut(x, y).blend(&GRID_LINE);
        }
    }
}

pub fn scramble(image: &RgbaImage, grid: GridSize, format: OutputFormat) -> Result<Vec<u8>, ScrambleError> {
    scramble_with_rng(image, grid, format, &mut thread_rng())
}

pub fn scramble_with_rng<R: Rng + ?Sized>(
    image: &RgbaImage,
    grid: GridSize,
    format: OutputFormat,
    rng: &mut R,
) -> Result<Vec<u8>, ScrambleError> {
    let canvas = scramble_canvas(image, grid, rng)?;
    encode(&canvas, format, DEFAULT_QUALITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_edge: u32,
    pub format: OutputFormat,
    pub quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            format: OutputFormat::WebP,
            quality: DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRenditions {
    pub grid15: Vec<u8>,
    pub grid10: Vec<u8>,
    pub grid5: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVariants {
    /// Dimensions of the normalized source shared by all four renditions.
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub original: Vec<u8>,
    pub grids: GridRenditions,
}

impl RenderedVariants {
    pub fn bytes(&self, variant: Variant) -> &[u8] {
        match variant {
            Variant::Grid15 => &self.grids.grid15,
            Variant::Grid10 => &self.grids.grid10,
            Variant::Grid5 => &self.grids.grid5,
            Variant::Original => &self.original,
        }
    }
}

/// Upload pipeline: decode, normalize, then encode the original and the three
/// scrambled renditions from the same normalized source.
pub fn render_variants<R: Rng + ?Sized>(
    bytes: &[u8],
    options: &RenderOptions,
    rng: &mut R,
) -> Result<RenderedVariants, ScrambleError> {
    let source = normalize(&decode(bytes)?, options.max_edge);
    let grids = render_grids(&source, options, rng)?;
    let original = encode(&source, options.format, options.quality)?;
    Ok(RenderedVariants {
        width: source.width(),
        height: source.height(),
        format: options.format,
        original,
        grids,
    })
}

/// Re-runs the three scrambles from an already stored original.
pub fn regenerate_grids<R: Rng + ?Sized>(
    original: &[u8],
    options: &RenderOptions,
    rng: &mut R,
) -> Result<GridRenditions, ScrambleError> {
    let source = normalize(&decode(original)?, options.max_edge);
    render_grids(&source, options, rng)
}

fn render_grids<R: Rng + ?Sized>(
    source: &RgbaImage,
    options: &RenderOptions,
    rng: &mut R,
) -> Result<GridRenditions, ScrambleError> {
    let mut render = |grid: GridSize| -> Result<Vec<u8>, ScrambleError> {
        let canvas = scramble_canvas(source, grid, rng)?;
        encode(&canvas, options.format, options.quality)
    };
    // Coarsest grid first so an undersized source fails before any encoding.
    let grid15 = render(GridSize::FIFTEEN)?;
    let grid10 = render(GridSize::TEN)?;
    let grid5 = render(GridSize::FIVE)?;
    Ok(GridRenditions {
        grid15,
        grid10,
        grid5,
    })
}
