//! Colour palettes for the gradient-lookup texture.
//!
//! A [`Palette`] is an ordered list of 8-bit [`Rgb`] entries. The order is the
//! sample order along the single axis of the texture the fragment shader reads
//! through its `colors` sampler, so entry 0 is the left edge of the gradient.
//! Palettes cross the UI boundary as `#rrggbb` strings; everything inside the
//! workspace works with channel triples.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

mod file;

pub use file::PaletteSpec;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("hex colour '{input}' must have 6 digits, found {digits}")]
    InvalidLength { input: String, digits: usize },
    #[error("hex colour '{input}' contains a non-hex digit")]
    InvalidDigit { input: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("palette must contain at least one colour")]
    Empty,
    #[error("palette has {0} colours; texture width must fit in u32")]
    TooLong(usize),
    #[error("palette entry {index}: {source}")]
    Hex {
        index: usize,
        #[source]
        source: HexError,
    },
    #[error("failed to read palette file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse palette file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid palette file: {0}")]
    Invalid(String),
    #[error("failed to write palette image: {0}")]
    Image(#[from] image::ImageError),
}

/// One palette entry. Channels are plain bytes so the encoder never re-clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lower-case `#rrggbb` form used by the colour inputs.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parses `#rrggbb` or `rrggbb`, either case.
    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        let digits = input.strip_prefix('#').unwrap_or(input);
        if digits.len() != 6 {
            return Err(HexError::InvalidLength {
                input: input.to_string(),
                digits: digits.chars().count(),
            });
        }
        // from_str_radix tolerates a leading sign, so validate the digits up front.
        if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(HexError::InvalidDigit {
                input: input.to_string(),
            });
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| HexError::InvalidDigit {
                input: input.to_string(),
            })
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl TryFrom<String> for Rgb {
    type Error = HexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Startup gradient: dark violet through
/// blue and white into amber and brown.
pub const DEFAULT_GRADIENT: [[u8; 3]; 15] = [
    [25, 7, 26],
    [9, 1, 47],
    [4, 4, 73],
    [0, 7, 100],
    [12, 44, 138],
    [24, 82, 177],
    [57, 125, 209],
    [134, 181, 229],
    [211, 236, 248],
    [241, 233, 191],
    [248, 201, 95],
    [255, 170, 0],
    [204, 128, 0],
    [153, 87, 0],
    [106, 52, 3],
];

/// Ordered, non-empty list of colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Result<Self, PaletteError> {
        if colors.is_empty() {
            return Err(PaletteError::Empty);
        }
        if u32::try_from(colors.len()).is_err() {
            return Err(PaletteError::TooLong(colors.len()));
        }
        Ok(Self { colors })
    }

    /// Decodes the hex strings handed over by the colour inputs.
    ///
    /// The first malformed entry aborts the whole palette; a half-applied
    /// gradient is never produced.
    pub fn from_hex<I, S>(entries: I) -> Result<Self, PaletteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let colors = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .as_ref()
                    .parse::<Rgb>()
                    .map_err(|source| PaletteError::Hex { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(colors)
    }

    pub fn from_triples(triples: &[[u8; 3]]) -> Result<Self, PaletteError> {
        Self::new(triples.iter().copied().map(Rgb::from).collect())
    }

    pub fn default_gradient() -> Self {
        Self {
            colors: DEFAULT_GRADIENT.iter().copied().map(Rgb::from).collect(),
        }
    }

    /// Loads a standalone palette TOML file (`colors = ["#rrggbb", ...]`).
    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let contents = std::fs::read_to_string(path)?;
        PaletteSpec::from_toml_str(&contents)?.into_palette()
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Never true for a constructed palette.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn to_hex(&self) -> Vec<String> {
        self.colors.iter().map(|color| color.to_hex()).collect()
    }

    /// Lays the palette out as a `len × 1` RGBA8 image with alpha zeroed.
    pub fn encode(&self) -> PaletteImage {
        let mut image = RgbaImage::new(self.colors.len() as u32, 1);
        for (pixel, color) in image.pixels_mut().zip(&self.colors) {
            *pixel = Rgba([color.r, color.g, color.b, 0]);
        }
        PaletteImage { image }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::default_gradient()
    }
}

/// CPU-side texel buffer ready for upload as the palette texture.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteImage {
    image: RgbaImage,
}

impl PaletteImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn texel_count(&self) -> usize {
        (self.image.width() * self.image.height()) as usize
    }

    pub fn texel(&self, index: u32) -> Option<[u8; 4]> {
        if index >= self.image.width() {
            return None;
        }
        Some(self.image.get_pixel(index, 0).0)
    }

    /// Raw RGBA bytes, row-major, four per texel.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn save_png(&self, path: &Path) -> Result<(), PaletteError> {
        self.image.save(path)?;
        Ok(())
    }
}
