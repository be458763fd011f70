use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ColorType, DynamicImage, Frames, RgbaImage};
use log::{info, warn};

use crate::error::MediaError;

/// Top-down RGBA8 pixel buffer handed to the GPU layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pixels: RgbaImage,
}

impl Slide {
    /// Wraps raw RGBA bytes. Returns `None` when the buffer does not match the size.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, rgba).map(|pixels| Self { pixels })
    }

    /// Creates a slide filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, image::Rgba(rgba)),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Rows in top-down order, four bytes per pixel.
    pub fn as_rgba(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Copies the pixels into `out` with the row order reversed.
    ///
    /// Texture coordinates used by the scene put `v = 0` on the bottom row.
    pub fn write_flipped(&self, out: &mut Vec<u8>) {
        let row_len = self.width() as usize * 4;
        out.clear();
        if row_len == 0 {
            return;
        }
        out.reserve(self.as_rgba().len());
        for row in self.as_rgba().chunks_exact(row_len).rev() {
            out.extend_from_slice(row);
        }
    }
}

impl From<RgbaImage> for Slide {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

/// Decodes an image file into an RGBA slide, converting other pixel formats.
pub fn decode_image(path: &Path) -> Result<Slide, MediaError> {
    let decoded = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(source) => MediaError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => MediaError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let bits = decoded.color().bits_per_pixel();
    info!("a {bits}-bit image was read from {}", path.display());
    let slide = to_slide(decoded);
    if slide.is_empty() {
        return Err(MediaError::Empty {
            path: path.to_path_buf(),
        });
    }
    info!(
        "loaded {} x {} RGBA slide from {}",
        slide.width(),
        slide.height(),
        path.display()
    );
    Ok(slide)
}

fn to_slide(decoded: DynamicImage) -> Slide {
    if decoded.color() == ColorType::Rgba8 {
        return Slide::from(decoded.into_rgba8());
    }
    info!(
        "converting image from {} bits to 32 bits",
        decoded.color().bits_per_pixel()
    );
    Slide::from(decoded.to_rgba8())
}

/// Stream of slides. `None` marks the end of the stream.
pub trait SlideSource {
    fn next_frame(&mut self) -> Option<Slide>;

    /// File the frames come from.
    fn path(&self) -> &Path;
}

/// Single still image; yields one frame.
#[derive(Debug)]
pub struct StillImage {
    path: PathBuf,
    slide: Option<Slide>,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        Ok(Self::from_slide(path, decode_image(path)?))
    }

    pub fn from_slide(path: &Path, slide: Slide) -> Self {
        Self {
            path: path.to_path_buf(),
            slide: Some(slide),
        }
    }
}

impl SlideSource for StillImage {
    fn next_frame(&mut self) -> Option<Slide> {
        self.slide.take()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Animated GIF played one frame per call.
pub struct AnimatedClip {
    path: PathBuf,
    frames: Frames<'static>,
}

impl AnimatedClip {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let file = File::open(path).map_err(|source| MediaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder =
            GifDecoder::new(BufReader::new(file)).map_err(|source| MediaError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            frames: decoder.into_frames(),
        })
    }
}

impl SlideSource for AnimatedClip {
    fn next_frame(&mut self) -> Option<Slide> {
        match self.frames.next()? {
            Ok(frame) => Some(Slide::from(frame.into_buffer())),
            Err(err) => {
                warn!("stopping clip {}: {err}", self.path.display());
                None
            }
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Opens `path` as a clip when it is a GIF and as a still image otherwise.
pub fn open_slide_source(path: &Path) -> Result<Box<dyn SlideSource>, MediaError> {
    let is_clip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
    if is_clip {
        Ok(Box::new(AnimatedClip::open(path)?))
    } else {
        Ok(Box::new(StillImage::open(path)?))
    }
}
