use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::codecs::png::PngEncoder;
use image::{DynamicImage, GrayImage, ImageEncoder, ImageError, ImageFormat, RgbaImage};
use uuid::Uuid;

// ============================================================================
// ENCODED IMAGES: byte payloads exchanged with the model
// ============================================================================

/// An encoded image file (PNG, JPEG, WEBP, ...) together with its MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Wrap raw file bytes, sniffing the MIME type from the magic bytes.
    /// Unknown payloads are labelled as PNG, which is what the model emits.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(mime_for_format)
            .unwrap_or("image/png");
        Self::new(bytes, mime_type)
    }

    pub fn png_from_rgba(pixels: &RgbaImage) -> Result<Self, ImageError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            image::ColorType::Rgba8,
        )?;
        Ok(Self::new(bytes, "image/png"))
    }

    pub fn png_from_gray(pixels: &GrayImage) -> Result<Self, ImageError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            image::ColorType::L8,
        )?;
        Ok(Self::new(bytes, "image/png"))
    }

    pub fn decode(&self) -> Result<DynamicImage, ImageError> {
        image::load_from_memory(&self.bytes)
    }

    pub fn decode_rgba(&self) -> Result<RgbaImage, ImageError> {
        Ok(self.decode()?.into_rgba8())
    }

    /// Width and height from the header, without decoding the pixels.
    pub fn dimensions(&self) -> Result<(u32, u32), ImageError> {
        image::io::Reader::new(Cursor::new(&self.bytes))
            .with_guessed_format()?
            .into_dimensions()
    }

    pub fn is_png(&self) -> bool {
        self.mime_type == "image/png"
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Gif => "image/gif",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// IMAGE HANDLES: shared, immutable references stored in editor history
// ============================================================================

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Cheap-to-clone handle to an encoded image.
///
/// Every handle gets a process-unique `id` so front ends can key texture caches
/// on it and release a texture once the handle is no longer displayed. Equality
/// compares content, so two handles wrapping identical bytes are equal.
#[derive(Clone, Debug)]
pub struct ImageHandle {
    id: u64,
    image: Arc<EncodedImage>,
}

impl ImageHandle {
    pub fn new(image: EncodedImage) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            image: Arc::new(image),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image) || *self.image == *other.image
    }
}

impl Eq for ImageHandle {}

impl std::ops::Deref for ImageHandle {
    type Target = EncodedImage;

    fn deref(&self) -> &EncodedImage {
        &self.image
    }
}

// ============================================================================
// SOURCE IMAGE: the uploaded original
// ============================================================================

/// An uploaded image: the untouched file bytes plus a decoded preview.
#[derive(Clone, Debug)]
pub struct SourceImage {
    /// Fresh for every upload; work issued against an older id is stale.
    pub id: Uuid,
    pub name: String,
    pub encoded: ImageHandle,
    pub preview: Arc<RgbaImage>,
}

impl SourceImage {
    pub fn decode(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ImageError> {
        let encoded = EncodedImage::from_bytes(bytes);
        let preview = encoded.decode_rgba()?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            encoded: ImageHandle::new(encoded),
            preview: Arc::new(preview),
        })
    }

    pub fn width(&self) -> u32 {
        self.preview.width()
    }

    pub fn height(&self) -> u32 {
        self.preview.height()
    }
}

/// Read an image file from disk, returning its display name and raw bytes.
pub fn read_image_file(path: &Path) -> std::io::Result<(String, Vec<u8>)> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    Ok((name, bytes))
}

/// Write an encoded image to `path` as PNG. PNG payloads are written as-is,
/// anything else is decoded and re-encoded.
pub fn write_png(image: &EncodedImage, path: &Path) -> Result<(), ImageError> {
    if image.is_png() {
        fs::write(path, &image.bytes)?;
        return Ok(());
    }
    let pixels = image.decode_rgba()?;
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels).write_to(&mut out, image::ImageOutputFormat::Png)?;
    fs::write(path, out.into_inner())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 7, 255]))
    }

    #[test]
    fn png_encoding_sniffs_back_as_png() {
        let encoded = EncodedImage::png_from_rgba(&sample(4, 3)).unwrap();
        let sniffed = EncodedImage::from_bytes(encoded.bytes.clone());
        assert_eq!(sniffed.mime_type, "image/png");
        assert_eq!(sniffed.decode_rgba().unwrap(), sample(4, 3));
    }

    #[test]
    fn handles_compare_by_content() {
        let a = ImageHandle::new(EncodedImage::new(vec![1, 2, 3], "image/png"));
        let b = ImageHandle::new(EncodedImage::new(vec![1, 2, 3], "image/png"));
        let c = ImageHandle::new(EncodedImage::new(vec![9], "image/png"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn source_image_decodes_dimensions() {
        let bytes = EncodedImage::png_from_rgba(&sample(12, 5)).unwrap().bytes;
        let src = SourceImage::decode("cat.png", bytes).unwrap();
        assert_eq!((src.width(), src.height()), (12, 5));
        assert_eq!(src.encoded.dimensions().unwrap(), (12, 5));
        assert_eq!(src.name, "cat.png");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(SourceImage::decode("junk", vec![0, 1, 2, 3]).is_err());
    }

    #[test]
    fn write_png_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let encoded = EncodedImage::png_from_rgba(&sample(3, 3)).unwrap();
        write_png(&encoded, &path).unwrap();
        let (name, bytes) = read_image_file(&path).unwrap();
        assert_eq!(name, "out.png");
        assert_eq!(bytes, encoded.bytes);
    }
}
