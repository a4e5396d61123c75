//! Image preprocessing for the cascade classifiers

use std::path::Path;

use image::DynamicImage;
use ndarray::Array4;

use crate::config::PreprocessConfig;
use crate::error::{CascadeError, Result};

/// Default input size (width, height) shared by all cascade classifiers
pub const CLASSIFIER_INPUT_SIZE: (u32, u32) = (384, 512);

/// Per-channel RGB mean of the training set
pub const DEFAULT_MEAN: [f32; 3] = [0.548, 0.504, 0.479];

/// Per-channel RGB standard deviation of the training set
pub const DEFAULT_STD: [f32; 3] = [0.237, 0.247, 0.246];

/// A normalized NCHW tensor holding exactly one RGB image
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Wrap a tensor, checking it is `[1, 3, H, W]` with non-zero H and W
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let shape = data.shape();
        if shape[0] != 1 || shape[1] != 3 || shape[2] == 0 || shape[3] == 0 {
            return Err(CascadeError::invalid_input(format!(
                "expected tensor of shape [1, 3, H, W], got {:?}",
                shape
            )));
        }
        Ok(Self { data })
    }

    /// (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[3], shape[2])
    }

    /// Shape as OpenVINO expects it
    pub fn shape_i64(&self) -> [i64; 4] {
        let s = self.data.shape();
        [s[0] as i64, s[1] as i64, s[2] as i64, s[3] as i64]
    }

    /// Check the tensor matches a classifier's expected input size
    pub fn ensure_size(&self, width: usize, height: usize) -> Result<()> {
        if self.dimensions() != (width, height) {
            return Err(CascadeError::invalid_input(format!(
                "expected {}x{} image, got {}x{}",
                width,
                height,
                self.dimensions().0,
                self.dimensions().1
            )));
        }
        Ok(())
    }

    /// Contiguous row-major data
    pub fn as_slice(&self) -> Result<&[f32]> {
        self.data
            .as_slice()
            .ok_or_else(|| CascadeError::invalid_input("tensor is not contiguous"))
    }
}

/// Converts raw image bytes into normalized tensors
#[derive(Debug, Clone)]
pub struct Preprocessor {
    width: u32,
    height: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            width: config.input_width,
            height: config.input_height,
            mean: config.mean,
            std: config.std,
        }
    }

    /// (width, height) of produced tensors
    pub fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Read and preprocess an image file
    pub fn load(&self, path: &Path) -> Result<ImageTensor> {
        let data = std::fs::read(path).map_err(|e| {
            CascadeError::invalid_input(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.preprocess_bytes(&data)
    }

    /// Decode and preprocess encoded image bytes
    pub fn preprocess_bytes(&self, data: &[u8]) -> Result<ImageTensor> {
        let image = decode_image(data)?;
        self.preprocess(&image)
    }

    /// Resize and normalize a decoded image
    pub fn preprocess(&self, image: &DynamicImage) -> Result<ImageTensor> {
        let resized = image.resize_exact(
            self.width,
            self.height,
            image::imageops::FilterType::Triangle,
        );
        ImageTensor::new(self.image_to_nchw(&resized))
    }

    /// RGB order, scaled to [0, 1] then standardized per channel
    fn image_to_nchw(&self, image: &DynamicImage) -> Array4<f32> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (v - self.mean[c]) / self.std[c];
            }
        }

        tensor
    }
}

/// Decode image bytes and apply the EXIF orientation tag
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(data)
        .map_err(|e| CascadeError::invalid_input(format!("cannot decode image: {}", e)))?;
    Ok(match exif_orientation(data) {
        Some(orientation) => orient(image, orientation),
        None => image,
    })
}

/// EXIF Orientation tag, if the container carries one
fn exif_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut std::io::Cursor::new(data))
        .ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Undo a camera orientation tag (values 1 to 8, see exiftool's EXIF table)
fn orient(image: DynamicImage, orientation: u32) -> DynamicImage {
    let rotated = match orientation {
        3 | 4 => image.rotate180(),
        5 | 6 => image.rotate90(),
        7 | 8 => image.rotate270(),
        _ => image,
    };
    // Even tags below 5 and odd tags from 5 up are mirrored
    if matches!(orientation, 2 | 4 | 5 | 7) {
        rotated.fliph()
    } else {
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn preprocessor(width: u32, height: u32) -> Preprocessor {
        Preprocessor::new(&PreprocessConfig {
            input_width: width,
            input_height: height,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
        })
    }

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)));
        let mut buffer = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_output_shape() {
        let pre = preprocessor(8, 16);
        let tensor = pre.preprocess_bytes(&png_bytes(20, 10, [0, 0, 0])).unwrap();
        assert_eq!(tensor.dimensions(), (8, 16));
        assert_eq!(tensor.shape_i64(), [1, 3, 16, 8]);
        assert_eq!(tensor.as_slice().unwrap().len(), 3 * 16 * 8);
    }

    #[test]
    fn test_normalization() {
        let pre = preprocessor(4, 4);
        let tensor = pre.preprocess_bytes(&png_bytes(4, 4, [255, 0, 255])).unwrap();
        let data = tensor.as_slice().unwrap();
        let plane = 16;

        let r = (1.0 - DEFAULT_MEAN[0]) / DEFAULT_STD[0];
        let g = (0.0 - DEFAULT_MEAN[1]) / DEFAULT_STD[1];
        assert!((data[0] - r).abs() < 1e-5);
        assert!((data[plane] - g).abs() < 1e-5);
    }

    #[test]
    fn test_garbage_bytes_are_invalid_input() {
        let pre = preprocessor(4, 4);
        let err = pre.preprocess_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, CascadeError::InvalidInput { .. }));
    }

    #[test]
    fn test_missing_file_is_invalid_input() {
        let pre = preprocessor(4, 4);
        let err = pre.load(Path::new("/nonexistent/face.jpg")).unwrap_err();
        assert!(matches!(err, CascadeError::InvalidInput { .. }));
    }

    #[test]
    fn test_tensor_shape_validation() {
        assert!(ImageTensor::new(Array4::zeros((1, 3, 2, 2))).is_ok());
        assert!(ImageTensor::new(Array4::zeros((2, 3, 2, 2))).is_err());
        assert!(ImageTensor::new(Array4::zeros((1, 1, 2, 2))).is_err());
        assert!(ImageTensor::new(Array4::zeros((1, 3, 0, 2))).is_err());
    }

    #[test]
    fn test_ensure_size() {
        let tensor = ImageTensor::new(Array4::zeros((1, 3, 4, 2))).unwrap();
        assert!(tensor.ensure_size(2, 4).is_ok());
        assert!(matches!(
            tensor.ensure_size(4, 2),
            Err(CascadeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_orientation_tags() {
        let mut buf = ImageBuffer::new(3, 2);
        for (x, y, px) in buf.enumerate_pixels_mut() {
            *px = Rgb([x as u8 * 40, y as u8 * 90, 7]);
        }
        let img = DynamicImage::ImageRgb8(buf);
        let pixels = |i: DynamicImage| (i.width(), i.height(), i.to_rgb8().into_raw());

        assert_eq!(pixels(orient(img.clone(), 1)), pixels(img.clone()));
        assert_eq!(pixels(orient(img.clone(), 2)), pixels(img.fliph()));
        assert_eq!(pixels(orient(img.clone(), 3)), pixels(img.rotate180()));
        assert_eq!(pixels(orient(img.clone(), 4)), pixels(img.flipv()));
        assert_eq!(pixels(orient(img.clone(), 5)), pixels(img.rotate90().fliph()));
        assert_eq!(pixels(orient(img.clone(), 6)), pixels(img.rotate90()));
        assert_eq!(pixels(orient(img.clone(), 7)), pixels(img.rotate270().fliph()));
        assert_eq!(pixels(orient(img.clone(), 8)), pixels(img.rotate270()));
        assert_eq!(pixels(orient(img.clone(), 42)), pixels(img));
    }

    #[test]
    fn test_png_without_exif_is_unrotated() {
        assert_eq!(exif_orientation(&png_bytes(3, 2, [1, 2, 3])), None);
        let decoded = decode_image(&png_bytes(3, 2, [1, 2, 3])).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }
}
