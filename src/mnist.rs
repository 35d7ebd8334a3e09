//! Reader for the MNIST handwritten digit dataset in IDX format.
//!
//! See <http://yann.lecun.com/exdb/mnist/> for a description of the format.
//! Each file starts with a big-endian `u32` magic number followed by one
//! big-endian `u32` per dimension and then the `u8` payload.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::path::Path;

use ember_tensor::{IndexError, IndexItem, ShapeError, Tensor};
use log::info;

use crate::error::LayerError;
use crate::loss::class_indices;

/// Magic number of an IDX file holding `u8` images.
pub const IMAGES_MAGIC: u32 = 2051;

/// Magic number of an IDX file holding `u8` labels.
pub const LABELS_MAGIC: u32 = 2049;

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const CLASSES: usize = 10;

/// Mean and standard deviation of the MNIST training pixels, after scaling
/// to `[0, 1]`.
const PIXEL_MEAN: f32 = 0.1307;
const PIXEL_STD: f32 = 0.3081;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Errors reading an MNIST file.
#[derive(Debug)]
pub enum DatasetError {
    /// The file could not be read.
    Io(std::io::Error),

    /// The file does not start with the expected magic number.
    BadMagic { expected: u32, actual: u32 },

    /// The file ended before the header or payload was complete.
    Truncated,

    /// The numbers of images and labels differ.
    CountMismatch { images: usize, labels: usize },

    Shape(ShapeError),
}

impl Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io(err) => write!(f, "io error: {}", err),
            DatasetError::BadMagic { expected, actual } => write!(
                f,
                "bad magic number {} (expected {})",
                actual, expected
            ),
            DatasetError::Truncated => write!(f, "file is truncated"),
            DatasetError::CountMismatch { images, labels } => {
                write!(f, "found {} images but {} labels", images, labels)
            }
            DatasetError::Shape(err) => write!(f, "shape error: {}", err),
        }
    }
}

impl Error for DatasetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetError::Io(err) => Some(err),
            DatasetError::Shape(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> DatasetError {
        DatasetError::Io(err)
    }
}

impl From<ShapeError> for DatasetError {
    fn from(err: ShapeError) -> DatasetError {
        DatasetError::Shape(err)
    }
}

/// Read the big-endian `u32` at `offset`.
fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DatasetError> {
    let field = bytes
        .get(offset..offset + 4)
        .ok_or(DatasetError::Truncated)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(field);
    Ok(u32::from_be_bytes(buf))
}

fn check_magic(bytes: &[u8], expected: u32) -> Result<(), DatasetError> {
    let actual = read_u32(bytes, 0)?;
    if actual != expected {
        return Err(DatasetError::BadMagic { expected, actual });
    }
    Ok(())
}

/// Scale a pixel to `[0, 1]` and standardize it.
pub fn normalize_pixel(pixel: u8) -> f32 {
    (pixel as f32 / 255. - PIXEL_MEAN) / PIXEL_STD
}

/// Parse the contents of an IDX image file into a `(N, rows * cols)` tensor
/// of normalized pixels.
///
/// Bytes after the last image are ignored.
pub fn parse_images(bytes: &[u8]) -> Result<Tensor, DatasetError> {
    check_magic(bytes, IMAGES_MAGIC)?;
    let count = read_u32(bytes, 4)? as usize;
    let rows = read_u32(bytes, 8)? as usize;
    let cols = read_u32(bytes, 12)? as usize;

    let len = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or(DatasetError::Truncated)?;
    let pixels = bytes
        .get(16..16usize.saturating_add(len))
        .ok_or(DatasetError::Truncated)?;
    let data = pixels.iter().copied().map(normalize_pixel).collect();
    Ok(Tensor::from_data(&[count, rows * cols], data)?)
}

/// Parse the contents of an IDX label file into a `(N,)` tensor of class
/// indices stored as floats.
pub fn parse_labels(bytes: &[u8]) -> Result<Tensor, DatasetError> {
    check_magic(bytes, LABELS_MAGIC)?;
    let count = read_u32(bytes, 4)? as usize;
    let labels = bytes
        .get(8..8usize.saturating_add(count))
        .ok_or(DatasetError::Truncated)?;
    Ok(labels.iter().map(|&label| label as f32).collect())
}

pub fn read_images(path: impl AsRef<Path>) -> Result<Tensor, DatasetError> {
    let path = path.as_ref();
    let images = parse_images(&std::fs::read(path)?)?;
    info!(
        "read {} images of {} pixels from {}",
        images.size(0),
        images.size(1),
        path.display()
    );
    Ok(images)
}

pub fn read_labels(path: impl AsRef<Path>) -> Result<Tensor, DatasetError> {
    let path = path.as_ref();
    let labels = parse_labels(&std::fs::read(path)?)?;
    info!("read {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Convert a `(N,)` vector of class indices into a `(N, classes)` one-hot
/// matrix.
pub fn one_hot(labels: &Tensor, classes: usize) -> Result<Tensor, LayerError> {
    let indices = class_indices(labels, labels.len(), classes)?;
    let mut out = Tensor::zeros(&[indices.len(), classes]);
    for (row, class) in indices.into_iter().enumerate() {
        out[[row, class]] = 1.;
    }
    Ok(out)
}

/// Iterator over consecutive `(images, labels)` mini-batches.
///
/// The final batch is shorter if the number of samples is not a multiple of
/// the batch size.
pub struct Batches<'a> {
    images: &'a Tensor,
    labels: &'a Tensor,
    batch_size: usize,
    start: usize,
}

impl<'a> Batches<'a> {
    /// Create an iterator over batches of `batch_size` samples. Images and
    /// labels are split along their first axis.
    pub fn new(images: &'a Tensor, labels: &'a Tensor, batch_size: usize) -> Batches<'a> {
        Batches {
            images,
            labels,
            batch_size,
            start: 0,
        }
    }

    fn len_samples(&self) -> usize {
        self.images.size(0).min(self.labels.size(0))
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<(Tensor, Tensor), IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.len_samples();
        if self.batch_size == 0 || self.start >= n {
            return None;
        }
        let end = (self.start + self.batch_size).min(n);
        let rows = IndexItem::range(self.start as isize, Some(end as isize), 1);
        self.start = end;

        let batch = self
            .images
            .index(&[rows, IndexItem::Ellipsis])
            .and_then(|images| Ok((images, self.labels.index(&[rows])?)));
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len_samples().saturating_sub(self.start);
        let batches = if self.batch_size == 0 {
            0
        } else {
            remaining.div_ceil(self.batch_size)
        };
        (batches, Some(batches))
    }
}

/// The MNIST training and test splits.
#[derive(Clone, Debug)]
pub struct Mnist {
    /// Training images, `(60000, 784)`.
    pub train_images: Tensor,

    /// Training labels, `(60000,)`.
    pub train_labels: Tensor,

    pub test_images: Tensor,
    pub test_labels: Tensor,
}

impl Mnist {
    /// Create a dataset from pre-loaded splits, checking that each split has
    /// as many labels as images.
    pub fn new(
        train_images: Tensor,
        train_labels: Tensor,
        test_images: Tensor,
        test_labels: Tensor,
    ) -> Result<Mnist, DatasetError> {
        for (images, labels) in [(&train_images, &train_labels), (&test_images, &test_labels)] {
            if images.size(0) != labels.size(0) {
                return Err(DatasetError::CountMismatch {
                    images: images.size(0),
                    labels: labels.size(0),
                });
            }
        }
        Ok(Mnist {
            train_images,
            train_labels,
            test_images,
            test_labels,
        })
    }

    /// Load the four uncompressed MNIST files from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Mnist, DatasetError> {
        let dir = dir.as_ref();
        let mnist = Mnist::new(
            read_images(dir.join(TRAIN_IMAGES))?,
            read_labels(dir.join(TRAIN_LABELS))?,
            read_images(dir.join(TEST_IMAGES))?,
            read_labels(dir.join(TEST_LABELS))?,
        )?;
        info!(
            "loaded MNIST with {} training and {} test samples",
            mnist.train_labels.len(),
            mnist.test_labels.len()
        );
        Ok(mnist)
    }

    /// Iterate over mini-batches of the training split.
    pub fn batches(&self, batch_size: usize) -> Batches<'_> {
        Batches::new(&self.train_images, &self.train_labels, batch_size)
    }

    /// Iterate over mini-batches of the test split.
    pub fn test_batches(&self, batch_size: usize) -> Batches<'_> {
        Batches::new(&self.test_images, &self.test_labels, batch_size)
    }
}
