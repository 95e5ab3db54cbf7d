use bytes::{Bytes, BytesMut};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("video buffer size is zero: {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
    #[error("{format:?} has no plane {plane}")]
    NoSuchPlane { format: VideoFormat, plane: usize },
    #[error("plane {plane} stride {stride} is smaller than the row size {min}")]
    InvalidStride { plane: usize, stride: u32, min: u32 },
    #[error("plane {plane} holds {actual} bytes, at least {expected} are required")]
    InvalidPlane {
        plane: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{0:?} is not a packed format")]
    NotPacked(VideoFormat),
}

/// Pixel layout of a video buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum VideoFormat {
    /// Packed, 4 bytes per pixel: blue, green, red, alpha.
    BGRA,
    /// Packed, 4 bytes per pixel: red, green, blue, alpha.
    RGBA,
    /// Y plane followed by an interleaved UV plane, chroma subsampled 2x2.
    NV12,
    /// Y, U and V planes, chroma subsampled 2x2. This is what RTC tracks
    /// normally deliver.
    I420,
}

impl VideoFormat {
    pub const fn planes(self) -> usize {
        match self {
            Self::BGRA | Self::RGBA => 1,
            Self::NV12 => 2,
            Self::I420 => 3,
        }
    }

    pub const fn is_packed(self) -> bool {
        matches!(self, Self::BGRA | Self::RGBA)
    }

    /// Bytes per row and number of rows of the given plane for a frame of
    /// `width` x `height` pixels, or `None` if the format has no such plane.
    pub const fn plane_size(self, plane: usize, width: u32, height: u32) -> Option<(u32, u32)> {
        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);

        match (self, plane) {
            (Self::BGRA | Self::RGBA, 0) => Some((width * 4, height)),
            (Self::NV12 | Self::I420, 0) => Some((width, height)),
            (Self::NV12, 1) => Some((chroma_width * 2, chroma_height)),
            (Self::I420, 1 | 2) => Some((chroma_width, chroma_height)),
            _ => None,
        }
    }
}

/// Clockwise rotation the consumer has to apply to display the frame upright.
#[repr(u16)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum VideoRotation {
    #[default]
    Rotation0 = 0,
    Rotation90 = 90,
    Rotation180 = 180,
    Rotation270 = 270,
}

impl VideoRotation {
    pub const fn degrees(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u32> for VideoRotation {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Rotation0,
            90 => Self::Rotation90,
            180 => Self::Rotation180,
            270 => Self::Rotation270,
            _ => return Err(value),
        })
    }
}

/// Pixel data of one frame.
///
/// Planes are reference counted, cloning a buffer never copies pixels. Unused
/// planes are empty and have a linesize of zero.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct VideoBuffer {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub data: [Bytes; 3],
    pub linesize: [u32; 3],
}

impl VideoBuffer {
    pub fn i420(
        width: u32,
        height: u32,
        y: Bytes,
        u: Bytes,
        v: Bytes,
        linesize: [u32; 3],
    ) -> Result<Self, FrameError> {
        let buffer = Self {
            format: VideoFormat::I420,
            data: [y, u, v],
            linesize,
            width,
            height,
        };

        buffer.validate()?;
        Ok(buffer)
    }

    pub fn nv12(
        width: u32,
        height: u32,
        y: Bytes,
        uv: Bytes,
        linesize: [u32; 2],
    ) -> Result<Self, FrameError> {
        let buffer = Self {
            format: VideoFormat::NV12,
            data: [y, uv, Bytes::new()],
            linesize: [linesize[0], linesize[1], 0],
            width,
            height,
        };

        buffer.validate()?;
        Ok(buffer)
    }

    pub fn packed(
        format: VideoFormat,
        width: u32,
        height: u32,
        data: Bytes,
        linesize: u32,
    ) -> Result<Self, FrameError> {
        if !format.is_packed() {
            return Err(FrameError::NotPacked(format));
        }

        let buffer = Self {
            data: [data, Bytes::new(), Bytes::new()],
            linesize: [linesize, 0, 0],
            format,
            width,
            height,
        };

        buffer.validate()?;
        Ok(buffer)
    }

    /// Allocates a tightly packed black frame.
    pub fn black(format: VideoFormat, width: u32, height: u32) -> Self {
        let mut data: [Bytes; 3] = Default::default();
        let mut linesize = [0u32; 3];

        for plane in 0..format.planes() {
            if let Some((row, rows)) = format.plane_size(plane, width, height) {
                let mut bytes = BytesMut::zeroed(row as usize * rows as usize);
                fill_black(format, plane, &mut bytes);

                data[plane] = bytes.freeze();
                linesize[plane] = row;
            }
        }

        Self {
            format,
            width,
            height,
            data,
            linesize,
        }
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        &self.data[index]
    }

    /// Checks that every plane the format needs is large enough for the
    /// declared size and stride.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroSize {
                width: self.width,
                height: self.height,
            });
        }

        for plane in 0..self.format.planes() {
            let (row, rows) = self
                .format
                .plane_size(plane, self.width, self.height)
                .ok_or(FrameError::NoSuchPlane {
                    format: self.format,
                    plane,
                })?;

            let stride = self.linesize[plane];
            if stride < row {
                return Err(FrameError::InvalidStride {
                    plane,
                    stride,
                    min: row,
                });
            }

            let expected = stride as usize * (rows as usize - 1) + row as usize;
            let actual = self.data[plane].len();
            if actual < expected {
                return Err(FrameError::InvalidPlane {
                    plane,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }
}

/// Writes the black value of a plane into every byte of `bytes`.
///
/// Luma black is the limited range 16, neutral chroma is 128, packed formats
/// are opaque black.
pub fn fill_black(format: VideoFormat, plane: usize, bytes: &mut [u8]) {
    match (format, plane) {
        (VideoFormat::BGRA | VideoFormat::RGBA, _) => {
            for pixel in bytes.chunks_exact_mut(4) {
                pixel.copy_from_slice(&[0, 0, 0, 255]);
            }
        }
        (VideoFormat::NV12 | VideoFormat::I420, 0) => bytes.fill(16),
        _ => bytes.fill(128),
    }
}

/// A decoded frame as delivered by a video track.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub buffer: VideoBuffer,
    pub rotation: VideoRotation,
    /// Capture timestamp in microseconds, as stamped by the source.
    pub timestamp_us: i64,
}

impl VideoFrame {
    pub fn new(buffer: VideoBuffer, rotation: VideoRotation, timestamp_us: i64) -> Self {
        Self {
            buffer,
            rotation,
            timestamp_us,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    pub fn height(&self) -> u32 {
        self.buffer.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_i420_has_limited_range_planes() {
        let buffer = VideoBuffer::black(VideoFormat::I420, 5, 3);

        assert_eq!(buffer.linesize, [5, 3, 3]);
        assert_eq!(buffer.plane(0).len(), 15);
        assert_eq!(buffer.plane(1).len(), 6);
        assert!(buffer.plane(0).iter().all(|it| *it == 16));
        assert!(buffer.plane(2).iter().all(|it| *it == 128));
        assert_eq!(buffer.validate(), Ok(()));
    }

    #[test]
    fn black_rgba_is_opaque() {
        let buffer = VideoBuffer::black(VideoFormat::RGBA, 2, 2);

        assert_eq!(buffer.linesize[0], 8);
        assert_eq!(&buffer.plane(0)[..4], &[0, 0, 0, 255]);
        assert!(buffer.plane(1).is_empty());
    }

    #[test]
    fn validate_accepts_padded_strides() {
        // The last row does not need the stride padding.
        let y = Bytes::from(vec![0u8; 8 * 3 + 6]);
        let u = Bytes::from(vec![0u8; 4 + 3]);
        let v = u.clone();

        assert!(VideoBuffer::i420(6, 4, y, u, v, [8, 4, 4]).is_ok());
    }

    #[test]
    fn validate_rejects_short_plane() {
        let y = Bytes::from(vec![0u8; 10]);
        let u = Bytes::from(vec![0u8; 4]);

        assert_eq!(
            VideoBuffer::i420(4, 4, y, u.clone(), u, [4, 2, 2]),
            Err(FrameError::InvalidPlane {
                plane: 0,
                expected: 16,
                actual: 10,
            })
        );
    }

    #[test]
    fn validate_rejects_narrow_stride() {
        let data = Bytes::from(vec![0u8; 64]);

        assert_eq!(
            VideoBuffer::packed(VideoFormat::BGRA, 4, 4, data, 8),
            Err(FrameError::InvalidStride {
                plane: 0,
                stride: 8,
                min: 16,
            })
        );
    }

    #[test]
    fn packed_rejects_planar_format() {
        let data = Bytes::from(vec![0u8; 64]);

        assert_eq!(
            VideoBuffer::packed(VideoFormat::I420, 4, 4, data, 4),
            Err(FrameError::NotPacked(VideoFormat::I420))
        );
    }

    #[test]
    fn zero_size_is_invalid() {
        let buffer = VideoBuffer::black(VideoFormat::RGBA, 0, 4);

        assert_eq!(
            buffer.validate(),
            Err(FrameError::ZeroSize {
                width: 0,
                height: 4,
            })
        );
    }

    #[test]
    fn rotation_from_degrees() {
        assert_eq!(VideoRotation::try_from(90), Ok(VideoRotation::Rotation90));
        assert_eq!(VideoRotation::try_from(45), Err(45));
        assert_eq!(VideoRotation::Rotation270.degrees(), 270);
    }
}
