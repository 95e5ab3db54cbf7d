mod scale;

use std::{
    io::{self, ErrorKind},
    str::FromStr,
};

pub use self::scale::Rect;

use bytes::BytesMut;
use common::{
    frame::{fill_black, FrameError, VideoBuffer, VideoFormat},
    Size,
};

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use self::scale::{scale_plane, Plane, PlaneMut};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResampleError {
    #[error("resampling {0:?} frames is not supported")]
    UnsupportedFormat(VideoFormat),
    #[error("invalid resample size: {0}")]
    InvalidSize(Size),
    #[error(transparent)]
    InvalidBuffer(#[from] FrameError),
}

/// How a source frame is fitted into the target size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ResizeMode {
    /// Cut the largest centred region with the target aspect ratio and scale
    /// it to the target. When the source already covers the target this is a
    /// plain centre crop.
    #[default]
    Crop,
    /// Scale preserving the aspect ratio and pad the remainder with black.
    Letterbox,
    /// Scale the whole source to the target, ignoring the aspect ratio.
    Stretch,
}

impl std::fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Crop => "crop",
            Self::Letterbox => "letterbox",
            Self::Stretch => "stretch",
        })
    }
}

impl FromStr for ResizeMode {
    type Err = io::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "crop" => Self::Crop,
            "letterbox" => Self::Letterbox,
            "stretch" => Self::Stretch,
            _ => return Err(io::Error::new(ErrorKind::InvalidInput, value)),
        })
    }
}

/// Regions of the source that are read and of the target that are written,
/// in luma / pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub src: Rect,
    pub dst: Rect,
}

/// Resizes video buffers to a fixed target size without changing their pixel
/// format.
#[derive(Debug, Clone, Copy)]
pub struct VideoResampler {
    target: Size,
    mode: ResizeMode,
}

impl VideoResampler {
    pub fn new(target: Size, mode: ResizeMode) -> Self {
        Self { target, mode }
    }

    pub fn target(&self) -> Size {
        self.target
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    /// Computes which part of a `width` x `height` source ends up where in
    /// the target.
    pub fn layout(&self, format: VideoFormat, width: u32, height: u32) -> Layout {
        let (tw, th) = (self.target.width, self.target.height);
        let subsampled = matches!(format, VideoFormat::I420 | VideoFormat::NV12);
        let align = |it: u32| if subsampled { it & !1 } else { it };

        // Compare aspect ratios with cross multiplication to stay in integers.
        let wider = width as u64 * th as u64 > tw as u64 * height as u64;

        match self.mode {
            ResizeMode::Stretch => Layout {
                src: Rect::new(0, 0, width, height),
                dst: Rect::new(0, 0, tw, th),
            },
            ResizeMode::Crop => {
                let (crop_w, crop_h) = if wider {
                    (ratio(height, tw, th).clamp(1, width), height)
                } else {
                    (width, ratio(width, th, tw).clamp(1, height))
                };

                Layout {
                    src: Rect::new(
                        align((width - crop_w) / 2),
                        align((height - crop_h) / 2),
                        crop_w,
                        crop_h,
                    ),
                    dst: Rect::new(0, 0, tw, th),
                }
            }
            ResizeMode::Letterbox => {
                let (draw_w, draw_h) = if wider {
                    (tw, ratio(height, tw, width).clamp(1, th))
                } else {
                    (ratio(width, th, height).clamp(1, tw), th)
                };

                Layout {
                    src: Rect::new(0, 0, width, height),
                    dst: Rect::new(
                        align((tw - draw_w) / 2),
                        align((th - draw_h) / 2),
                        draw_w,
                        draw_h,
                    ),
                }
            }
        }
    }

    /// Produces a tightly packed buffer of exactly the target size.
    ///
    /// A source that already has the target size is returned as is, which
    /// only bumps the plane reference counts.
    pub fn resample(&self, buffer: &VideoBuffer) -> Result<VideoBuffer, ResampleError> {
        if self.target.is_empty() {
            return Err(ResampleError::InvalidSize(self.target));
        }

        buffer.validate()?;

        if buffer.width == self.target.width && buffer.height == self.target.height {
            return Ok(buffer.clone());
        }

        let format = buffer.format;
        let channels = match format {
            VideoFormat::I420 => 1,
            VideoFormat::RGBA | VideoFormat::BGRA => 4,
            VideoFormat::NV12 => return Err(ResampleError::UnsupportedFormat(format)),
        };

        let layout = self.layout(format, buffer.width, buffer.height);

        let mut output = VideoBuffer {
            format,
            width: self.target.width,
            height: self.target.height,
            data: Default::default(),
            linesize: [0; 3],
        };

        for plane in 0..format.planes() {
            let (row, rows) = format
                .plane_size(plane, self.target.width, self.target.height)
                .ok_or(FrameError::NoSuchPlane { format, plane })?;

            let mut bytes = BytesMut::zeroed(row as usize * rows as usize);
            if layout.dst != Rect::new(0, 0, self.target.width, self.target.height) {
                fill_black(format, plane, &mut bytes);
            }

            let (src_rect, dst_rect) = if plane == 0 {
                (layout.src, layout.dst)
            } else {
                let (src_width, src_height) = format
                    .plane_size(plane, buffer.width, buffer.height)
                    .ok_or(FrameError::NoSuchPlane { format, plane })?;

                (
                    layout.src.subsampled(src_width, src_height),
                    layout.dst.subsampled(row, rows),
                )
            };

            scale_plane(
                &Plane {
                    data: buffer.plane(plane),
                    stride: buffer.linesize[plane] as usize,
                },
                src_rect,
                &mut PlaneMut {
                    data: &mut bytes,
                    stride: row as usize,
                },
                dst_rect,
                channels,
            );

            output.data[plane] = bytes.freeze();
            output.linesize[plane] = row;
        }

        Ok(output)
    }
}

// value * numerator / denominator, rounded to the nearest integer.
fn ratio(value: u32, numerator: u32, denominator: u32) -> u32 {
    ((value as u64 * numerator as u64 * 2 + denominator as u64) / (denominator as u64 * 2)) as u32
}
