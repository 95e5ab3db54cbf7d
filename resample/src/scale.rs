use rayon::prelude::*;

/// A rectangle in plane coordinates (pixels, not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Maps a luma rectangle onto a 2x2 subsampled chroma plane of
    /// `plane_width` x `plane_height`.
    pub fn subsampled(&self, plane_width: u32, plane_height: u32) -> Self {
        let x = (self.x / 2).min(plane_width.saturating_sub(1));
        let y = (self.y / 2).min(plane_height.saturating_sub(1));
        let right = (self.x + self.width).div_ceil(2).min(plane_width);
        let bottom = (self.y + self.height).div_ceil(2).min(plane_height);

        Self {
            x,
            y,
            width: right.saturating_sub(x).max(1),
            height: bottom.saturating_sub(y).max(1),
        }
    }
}

pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
}

const WEIGHT_BITS: u32 = 8;
const WEIGHT_ONE: u32 = 1 << WEIGHT_BITS;

#[derive(Clone, Copy)]
struct Tap {
    first: usize,
    second: usize,
    weight: u32,
}

// Pixel centres are aligned, so a 1:1 mapping lands exactly on source pixels
// with a zero weight and degenerates to a copy.
fn taps(src: u32, dst: u32) -> Vec<Tap> {
    let ratio = src as f32 / dst as f32;
    let last = (src - 1) as f32;

    (0..dst)
        .map(|it| {
            let pos = ((it as f32 + 0.5) * ratio - 0.5).clamp(0.0, last);
            let first = pos.floor();

            Tap {
                first: first as usize,
                second: (first as usize + 1).min(src as usize - 1),
                weight: ((pos - first) * WEIGHT_ONE as f32).round() as u32,
            }
        })
        .collect()
}

/// Bilinear scale of `src_rect` of `src` into `dst_rect` of `dst`.
///
/// `channels` is the number of interleaved bytes per pixel. Bytes outside of
/// `dst_rect` are left untouched. Rows are processed in parallel.
pub fn scale_plane(
    src: &Plane,
    src_rect: Rect,
    dst: &mut PlaneMut,
    dst_rect: Rect,
    channels: usize,
) {
    if src_rect.width == 0 || src_rect.height == 0 || dst_rect.width == 0 || dst_rect.height == 0
    {
        return;
    }

    let columns = taps(src_rect.width, dst_rect.width);
    let rows = taps(src_rect.height, dst_rect.height);

    let src_x = src_rect.x as usize * channels;
    let src_y = src_rect.y as usize;
    let dst_x = dst_rect.x as usize * channels;
    let dst_width = dst_rect.width as usize * channels;

    dst.data
        .par_chunks_mut(dst.stride)
        .skip(dst_rect.y as usize)
        .take(dst_rect.height as usize)
        .zip(rows.par_iter())
        .for_each(|(line, row)| {
            let top = &src.data[(src_y + row.first) * src.stride + src_x..];
            let bottom = &src.data[(src_y + row.second) * src.stride + src_x..];
            let line = &mut line[dst_x..dst_x + dst_width];

            for (pixel, column) in line.chunks_exact_mut(channels).zip(columns.iter()) {
                let left = column.first * channels;
                let right = column.second * channels;

                for (channel, value) in pixel.iter_mut().enumerate() {
                    let upper = top[left + channel] as u32 * (WEIGHT_ONE - column.weight)
                        + top[right + channel] as u32 * column.weight;
                    let lower = bottom[left + channel] as u32 * (WEIGHT_ONE - column.weight)
                        + bottom[right + channel] as u32 * column.weight;

                    let sum = upper * (WEIGHT_ONE - row.weight) + lower * row.weight;
                    *value = ((sum + (1 << (WEIGHT_BITS * 2 - 1))) >> (WEIGHT_BITS * 2)) as u8;
                }
            }
        });
}
