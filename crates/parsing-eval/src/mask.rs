//! Binary mask primitives: COCO-compatible RLE decoding and polygon rasterization.
//!
//! RLEs are column-major (pixel (x, y) at `y + h * x`), matching COCO results
//! files. Everything handed to the scorer is row-major, so the public
//! rasterizers transpose on the way out.

use crate::types::{Rle, Segmentation};
use crate::{Error, Result};

/// Upsampling factor used while walking polygon edges.
const POLY_SCALE: f64 = 5.0;

/// Decode an RLE to a column-major binary mask of size `h * w`.
pub fn decode(rle: &Rle) -> Vec<u8> {
    let n = (rle.h as usize) * (rle.w as usize);
    let mut mask = vec![0u8; n];
    let mut idx = 0usize;
    let mut v = 0u8;
    for &c in &rle.counts {
        let end = (idx + c as usize).min(n);
        if v == 1 && idx < end {
            mask[idx..end].fill(1);
        }
        idx += c as usize;
        v ^= 1;
    }
    mask
}

/// Number of foreground pixels (sum of the odd-indexed runs).
pub fn area(rle: &Rle) -> u64 {
    rle.counts.iter().skip(1).step_by(2).map(|&c| c as u64).sum()
}

/// Decode an RLE straight into a row-major binary mask.
pub fn to_row_major(rle: &Rle) -> Vec<u8> {
    let h = rle.h as usize;
    let w = rle.w as usize;
    let col_major = decode(rle);
    let mut out = vec![0u8; h * w];
    for x in 0..w {
        for y in 0..h {
            out[y * w + x] = col_major[y + h * x];
        }
    }
    out
}

/// Decompress a COCO LEB128-like count string.
pub fn rle_from_string(s: &str, h: u32, w: u32) -> Rle {
    let bytes = s.as_bytes();
    let mut counts = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let mut x: i64 = 0;
        let mut shift = 0;
        let mut more = true;
        while more && i < bytes.len() {
            let c = bytes[i].wrapping_sub(48) as i64;
            i += 1;
            x |= (c & 0x1f) << shift;
            more = (c & 0x20) != 0;
            shift += 5;
        }
        // sign bit of the last group
        if shift > 0 && (x & (1 << (shift - 1))) != 0 {
            x |= !0i64 << shift;
        }
        // counts after the third are deltas against the count two back
        if counts.len() > 2 {
            x += counts[counts.len() - 2] as i64;
        }
        counts.push(x as u32);
    }

    Rle { h, w, counts }
}

/// Rasterize one polygon (flat `[x0, y0, x1, y1, ...]`) into a column-major RLE.
///
/// Scan-line fill in the style of COCO's `rleFrPoly`: edges are walked on a
/// 5x upsampled grid, the points where an edge crosses a pixel-column
/// boundary become run starts, and sorting those positions turns them into
/// alternating runs. Polygons with fewer than 3 vertices produce an empty mask.
pub fn fr_poly(xy: &[f64], h: u32, w: u32) -> Rle {
    if xy.len() / 2 < 3 {
        return Rle {
            h,
            w,
            counts: vec![h * w],
        };
    }
    let (u, v) = walk_edges(xy);
    let starts = column_crossings(&u, &v, h, w);
    crossings_to_rle(starts, h, w)
}

/// Dense boundary points of the closed polygon on the upsampled grid.
fn walk_edges(xy: &[f64]) -> (Vec<i32>, Vec<i32>) {
    let k = xy.len() / 2;
    let mut xs: Vec<i32> = (0..k)
        .map(|j| (POLY_SCALE * xy[2 * j] + 0.5) as i32)
        .collect();
    let mut ys: Vec<i32> = (0..k)
        .map(|j| (POLY_SCALE * xy[2 * j + 1] + 0.5) as i32)
        .collect();
    xs.push(xs[0]);
    ys.push(ys[0]);

    let total: usize = (0..k)
        .map(|j| {
            (xs[j] - xs[j + 1])
                .unsigned_abs()
                .max((ys[j] - ys[j + 1]).unsigned_abs()) as usize
                + 1
        })
        .sum();
    let mut u = Vec::with_capacity(total);
    let mut v = Vec::with_capacity(total);

    for j in 0..k {
        let (mut x0, mut x1, mut y0, mut y1) = (xs[j], xs[j + 1], ys[j], ys[j + 1]);
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let x_major = dx >= dy;
        // Always step from the lower end so an edge rasterizes the same
        // whichever direction the contour runs.
        let flip = if x_major { x0 > x1 } else { y0 > y1 };
        if flip {
            std::mem::swap(&mut x0, &mut x1);
            std::mem::swap(&mut y0, &mut y1);
        }
        let steps = if x_major { dx } else { dy };
        let slope = if steps == 0 {
            0.0
        } else if x_major {
            (y1 - y0) as f64 / steps as f64
        } else {
            (x1 - x0) as f64 / steps as f64
        };
        for d in 0..=steps {
            let t = if flip { steps - d } else { d };
            if x_major {
                u.push(x0 + t);
                v.push((y0 as f64 + slope * t as f64 + 0.5) as i32);
            } else {
                u.push((x0 as f64 + slope * t as f64 + 0.5) as i32);
                v.push(y0 + t);
            }
        }
    }
    (u, v)
}

/// Column-major offsets (`x * h + y`) where the fill toggles, one per
/// pixel-column boundary crossed by the polygon outline.
fn column_crossings(u: &[i32], v: &[i32], h: u32, w: u32) -> Vec<u32> {
    let max_x = w as f64 - 1.0;
    let mut starts = Vec::with_capacity(u.len());
    for j in 1..u.len() {
        if u[j] == u[j - 1] {
            continue;
        }
        let x_raw = if u[j] < u[j - 1] { u[j] } else { u[j] - 1 };
        let x = (x_raw as f64 + 0.5) / POLY_SCALE - 0.5;
        if x != x.floor() || x < 0.0 || x > max_x {
            continue;
        }
        let y_raw = v[j].min(v[j - 1]);
        let y = ((y_raw as f64 + 0.5) / POLY_SCALE - 0.5)
            .clamp(0.0, h as f64)
            .ceil();
        starts.push(x as u32 * h + y as u32);
    }
    starts
}

fn crossings_to_rle(mut starts: Vec<u32>, h: u32, w: u32) -> Rle {
    starts.push(h * w);
    starts.sort_unstable();

    let mut prev = 0u32;
    let runs: Vec<u32> = starts
        .into_iter()
        .map(|s| {
            let run = s - prev;
            prev = s;
            run
        })
        .collect();

    // A zero-length run cancels a toggle: fold the run after it into the
    // previous one.
    let mut counts = Vec::with_capacity(runs.len());
    let mut iter = runs.into_iter();
    if let Some(first) = iter.next() {
        counts.push(first);
    }
    while let Some(run) = iter.next() {
        if run > 0 {
            counts.push(run);
        } else if let Some(next) = iter.next() {
            if let Some(last) = counts.last_mut() {
                *last += next;
            }
        }
    }

    Rle { h, w, counts }
}

/// Fill every contour into one row-major `height × width` binary mask.
///
/// Overlapping contours are OR-ed together; contours with fewer than 3
/// points contribute nothing.
pub fn rasterize(contours: &[Vec<f64>], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    for contour in contours {
        let rle = fr_poly(contour, height as u32, width as u32);
        if area(&rle) == 0 {
            continue;
        }
        for (dst, src) in out.iter_mut().zip(to_row_major(&rle)) {
            *dst |= src;
        }
    }
    out
}

/// Turn any supported segmentation into a row-major binary mask of the given size.
pub fn segmentation_to_mask(seg: &Segmentation, height: usize, width: usize) -> Result<Vec<u8>> {
    let rle = match seg {
        Segmentation::Polygon(polys) => return Ok(rasterize(polys, width, height)),
        Segmentation::CompressedRle { size, counts } => rle_from_string(counts, size[0], size[1]),
        Segmentation::UncompressedRle { size, counts } => Rle {
            h: size[0],
            w: size[1],
            counts: counts.clone(),
        },
    };
    let (h, w) = (rle.h as usize, rle.w as usize);
    if h != height || w != width {
        return Err(Error::MaskShape {
            expected: height * width,
            actual: h * w,
        });
    }
    Ok(to_row_major(&rle))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Column-major binary mask to RLE, for building fixtures.
    fn encode(mask: &[u8], h: u32, w: u32) -> Rle {
        let n = (h as usize) * (w as usize);
        let mut counts = Vec::new();
        let mut prev = 0u8;
        let mut run = 0u32;
        for &v in mask.iter().take(n) {
            let v = u8::from(v != 0);
            if v != prev {
                counts.push(run);
                run = 0;
                prev = v;
            }
            run += 1;
        }
        counts.push(run);
        Rle { h, w, counts }
    }

    fn count(mask: &[u8]) -> usize {
        mask.iter().filter(|&&v| v != 0).count()
    }

    #[test]
    fn test_encode_decode_column_major() {
        let mask = vec![0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 0, 0];
        let rle = encode(&mask, 3, 4);
        assert_eq!(rle.counts, vec![3, 3, 2, 2, 2]);
        assert_eq!(decode(&rle), mask);
        assert_eq!(area(&rle), 5);
    }

    #[test]
    fn test_to_row_major_transposes() {
        // 2 rows x 3 cols, only pixel (x=2, y=0) set
        let rle = encode(&[0, 0, 0, 0, 1, 0], 2, 3);
        assert_eq!(to_row_major(&rle), vec![0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_rle_from_string_known_counts() {
        // counts past the third are stored as deltas: 2 - 2 = 0, 3 - 2 = 1
        let rle = rle_from_string("52201", 14, 1);
        assert_eq!(rle.counts, vec![5, 2, 2, 2, 3]);
        assert_eq!(area(&rle), 4);
    }

    #[test]
    fn test_fr_poly_triangle() {
        // pycocotools gives area=12 for this triangle
        let poly = vec![2.0, 2.0, 7.0, 2.0, 4.0, 7.0];
        assert_eq!(area(&fr_poly(&poly, 10, 10)), 12);
    }

    #[test]
    fn test_fr_poly_rect_nonsquare() {
        // 40x40 rectangle in a 200h x 100w image
        let poly = vec![10.0, 10.0, 50.0, 10.0, 50.0, 50.0, 10.0, 50.0];
        assert_eq!(area(&fr_poly(&poly, 200, 100)), 1600);
    }

    #[test]
    fn test_rasterize_square_pixels() {
        let square = vec![vec![5.0, 5.0, 15.0, 5.0, 15.0, 15.0, 5.0, 15.0]];
        let mask = rasterize(&square, 20, 20);
        assert_eq!(count(&mask), 100);
        assert_eq!(mask[5 * 20 + 5], 1);
        assert_eq!(mask[14 * 20 + 14], 1);
        assert_eq!(mask[15 * 20 + 15], 0);
        assert_eq!(mask[4 * 20 + 4], 0);
    }

    #[test]
    fn test_rasterize_non_square_canvas() {
        // 4 wide, 2 tall block in a 6 wide, 4 tall image
        let mask = rasterize(&[vec![0.0, 0.0, 4.0, 0.0, 4.0, 2.0, 0.0, 2.0]], 6, 4);
        #[rustfmt::skip]
        let expected = vec![
            1, 1, 1, 1, 0, 0,
            1, 1, 1, 1, 0, 0,
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
        ];
        assert_eq!(mask, expected);
    }

    #[test]
    fn test_rasterize_is_orientation_independent() {
        let cw = vec![2.0, 2.0, 7.0, 2.0, 4.0, 7.0];
        let ccw = vec![4.0, 7.0, 7.0, 2.0, 2.0, 2.0];
        let a = rasterize(&[cw.clone()], 10, 10);
        assert_eq!(a, rasterize(&[cw], 10, 10));
        assert_eq!(a, rasterize(&[ccw], 10, 10));
    }

    #[test]
    fn test_rasterize_unions_overlapping_contours() {
        let a = vec![0.0, 0.0, 6.0, 0.0, 6.0, 6.0, 0.0, 6.0];
        let b = vec![2.0, 2.0, 8.0, 2.0, 8.0, 8.0, 2.0, 8.0];
        let mask = rasterize(&[a, b], 10, 10);
        assert_eq!(count(&mask), 36 + 36 - 16);
        assert!(mask.iter().all(|&v| v <= 1));
    }

    #[test]
    fn test_rasterize_degenerate_contours() {
        let mask = rasterize(&[vec![1.0, 1.0, 5.0, 5.0], vec![]], 10, 10);
        assert_eq!(count(&mask), 0);
        assert!(rasterize(&[], 3, 3).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_segmentation_to_mask_rle_size_mismatch() {
        let seg = Segmentation::UncompressedRle {
            size: [4, 4],
            counts: vec![16],
        };
        assert!(matches!(
            segmentation_to_mask(&seg, 5, 5),
            Err(Error::MaskShape { .. })
        ));
        let mask = segmentation_to_mask(&seg, 4, 4).unwrap();
        assert_eq!(mask, vec![0; 16]);
    }
}
