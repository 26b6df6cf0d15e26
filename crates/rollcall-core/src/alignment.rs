//! Face alignment via 4-DOF similarity transform.
//!
//! The encoder consumes a canonical 150×150 chip. Five anchor points are
//! derived from the 68 detected landmarks, a least-squares similarity
//! transform maps them onto fixed reference positions, and the chip is
//! produced by an inverse-mapped bilinear warp of the source image. Jitter
//! renders additional chips through small random perturbations of the same
//! transform.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::Rng;

/// Canonical encoder chip edge length.
pub const CHIP_SIZE: u32 = 150;

/// Reference anchor positions for the 150×150 chip:
/// left eye, right eye, nose tip, left mouth corner, right mouth corner.
const REFERENCE_ANCHORS_150: [(f32, f32); 5] = [
    (51.288, 69.236),
    (98.481, 68.975),
    (75.034, 96.076),
    (55.646, 123.703),
    (94.727, 123.487),
];

/// Jitter perturbation ranges, in chip space.
const JITTER_MAX_ROTATION: f32 = 0.035; // radians
const JITTER_MAX_SCALE_DELTA: f32 = 0.04;
const JITTER_MAX_SHIFT: f32 = 0.02; // fraction of the chip edge

/// Reduce a 68-point landmark set to the five alignment anchors.
///
/// Eye centers are the mean of the six points around each eye (36-41 and
/// 42-47 in canonical indexing), the nose tip is point 30, and the mouth
/// corners are points 48 and 54.
pub fn anchor_points(landmarks: &[(f32, f32)]) -> [(f32, f32); 5] {
    let mean = |range: std::ops::RangeInclusive<usize>| -> (f32, f32) {
        let n = (range.end() - range.start() + 1) as f32;
        let (sx, sy) = landmarks[range]
            .iter()
            .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    };

    [mean(36..=41), mean(42..=47), landmarks[30], landmarks[48], landmarks[54]]
}

/// Estimate a 2×3 similarity transform (4-DOF: scale, rotation, translation)
/// from `src` anchors to the canonical chip anchors using least-squares.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
pub fn estimate_chip_transform(src: &[(f32, f32); 5]) -> [f32; 6] {
    estimate_similarity_transform(src, &REFERENCE_ANCHORS_150)
}

fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Build overdetermined system A * [a, b, tx, ty]^T = B.
    // For each point pair (sx, sy) -> (dx, dy):
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16]; // 4x4, row-major
    let mut atb = [0.0f32; 4];

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];

        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let x = solve_4x4(&ata, &atb);
    let (a, b, tx, ty) = (x[0], x[1], x[2], x[3]);

    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    // Augmented matrix [A | b] as 4x5
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        let mut max_val = m[col][col].abs();
        for row in (col + 1)..4 {
            if m[row][col].abs() > max_val {
                max_val = m[row][col].abs();
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0]; // degenerate anchors: identity-ish
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }

    x
}

/// Compose a small random similarity on top of a chip transform.
///
/// The perturbation rotates, scales, and shifts about the chip center, so a
/// jittered chip stays centered on the same face. Determinism comes from the
/// caller seeding the RNG.
pub fn perturbed(matrix: &[f32; 6], rng: &mut StdRng, chip_size: f32) -> [f32; 6] {
    let angle: f32 = rng.gen_range(-JITTER_MAX_ROTATION..=JITTER_MAX_ROTATION);
    let scale: f32 = 1.0 + rng.gen_range(-JITTER_MAX_SCALE_DELTA..=JITTER_MAX_SCALE_DELTA);
    let max_shift = JITTER_MAX_SHIFT * chip_size;
    let dx: f32 = rng.gen_range(-max_shift..=max_shift);
    let dy: f32 = rng.gen_range(-max_shift..=max_shift);

    let ja = scale * angle.cos();
    let jb = scale * angle.sin();
    let (cx, cy) = (chip_size / 2.0, chip_size / 2.0);
    // Rotate/scale about the chip center, then shift.
    let jtx = cx - (ja * cx - jb * cy) + dx;
    let jty = cy - (jb * cx + ja * cy) + dy;

    let (a, b, tx, ty) = (matrix[0], matrix[3], matrix[2], matrix[5]);

    // Similarity composition J ∘ M stays a similarity.
    let na = ja * a - jb * b;
    let nb = jb * a + ja * b;
    let ntx = ja * tx - jb * ty + jtx;
    let nty = jb * tx + ja * ty + jty;

    [na, -nb, ntx, nb, na, nty]
}

/// Warp an RGB image into a square chip through a 2×3 similarity transform.
///
/// Uses inverse mapping with bilinear interpolation; pixels that map outside
/// the source are filled with black.
pub fn warp_chip(image: &RgbImage, matrix: &[f32; 6], out_size: u32) -> RgbImage {
    let (a, _neg_b, tx) = (matrix[0], matrix[1], matrix[2]);
    let (b, _a2, ty) = (matrix[3], matrix[4], matrix[5]);

    // Invert the 2x2 part: M = [[a, -b], [b, a]], det = a^2 + b^2
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return RgbImage::new(out_size, out_size);
    }
    let inv_det = 1.0 / det;
    let ia = a * inv_det;
    let ib = b * inv_det;

    let (width, height) = image.dimensions();
    let mut output = RgbImage::new(out_size, out_size);

    for oy in 0..out_size {
        for ox in 0..out_size {
            // Map output pixel back to source: src = M_inv * (dst - t)
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let (x1, y1) = (x0 + 1, y0 + 1);
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let sample = |x: i32, y: i32, c: usize| -> f32 {
                if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                    image.get_pixel(x as u32, y as u32).0[c] as f32
                } else {
                    0.0
                }
            };

            let mut pixel = [0u8; 3];
            for (c, out) in pixel.iter_mut().enumerate() {
                let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + sample(x1, y0, c) * fx * (1.0 - fy)
                    + sample(x0, y1, c) * (1.0 - fx) * fy
                    + sample(x1, y1, c) * fx * fy;
                *out = val.round().clamp(0.0, 255.0) as u8;
            }
            output.put_pixel(ox, oy, Rgb(pixel));
        }
    }

    output
}
