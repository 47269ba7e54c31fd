// Pixel conversions and CPU-side image buffers.
//
// The slice converters work on four lanes at a time so the compiler can
// vectorise the body; the remainder goes through the scalar path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

// ──────────────────────────────────────────────
// binary16 <-> binary32
// ──────────────────────────────────────────────

/// Convert to IEEE binary16 with round-to-nearest-even.
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mut mant = bits & 0x007f_ffff;

    if exp == 0xff {
        let nan = if mant != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }

    let half_exp = exp - 127 + 15;
    if half_exp >= 0x1f {
        return sign | 0x7c00;
    }

    if half_exp <= 0 {
        if half_exp < -10 {
            return sign;
        }
        mant |= 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let half_mant = mant >> shift;
        let round_bit = 1u32 << (shift - 1);
        let rounded = if mant & round_bit != 0 && mant & (3 * round_bit - 1) != 0 {
            half_mant + 1
        } else {
            half_mant
        };
        return sign | rounded as u16;
    }

    let half = ((half_exp as u32) << 10) | (mant >> 13);
    let round_bit = 0x1000u32;
    let rounded = if mant & round_bit != 0 && mant & (3 * round_bit - 1) != 0 {
        half + 1
    } else {
        half
    };
    sign | rounded as u16
}

pub fn f16_to_f32(half: u16) -> f32 {
    let sign = ((half & 0x8000) as u32) << 16;
    let exp = ((half >> 10) & 0x1f) as u32;
    let mant = (half & 0x03ff) as u32;
    let bits = match (exp, mant) {
        (0, 0) => sign,
        (0, _) => {
            let value = mant as f32 * (1.0 / 16_777_216.0);
            return if sign != 0 { -value } else { value };
        }
        (0x1f, 0) => sign | 0x7f80_0000,
        (0x1f, _) => sign | 0x7fc0_0000 | (mant << 13),
        _ => sign | ((exp + 112) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

/// Convert a slice of f32 to binary16. `dst` must be at least as long as `src`.
pub fn convert_f32_to_f16(src: &[f32], dst: &mut [u16]) {
    let n = src.len().min(dst.len());
    let (src, dst) = (&src[..n], &mut dst[..n]);
    let mut src_chunks = src.chunks_exact(4);
    let mut dst_chunks = dst.chunks_exact_mut(4);
    for (s, d) in (&mut src_chunks).zip(&mut dst_chunks) {
        let lanes = [s[0], s[1], s[2], s[3]];
        let out = lanes.map(f32_to_f16);
        d.copy_from_slice(&out);
    }
    for (s, d) in src_chunks
        .remainder()
        .iter()
        .zip(dst_chunks.into_remainder().iter_mut())
    {
        *d = f32_to_f16(*s);
    }
}

pub fn convert_f16_to_f32(src: &[u16], dst: &mut [f32]) {
    let n = src.len().min(dst.len());
    let (src, dst) = (&src[..n], &mut dst[..n]);
    let mut src_chunks = src.chunks_exact(4);
    let mut dst_chunks = dst.chunks_exact_mut(4);
    for (s, d) in (&mut src_chunks).zip(&mut dst_chunks) {
        let lanes = [s[0], s[1], s[2], s[3]];
        d.copy_from_slice(&lanes.map(f16_to_f32));
    }
    for (s, d) in src_chunks
        .remainder()
        .iter()
        .zip(dst_chunks.into_remainder().iter_mut())
    {
        *d = f16_to_f32(*s);
    }
}

// ──────────────────────────────────────────────
// Transfer functions
// ──────────────────────────────────────────────

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Lookup table: 8-bit sRGB code value -> linear binary16.
fn srgb8_to_f16_table() -> &'static [u16; 256] {
    static TABLE: OnceLock<[u16; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u16; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = f32_to_f16(srgb_to_linear(i as f32 / 255.0));
        }
        table
    })
}

// ──────────────────────────────────────────────
// PixelBuffer
// ──────────────────────────────────────────────

/// Content hash of an image: identical pixels loaded from different
/// sources share one key and therefore one set of atlas tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey(pub u64);

/// Linear RGBA binary16 pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u16; 4]>,
    key: ImageKey,
}

impl PixelBuffer {
    /// Returns `None` when `pixels.len() != width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<[u16; 4]>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        let key = Self::hash_content(width, height, &pixels);
        Some(Self {
            width,
            height,
            pixels,
            key,
        })
    }

    /// Decode 8-bit sRGB RGBA bytes into linear binary16 pixels.
    pub fn from_srgba8(width: u32, height: u32, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != width as usize * height as usize * 4 {
            return None;
        }
        let table = srgb8_to_f16_table();
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| {
                [
                    table[p[0] as usize],
                    table[p[1] as usize],
                    table[p[2] as usize],
                    f32_to_f16(p[3] as f32 / 255.0),
                ]
            })
            .collect();
        Self::new(width, height, pixels)
    }

    /// Solid-color image; handy for placeholders.
    pub fn filled(width: u32, height: u32, color: crate::Color) -> Self {
        let px = color.to_vec4h();
        let pixels = vec![px; width as usize * height as usize];
        let key = Self::hash_content(width, height, &pixels);
        Self {
            width,
            height,
            pixels,
            key,
        }
    }

    fn hash_content(width: u32, height: u32, pixels: &[[u16; 4]]) -> ImageKey {
        let mut hasher = DefaultHasher::new();
        width.hash(&mut hasher);
        height.hash(&mut hasher);
        pixels.hash(&mut hasher);
        ImageKey(hasher.finish())
    }

    pub fn key(&self) -> ImageKey {
        self.key
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[[u16; 4]] {
        &self.pixels
    }

    /// Pixel at (x, y) with coordinates clamped to the image edge.
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [u16; 4] {
        if self.width == 0 || self.height == 0 {
            return [0; 4];
        }
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f16_known_values() {
        assert_eq!(f32_to_f16(0.0), 0x0000);
        assert_eq!(f32_to_f16(-0.0), 0x8000);
        assert_eq!(f32_to_f16(1.0), 0x3c00);
        assert_eq!(f32_to_f16(-2.0), 0xc000);
        assert_eq!(f32_to_f16(65504.0), 0x7bff);
        assert_eq!(f32_to_f16(1.0e6), 0x7c00);
        assert_eq!(f32_to_f16(0.5), 0x3800);
    }

    #[test]
    fn f16_round_trip_is_close() {
        for i in 0..=1000 {
            let v = i as f32 / 1000.0;
            let back = f16_to_f32(f32_to_f16(v));
            assert!((back - v).abs() <= v.abs() / 1024.0 + 1e-7, "{v} -> {back}");
        }
    }

    #[test]
    fn subnormal_round_trip() {
        let tiny = 3.0e-6;
        let back = f16_to_f32(f32_to_f16(tiny));
        assert!((back - tiny).abs() < 6.0e-8);
    }

    #[test]
    fn slice_conversion_matches_scalar() {
        let src: Vec<f32> = (0..11).map(|i| i as f32 * 0.37 - 1.5).collect();
        let mut dst = vec![0u16; src.len()];
        convert_f32_to_f16(&src, &mut dst);
        for (s, d) in src.iter().zip(&dst) {
            assert_eq!(*d, f32_to_f16(*s));
        }
        let mut back = vec![0f32; src.len()];
        convert_f16_to_f32(&dst, &mut back);
        for (d, b) in dst.iter().zip(&back) {
            assert_eq!(*b, f16_to_f32(*d));
        }
    }

    #[test]
    fn srgb_round_trip() {
        for i in 0..=255 {
            let c = i as f32 / 255.0;
            assert!((linear_to_srgb(srgb_to_linear(c)) - c).abs() < 1e-4);
        }
    }

    #[test]
    fn identical_content_shares_key() {
        let a = PixelBuffer::from_srgba8(2, 1, &[255, 0, 0, 255, 0, 255, 0, 255]).unwrap();
        let b = PixelBuffer::from_srgba8(2, 1, &[255, 0, 0, 255, 0, 255, 0, 255]).unwrap();
        let c = PixelBuffer::from_srgba8(1, 2, &[255, 0, 0, 255, 0, 255, 0, 255]).unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn mismatched_length_is_rejected() {
        assert!(PixelBuffer::new(2, 2, vec![[0; 4]; 3]).is_none());
    }
}
