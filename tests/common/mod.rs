//! Fixture profiles for the integration tests.
//!
//! The source side is the engine's own sRGB, serialized to disk. The
//! destination side is a small ICC v2 output profile (CMYK <-> Lab, lut16
//! tables) built here from a naive ink model: K carries darkness, C/M/Y carry
//! chroma. Not a press profile, but a well-formed one the engine accepts in
//! both directions, which is all the tests need.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub struct Fixtures {
    pub srgb: PathBuf,
    pub cmyk: PathBuf,
    pub dir: PathBuf,
}

pub fn fixtures() -> &'static Fixtures {
    static FIXTURES: OnceLock<Fixtures> = OnceLock::new();
    FIXTURES.get_or_init(|| {
        let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(format!(
            "sepcon-fixtures-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();

        let srgb = dir.join("sRGB.icc");
        let bytes = lcms2::Profile::new_srgb()
            .icc()
            .expect("serialize built-in sRGB");
        fs::write(&srgb, bytes).unwrap();

        let cmyk = dir.join("synthetic_CMYK.icc");
        fs::write(&cmyk, synthetic_cmyk_profile()).unwrap();

        Fixtures { srgb, cmyk, dir }
    })
}

/// A fresh path inside the fixture directory.
pub fn scratch(name: &str) -> PathBuf {
    fixtures().dir.join(name)
}

// ---------------- synthetic CMYK profile ----------------

const A2B_GRID: usize = 5;
const B2A_GRID: usize = 17;

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn s15f16(v: f64) -> u32 {
    (v * 65536.0).round() as i32 as u32
}

fn enc_unit(v: f64) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

// Legacy (v2) 16-bit Lab encoding: L 100 -> 0xFF00, a/b 0 -> 0x8000.
fn enc_lab(l: f64, a: f64, b: f64) -> [u16; 3] {
    let l = (l * 652.8).round().clamp(0.0, 65535.0) as u16;
    let a = (a * 256.0 + 32768.0).round().clamp(0.0, 65535.0) as u16;
    let b = (b * 256.0 + 32768.0).round().clamp(0.0, 65535.0) as u16;
    [l, a, b]
}

fn dec_lab(l: u16, a: u16, b: u16) -> (f64, f64, f64) {
    (
        f64::from(l) / 652.8,
        (f64::from(a) - 32768.0) / 256.0,
        (f64::from(b) - 32768.0) / 256.0,
    )
}

fn cmyk_to_lab(c: f64, m: f64, y: f64, k: f64) -> (f64, f64, f64) {
    let r = (1.0 - c - k).max(0.0);
    let g = (1.0 - m - k).max(0.0);
    let b = (1.0 - y - k).max(0.0);
    (
        100.0 * (0.3 * r + 0.59 * g + 0.11 * b),
        50.0 * (r - g),
        50.0 * (g - b),
    )
}

// Exact inverse of `cmyk_to_lab` inside its gamut; C/M/Y never exceed 1 - K.
fn lab_to_cmyk(l: f64, a: f64, b: f64) -> [f64; 4] {
    let g = (l / 100.0 - 0.006 * a + 0.0022 * b).clamp(0.0, 1.0);
    let r = (g + a / 50.0).clamp(0.0, 1.0);
    let bl = (g - b / 50.0).clamp(0.0, 1.0);

    let lightest = r.max(g).max(bl);
    [lightest - r, lightest - g, lightest - bl, 1.0 - lightest]
}

fn grid_value(i: usize, grid: usize) -> u16 {
    (i as f64 * 65535.0 / (grid - 1) as f64).round() as u16
}

/// lut16Type ('mft2') with identity matrix and 2-entry identity curves.
fn lut16(inputs: usize, outputs: usize, grid: usize, clut: &[u16]) -> Vec<u8> {
    assert_eq!(clut.len(), grid.pow(inputs as u32) * outputs);

    let mut t = Vec::new();
    t.extend_from_slice(b"mft2");
    put_u32(&mut t, 0);
    t.push(inputs as u8);
    t.push(outputs as u8);
    t.push(grid as u8);
    t.push(0);
    for row in 0..3 {
        for col in 0..3 {
            put_u32(&mut t, s15f16(if row == col { 1.0 } else { 0.0 }));
        }
    }
    put_u16(&mut t, 2);
    put_u16(&mut t, 2);
    for _ in 0..inputs {
        put_u16(&mut t, 0);
        put_u16(&mut t, 65535);
    }
    for &v in clut {
        put_u16(&mut t, v);
    }
    for _ in 0..outputs {
        put_u16(&mut t, 0);
        put_u16(&mut t, 65535);
    }
    t
}

fn a2b0() -> Vec<u8> {
    let g = A2B_GRID;
    let mut clut = Vec::with_capacity(g.pow(4) * 3);
    // First input channel varies slowest.
    for ic in 0..g {
        for im in 0..g {
            for iy in 0..g {
                for ik in 0..g {
                    let unit = |i: usize| i as f64 / (g - 1) as f64;
                    let (l, a, b) = cmyk_to_lab(unit(ic), unit(im), unit(iy), unit(ik));
                    clut.extend_from_slice(&enc_lab(l, a, b));
                }
            }
        }
    }
    lut16(4, 3, g, &clut)
}

fn b2a0() -> Vec<u8> {
    let g = B2A_GRID;
    let mut clut = Vec::with_capacity(g.pow(3) * 4);
    for il in 0..g {
        for ia in 0..g {
            for ib in 0..g {
                let (l, a, b) = dec_lab(grid_value(il, g), grid_value(ia, g), grid_value(ib, g));
                for v in lab_to_cmyk(l, a, b) {
                    clut.push(enc_unit(v));
                }
            }
        }
    }
    lut16(3, 4, g, &clut)
}

fn xyz_tag(x: f64, y: f64, z: f64) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(b"XYZ ");
    put_u32(&mut t, 0);
    put_u32(&mut t, s15f16(x));
    put_u32(&mut t, s15f16(y));
    put_u32(&mut t, s15f16(z));
    t
}

/// Serialized ICC v2.1 output-class CMYK profile with Lab PCS.
pub fn synthetic_cmyk_profile() -> Vec<u8> {
    const D50: (f64, f64, f64) = (0.9642, 1.0, 0.8249);

    let tags: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"wtpt", xyz_tag(D50.0, D50.1, D50.2)),
        (b"A2B0", a2b0()),
        (b"B2A0", b2a0()),
    ];

    let table_len = 4 + 12 * tags.len();
    let mut offset = 128 + table_len;
    let mut table = Vec::new();
    let mut data = Vec::new();
    put_u32(&mut table, tags.len() as u32);
    for (sig, body) in &tags {
        table.extend_from_slice(*sig);
        put_u32(&mut table, offset as u32);
        put_u32(&mut table, body.len() as u32);
        data.extend_from_slice(body);
        offset += body.len();
        while data.len() % 4 != 0 {
            data.push(0);
            offset += 1;
        }
    }
    let total = 128 + table.len() + data.len();

    let mut header = Vec::with_capacity(128);
    put_u32(&mut header, total as u32);
    put_u32(&mut header, 0); // CMM
    put_u32(&mut header, 0x0210_0000); // version 2.1
    header.extend_from_slice(b"prtr");
    header.extend_from_slice(b"CMYK");
    header.extend_from_slice(b"Lab ");
    header.extend_from_slice(&[0u8; 12]); // date
    header.extend_from_slice(b"acsp");
    header.extend_from_slice(&[0u8; 24]); // platform .. attributes
    put_u32(&mut header, 0); // perceptual
    put_u32(&mut header, s15f16(D50.0));
    put_u32(&mut header, s15f16(D50.1));
    put_u32(&mut header, s15f16(D50.2));
    header.resize(128, 0);

    let mut icc = header;
    icc.extend_from_slice(&table);
    icc.extend_from_slice(&data);
    assert_eq!(icc.len(), total);
    icc
}

/// black, red, green, blue at full 16-bit range.
pub const REFERENCE_RGB: [u16; 12] = [
    0, 0, 0, //
    65535, 0, 0, //
    0, 65535, 0, //
    0, 0, 65535,
];

/// Deterministic pseudo-random 16-bit RGB samples.
pub fn noise_rgb(pixels: usize, seed: u32) -> Vec<u16> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    (0..pixels * 3)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as u16
        })
        .collect()
}
