//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use scarp::pipeline::{pixel_table_from_bands, TrainingConfig, BAND_NAMES};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};

pub const WIDTH: usize = 4;
pub const HEIGHT: usize = 4;

/// Ten bands of a 4x4 raster, in `BAND_NAMES` order.
///
/// Every value is inside its valid range. Odd pixels lie on a scar (1),
/// even pixels carry the no-scar sentinel (-1), giving 8 pixels per class.
/// Scar pixels are steeper, so the classes are separable on slope.
pub fn band_values() -> Vec<Vec<f64>> {
    fn band(f: impl Fn(usize) -> f64) -> Vec<f64> {
        (0..WIDTH * HEIGHT).map(f).collect()
    }
    fn on_scar(i: usize) -> bool {
        i % 2 == 1
    }

    vec![
        band(|i| (i * 20) as f64),                       // aspect
        band(|i| 100.0 + (i * 10) as f64),               // elevation
        band(|i| (i % 4) as f64),                        // geology
        band(|i| if on_scar(i) { 1.0 } else { -1.0 }),   // landslide_scars
        band(|i| 0.1 + 0.02 * i as f64),                 // ndvi
        band(|i| -1.0 + 0.1 * i as f64),                 // plan_curv
        band(|i| 0.5 - 0.05 * i as f64),                 // profile_curv
        band(|i| (if on_scar(i) { 35.0 } else { 5.0 }) + i as f64), // slope
        band(|i| -2.0 + 0.2 * i as f64),                 // spi
        band(|i| 5.0 + 0.5 * i as f64),                  // twi
    ]
}

/// Pixel table of [`band_values`]
pub fn create_pixel_table() -> DataFrame {
    pixel_table_from_bands(&BAND_NAMES, band_values(), HEIGHT, WIDTH).unwrap()
}

/// Write bands as a multi-page float TIFF, one page per band
pub fn write_band_tiff(path: &Path, bands: &[Vec<f64>], width: usize, height: usize) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    for band in bands {
        let data: Vec<f32> = band.iter().map(|&v| v as f32).collect();
        encoder
            .write_image::<colortype::Gray32Float>(width as u32, height as u32, &data)
            .unwrap();
    }
}

/// Sample arrangement of a single-directory multi-band TIFF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// PlanarConfiguration 1: samples of a pixel stored together
    Chunky,
    /// PlanarConfiguration 2: one strip per band
    Planar,
}

/// Write bands as one little-endian float32 image with one sample per band,
/// the way GDAL and rasterio store a multi-band GeoTIFF.
pub fn write_multiband_tiff(
    path: &Path,
    bands: &[Vec<f64>],
    width: usize,
    height: usize,
    layout: SampleLayout,
    deflate: bool,
) {
    let n_bands = bands.len();
    assert!(n_bands > 2, "per-sample arrays are written out of line");
    let mut strips: Vec<Vec<u8>> = match layout {
        SampleLayout::Chunky => {
            let mut strip = Vec::with_capacity(width * height * n_bands * 4);
            for pixel in 0..width * height {
                for band in bands {
                    strip.extend_from_slice(&(band[pixel] as f32).to_le_bytes());
                }
            }
            vec![strip]
        }
        SampleLayout::Planar => bands
            .iter()
            .map(|band| band.iter().flat_map(|&v| (v as f32).to_le_bytes()).collect())
            .collect(),
    };
    if deflate {
        strips = strips
            .into_iter()
            .map(|strip| {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&strip).unwrap();
                encoder.finish().unwrap()
            })
            .collect();
    }

    let mut buf = b"II*\0".to_vec();
    buf.extend_from_slice(&0u32.to_le_bytes());

    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for strip in &strips {
        offsets.push(buf.len() as u32);
        counts.push(strip.len() as u32);
        buf.extend_from_slice(strip);
    }
    if buf.len() % 2 == 1 {
        buf.push(0);
    }

    // out-of-line arrays; single values are stored inline
    let shorts = |buf: &mut Vec<u8>, value: u16| {
        let at = buf.len() as u32;
        for _ in 0..n_bands {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        at
    };
    let bits_at = shorts(&mut buf, 32);
    let format_at = shorts(&mut buf, 3);
    let longs = |buf: &mut Vec<u8>, values: &[u32]| {
        if values.len() == 1 {
            return values[0];
        }
        let at = buf.len() as u32;
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        at
    };
    let offsets_at = longs(&mut buf, &offsets);
    let counts_at = longs(&mut buf, &counts);

    let ifd = buf.len() as u32;
    buf[4..8].copy_from_slice(&ifd.to_le_bytes());

    let n = n_bands as u32;
    let entries: [(u16, u16, u32, u32); 11] = [
        (256, 4, 1, width as u32),
        (257, 4, 1, height as u32),
        (258, 3, n, bits_at),
        (259, 3, 1, if deflate { 8 } else { 1 }),
        (262, 3, 1, 1),
        (273, 4, offsets.len() as u32, offsets_at),
        (277, 3, 1, n),
        (278, 4, 1, height as u32),
        (279, 4, counts.len() as u32, counts_at),
        (284, 3, 1, if layout == SampleLayout::Planar { 2 } else { 1 }),
        (339, 3, n, format_at),
    ];
    buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, type_id, count, value) in entries {
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&type_id.to_le_bytes());
        buf.extend_from_slice(&count.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes());

    std::fs::write(path, buf).unwrap();
}

/// Create a temporary directory holding the 4x4 ten-band raster
pub fn create_temp_raster() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let raster_path = temp_dir.path().join("composite_bands4.tif");
    write_band_tiff(&raster_path, &band_values(), WIDTH, HEIGHT);
    (temp_dir, raster_path)
}

/// Training configuration small enough for tests
pub fn fast_config() -> TrainingConfig {
    let mut config = TrainingConfig::default();
    config.forest.n_trees = 20;
    config.mlp.max_epochs = 200;
    config
}

/// Labels alternating between classes with `positives` ones at the end
pub fn imbalanced_labels(negatives: usize, positives: usize) -> Vec<u8> {
    let mut labels = vec![0u8; negatives];
    labels.extend(std::iter::repeat(1u8).take(positives));
    labels
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}
