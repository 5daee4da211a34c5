//! Raster loader - reads a multi-band GeoTIFF into a pixel table
//!
//! Each band becomes one `Float64` column and each pixel one row. The
//! spatial grid is flattened row-major, so pixel `(row, col)` lands in
//! table row `row * width + col`.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use thiserror::Error;

use super::geotiff::TiffReader;

/// Band names in the order they are stored in the composite raster
pub const BAND_NAMES: [&str; 10] = [
    "aspect",
    "elevation",
    "geology",
    "landslide_scars",
    "ndvi",
    "plan_curv",
    "profile_curv",
    "slope",
    "spi",
    "twi",
];

/// Errors raised while decoding a raster file
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TIFF: {0}")]
    InvalidTiff(String),

    #[error("Unsupported sample type: {bits}-bit, SampleFormat {format}")]
    UnsupportedSampleFormat { bits: u16, format: u16 },

    #[error("Unsupported TIFF compression: {0}")]
    UnsupportedCompression(u16),

    #[error("Unsupported TIFF predictor: {0}")]
    UnsupportedPredictor(u16),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Expected {expected} bands, found {found}")]
    BandCountMismatch { expected: usize, found: usize },

    #[error("Band {band} is {width}x{height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        band: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
}

/// Dimensions of a loaded raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterInfo {
    pub bands: usize,
    pub height: usize,
    pub width: usize,
}

impl RasterInfo {
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }
}

/// Decoded band arrays, one `Vec` per band in file order
#[derive(Debug, Clone)]
pub struct RasterBands {
    pub info: RasterInfo,
    pub bands: Vec<Vec<f64>>,
}

/// Load the composite raster at `path` into a pixel table with one column per
/// entry of [`BAND_NAMES`].
pub fn load_raster(path: &Path) -> Result<(DataFrame, RasterInfo)> {
    let raster = read_raster_bands(path)
        .with_context(|| format!("Failed to read raster: {}", path.display()))?;

    if raster.bands.len() != BAND_NAMES.len() {
        let err = RasterError::BandCountMismatch {
            expected: BAND_NAMES.len(),
            found: raster.bands.len(),
        };
        return Err(anyhow::Error::new(err)
            .context(format!("Failed to read raster: {}", path.display())));
    }

    let df = pixel_table_from_bands(
        &BAND_NAMES,
        raster.bands,
        raster.info.height,
        raster.info.width,
    )?;

    Ok((df, raster.info))
}

/// Read every band of a TIFF file as `f64` samples
pub fn read_raster_bands(path: &Path) -> std::result::Result<RasterBands, RasterError> {
    let file = File::open(path)?;
    decode_bands(BufReader::new(file))
}

/// Decode all bands from any `Read + Seek` source.
///
/// Samples of every full-resolution image directory are appended in file
/// order, so a single ten-sample image (chunky or planar) and ten one-sample
/// pages both yield ten bands. Overviews and masks are skipped.
pub fn decode_bands<R: Read + Seek>(reader: R) -> std::result::Result<RasterBands, RasterError> {
    let mut tiff = TiffReader::new(reader)?;
    let mut size: Option<(usize, usize)> = None;
    let mut bands: Vec<Vec<f64>> = Vec::new();

    while let Some(dir) = tiff.next_directory()? {
        if dir.reduced_resolution {
            continue;
        }
        match size {
            None => size = Some((dir.width, dir.height)),
            Some((width, height)) if (dir.width, dir.height) != (width, height) => {
                return Err(RasterError::DimensionMismatch {
                    band: bands.len(),
                    width: dir.width,
                    height: dir.height,
                    expected_width: width,
                    expected_height: height,
                });
            }
            Some(_) => {}
        }
        bands.extend(tiff.read_bands(&dir)?);
    }

    let (width, height) =
        size.ok_or_else(|| RasterError::InvalidTiff("no full-resolution image".to_string()))?;

    Ok(RasterBands {
        info: RasterInfo {
            bands: bands.len(),
            height,
            width,
        },
        bands,
    })
}

/// Build a pixel table from per-band arrays of `height * width` values
pub fn pixel_table_from_bands(
    names: &[&str],
    bands: Vec<Vec<f64>>,
    height: usize,
    width: usize,
) -> Result<DataFrame> {
    if names.len() != bands.len() {
        anyhow::bail!(
            "{} band names supplied for {} bands",
            names.len(),
            bands.len()
        );
    }

    let pixels = height * width;
    let columns: Vec<Column> = names
        .iter()
        .zip(bands)
        .map(|(name, values)| {
            if values.len() != pixels {
                anyhow::bail!(
                    "Band '{}' holds {} values, expected {} ({}x{})",
                    name,
                    values.len(),
                    pixels,
                    height,
                    width
                );
            }
            Ok(Column::new((*name).into(), values))
        })
        .collect::<Result<_>>()?;

    DataFrame::new(columns).context("Failed to assemble pixel table")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_invalid() {
        let result = decode_bands(std::io::Cursor::new(Vec::new()));
        assert!(matches!(result, Err(RasterError::InvalidTiff(_))));
    }

    #[test]
    fn test_pixel_table_row_major() {
        let df = pixel_table_from_bands(
            &["a", "b"],
            vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![0.0; 6]],
            2,
            3,
        )
        .unwrap();

        assert_eq!(df.shape(), (6, 2));
        let a: Vec<f64> = df.column("a").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(a, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_pixel_table_rejects_wrong_length() {
        let result = pixel_table_from_bands(&["a"], vec![vec![1.0, 2.0, 3.0]], 2, 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_pixel_table_rejects_name_mismatch() {
        let result = pixel_table_from_bands(&["a", "b"], vec![vec![1.0]], 1, 1);
        assert!(result.is_err());
    }
}
