//! Tests for raster loading

use scarp::pipeline::{decode_bands, load_raster, read_raster_bands, RasterError, BAND_NAMES};
use std::io::Cursor;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_load_multipage_raster() {
    let (_temp_dir, path) = create_temp_raster();

    let (df, info) = load_raster(&path).unwrap();

    assert_eq!(info.bands, 10);
    assert_eq!((info.width, info.height), (WIDTH, HEIGHT));
    assert_eq!(info.pixels(), 16);
    assert_shape(&df, 16, 10);

    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, BAND_NAMES.map(String::from).to_vec());
}

#[test]
fn test_loaded_values_match_bands() {
    let (_temp_dir, path) = create_temp_raster();
    let (df, _) = load_raster(&path).unwrap();
    let expected = band_values();

    for (name, band) in BAND_NAMES.iter().zip(&expected) {
        let column = df.column(name).unwrap().as_materialized_series().clone();
        let values: Vec<f64> = column.f64().unwrap().into_no_null_iter().collect();
        for (got, want) in values.iter().zip(band) {
            // bands are stored as f32
            assert!((got - want).abs() < 1e-5, "{}: {} != {}", name, got, want);
        }
    }
}

#[test]
fn test_decode_from_memory() {
    let (_temp_dir, path) = create_temp_raster();
    let bytes = std::fs::read(&path).unwrap();

    let raster = decode_bands(Cursor::new(bytes)).unwrap();
    assert_eq!(raster.bands.len(), 10);
    assert!(raster.bands.iter().all(|b| b.len() == 16));
}

#[test]
fn test_wrong_band_count_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("three_bands.tif");
    write_band_tiff(&path, &band_values()[..3], WIDTH, HEIGHT);

    let err = load_raster(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Expected 10 bands, found 3"));
}

#[test]
fn test_garbage_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("not_a_raster.tif");
    std::fs::write(&path, b"this is not a tiff file").unwrap();

    assert!(matches!(read_raster_bands(&path), Err(RasterError::InvalidTiff(_))));
    assert!(load_raster(&path).is_err());
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.tif");

    assert!(matches!(read_raster_bands(&path), Err(RasterError::Io(_))));
}

fn assert_bands_match(raster_bands: &[Vec<f64>]) {
    let expected = band_values();
    assert_eq!(raster_bands.len(), expected.len());
    for (band, (got, want)) in raster_bands.iter().zip(&expected).enumerate() {
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-5, "band {}: {} != {}", band, g, w);
        }
    }
}

#[test]
fn test_load_pixel_interleaved_raster() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("chunky.tif");
    write_multiband_tiff(&path, &band_values(), WIDTH, HEIGHT, SampleLayout::Chunky, false);

    let raster = read_raster_bands(&path).unwrap();
    assert_eq!(raster.info.bands, 10);
    assert_eq!((raster.info.width, raster.info.height), (WIDTH, HEIGHT));
    assert_bands_match(&raster.bands);

    let (df, _) = load_raster(&path).unwrap();
    assert_shape(&df, 16, 10);
}

#[test]
fn test_load_planar_raster() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("planar.tif");
    write_multiband_tiff(&path, &band_values(), WIDTH, HEIGHT, SampleLayout::Planar, false);

    let raster = read_raster_bands(&path).unwrap();
    assert_eq!(raster.info.bands, 10);
    assert_bands_match(&raster.bands);
}

#[test]
fn test_load_deflate_compressed_raster() {
    let temp_dir = TempDir::new().unwrap();
    for layout in [SampleLayout::Chunky, SampleLayout::Planar] {
        let path = temp_dir.path().join(format!("{:?}_deflate.tif", layout));
        write_multiband_tiff(&path, &band_values(), WIDTH, HEIGHT, layout, true);

        let raster = read_raster_bands(&path).unwrap();
        assert_bands_match(&raster.bands);
    }
}
