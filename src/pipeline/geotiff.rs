//! Baseline TIFF and BigTIFF reader for multi-band rasters
//!
//! Walks the image directory chain and decodes each full-resolution image
//! into one `Vec<f64>` per sample. Strips and tiles, chunky and planar
//! layouts, and any number of samples per pixel are handled. Data may be
//! uncompressed, LZW or DEFLATE, with horizontal or floating-point
//! prediction.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::loader::RasterError;

/// TIFF tag codes read by this module
pub mod tags {
    pub const NEW_SUBFILE_TYPE: u16 = 254;
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
}

/// TIFF compression codes
pub mod compression {
    pub const NONE: u16 = 1;
    pub const LZW: u16 = 5;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

/// TIFF sample format codes
pub mod sample_format {
    pub const UNSIGNED_INT: u16 = 1;
    pub const SIGNED_INT: u16 = 2;
    pub const FLOAT: u16 = 3;
}

mod predictor {
    pub const NONE: u16 = 1;
    pub const HORIZONTAL: u16 = 2;
    pub const FLOATING_POINT: u16 = 3;
}

/// Largest tag payload read from a directory entry
const MAX_TAG_BYTES: u64 = 256 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        }
    }

    fn u64(self, b: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big => BigEndian::read_u64(b),
        }
    }

    /// Unsigned integer of 1, 2, 4 or 8 bytes
    fn uint(self, b: &[u8]) -> u64 {
        match b.len() {
            1 => u64::from(b[0]),
            2 => u64::from(self.u16(b)),
            4 => u64::from(self.u32(b)),
            _ => self.u64(b),
        }
    }

    fn write_uint(self, b: &mut [u8], value: u64) {
        match (self, b.len()) {
            (_, 1) => b[0] = value as u8,
            (Endian::Little, 2) => LittleEndian::write_u16(b, value as u16),
            (Endian::Big, 2) => BigEndian::write_u16(b, value as u16),
            (Endian::Little, 4) => LittleEndian::write_u32(b, value as u32),
            (Endian::Big, 4) => BigEndian::write_u32(b, value as u32),
            (Endian::Little, _) => LittleEndian::write_u64(b, value),
            (Endian::Big, _) => BigEndian::write_u64(b, value),
        }
    }
}

/// Raw directory entry; `value` holds the inline payload or its offset
#[derive(Debug, Clone)]
struct TagEntry {
    type_id: u16,
    count: u64,
    value: [u8; 8],
}

/// Byte size of the integer field types used by image structure tags
fn integer_type_size(type_id: u16) -> Option<usize> {
    match type_id {
        1 => Some(1),       // BYTE
        3 => Some(2),       // SHORT
        4 | 13 => Some(4),  // LONG, IFD
        16 | 18 => Some(8), // LONG8, IFD8
        _ => None,
    }
}

/// How the image data is cut into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLayout {
    Strips { rows_per_strip: usize },
    Tiles { width: usize, height: usize },
}

/// Structure of one image directory
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDirectory {
    pub width: usize,
    pub height: usize,
    pub samples_per_pixel: usize,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub compression: u16,
    pub predictor: u16,
    /// PlanarConfiguration 2: each sample stored in its own set of chunks
    pub planar: bool,
    /// Overview or mask image rather than full-resolution data
    pub reduced_resolution: bool,
    pub layout: ChunkLayout,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
}

impl ImageDirectory {
    fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Chunks per plane as (across, down)
    fn chunk_grid(&self) -> (usize, usize) {
        match self.layout {
            ChunkLayout::Strips { rows_per_strip } => (1, self.height.div_ceil(rows_per_strip)),
            ChunkLayout::Tiles { width, height } => {
                (self.width.div_ceil(width), self.height.div_ceil(height))
            }
        }
    }

    fn check_sample_type(&self) -> Result<(), RasterError> {
        let supported = match self.sample_format {
            sample_format::UNSIGNED_INT | sample_format::SIGNED_INT => {
                matches!(self.bits_per_sample, 8 | 16 | 32 | 64)
            }
            sample_format::FLOAT => matches!(self.bits_per_sample, 32 | 64),
            _ => false,
        };
        if supported {
            Ok(())
        } else {
            Err(RasterError::UnsupportedSampleFormat {
                bits: self.bits_per_sample,
                format: self.sample_format,
            })
        }
    }
}

/// Sequential reader over the image directories of a TIFF stream
pub struct TiffReader<R> {
    reader: R,
    endian: Endian,
    big: bool,
    next_ifd: u64,
    visited: HashSet<u64>,
}

impl<R: Read + Seek> TiffReader<R> {
    /// Parse the file header
    pub fn new(mut reader: R) -> Result<Self, RasterError> {
        let mut header = [0u8; 16];
        reader.seek(SeekFrom::Start(0))?;
        let len = read_prefix(&mut reader, &mut header)?;
        if len < 8 {
            return Err(invalid("file too short for a TIFF header"));
        }

        let endian = match &header[0..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(invalid("missing II/MM byte order mark")),
        };

        let (big, first_ifd) = match endian.u16(&header[2..4]) {
            42 => (false, u64::from(endian.u32(&header[4..8]))),
            43 => {
                if len < 16 || endian.u16(&header[4..6]) != 8 {
                    return Err(invalid("malformed BigTIFF header"));
                }
                (true, endian.u64(&header[8..16]))
            }
            magic => return Err(invalid(format!("bad magic number {}", magic))),
        };

        Ok(Self {
            reader,
            endian,
            big,
            next_ifd: first_ifd,
            visited: HashSet::new(),
        })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_bigtiff(&self) -> bool {
        self.big
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, RasterError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Parse the next image directory, or `None` at the end of the chain
    pub fn next_directory(&mut self) -> Result<Option<ImageDirectory>, RasterError> {
        if self.next_ifd == 0 {
            return Ok(None);
        }
        let offset = self.next_ifd;
        if !self.visited.insert(offset) {
            return Err(invalid("image directory chain loops"));
        }

        let (count_size, entry_size, pointer_size) = if self.big { (8, 20, 8) } else { (2, 12, 4) };
        let raw_count = self.read_at(offset, count_size)?;
        let count = if self.big {
            self.endian.u64(&raw_count)
        } else {
            u64::from(self.endian.u16(&raw_count))
        };
        if count > u64::from(u16::MAX) {
            return Err(invalid(format!("directory at {} claims {} entries", offset, count)));
        }
        let count = count as usize;

        let body = self.read_at(offset + count_size as u64, count * entry_size + pointer_size)?;
        let mut entries = HashMap::with_capacity(count);
        for raw in body[..count * entry_size].chunks_exact(entry_size) {
            let tag = self.endian.u16(&raw[0..2]);
            let type_id = self.endian.u16(&raw[2..4]);
            let mut value = [0u8; 8];
            let count = if self.big {
                value.copy_from_slice(&raw[12..20]);
                self.endian.u64(&raw[4..12])
            } else {
                value[..4].copy_from_slice(&raw[8..12]);
                u64::from(self.endian.u32(&raw[4..8]))
            };
            entries.insert(tag, TagEntry { type_id, count, value });
        }

        let pointer = &body[count * entry_size..];
        self.next_ifd = if self.big {
            self.endian.u64(pointer)
        } else {
            u64::from(self.endian.u32(pointer))
        };

        self.resolve(&entries).map(Some)
    }

    /// Integer values of a tag, or `None` when the tag is absent
    fn tag_values(
        &mut self,
        entries: &HashMap<u16, TagEntry>,
        tag: u16,
    ) -> Result<Option<Vec<u64>>, RasterError> {
        let Some(entry) = entries.get(&tag) else {
            return Ok(None);
        };
        let size = integer_type_size(entry.type_id).ok_or_else(|| {
            invalid(format!("tag {} has non-integer field type {}", tag, entry.type_id))
        })?;

        let total = entry.count.saturating_mul(size as u64);
        if total > MAX_TAG_BYTES {
            return Err(invalid(format!("tag {} holds {} bytes", tag, total)));
        }
        let total = total as usize;

        let inline_capacity = if self.big { 8 } else { 4 };
        let bytes = if total <= inline_capacity {
            entry.value[..total].to_vec()
        } else {
            let offset = if self.big {
                self.endian.u64(&entry.value)
            } else {
                u64::from(self.endian.u32(&entry.value[..4]))
            };
            self.read_at(offset, total)?
        };

        Ok(Some(bytes.chunks_exact(size).map(|c| self.endian.uint(c)).collect()))
    }

    fn scalar(
        &mut self,
        entries: &HashMap<u16, TagEntry>,
        tag: u16,
    ) -> Result<Option<u64>, RasterError> {
        Ok(self
            .tag_values(entries, tag)?
            .and_then(|values| values.first().copied()))
    }

    /// Per-sample tag whose values must agree across samples
    fn uniform(
        &mut self,
        entries: &HashMap<u16, TagEntry>,
        tag: u16,
        default: u16,
    ) -> Result<u16, RasterError> {
        match self.tag_values(entries, tag)? {
            None => Ok(default),
            Some(values) => {
                let first = values.first().copied().unwrap_or(u64::from(default));
                if values.iter().any(|&v| v != first) {
                    return Err(invalid(format!("tag {} differs between samples", tag)));
                }
                u16::try_from(first).map_err(|_| invalid(format!("tag {} out of range", tag)))
            }
        }
    }

    fn resolve(&mut self, entries: &HashMap<u16, TagEntry>) -> Result<ImageDirectory, RasterError> {
        let width = self
            .scalar(entries, tags::IMAGE_WIDTH)?
            .ok_or_else(|| invalid("missing ImageWidth"))? as usize;
        let height = self
            .scalar(entries, tags::IMAGE_LENGTH)?
            .ok_or_else(|| invalid("missing ImageLength"))? as usize;
        let samples_per_pixel = self.scalar(entries, tags::SAMPLES_PER_PIXEL)?.unwrap_or(1) as usize;
        if width == 0 || height == 0 || samples_per_pixel == 0 {
            return Err(invalid(format!(
                "empty image: {}x{} with {} samples per pixel",
                width, height, samples_per_pixel
            )));
        }

        let bits_per_sample = self.uniform(entries, tags::BITS_PER_SAMPLE, 1)?;
        let sample_format = self.uniform(entries, tags::SAMPLE_FORMAT, sample_format::UNSIGNED_INT)?;
        let compression = self.uniform(entries, tags::COMPRESSION, compression::NONE)?;
        let predictor = self.uniform(entries, tags::PREDICTOR, predictor::NONE)?;
        let planar = self.scalar(entries, tags::PLANAR_CONFIG)?.unwrap_or(1) == 2;
        let subfile = self.scalar(entries, tags::NEW_SUBFILE_TYPE)?.unwrap_or(0);

        let tile_size = (
            self.scalar(entries, tags::TILE_WIDTH)?,
            self.scalar(entries, tags::TILE_LENGTH)?,
        );
        let (layout, offsets_tag, counts_tag) = match tile_size {
            (Some(tile_width), Some(tile_height)) if tile_width > 0 && tile_height > 0 => (
                ChunkLayout::Tiles {
                    width: tile_width as usize,
                    height: tile_height as usize,
                },
                tags::TILE_OFFSETS,
                tags::TILE_BYTE_COUNTS,
            ),
            (None, None) => {
                let rows = self
                    .scalar(entries, tags::ROWS_PER_STRIP)?
                    .map_or(height, |rows| (rows as usize).clamp(1, height));
                (
                    ChunkLayout::Strips { rows_per_strip: rows },
                    tags::STRIP_OFFSETS,
                    tags::STRIP_BYTE_COUNTS,
                )
            }
            _ => return Err(invalid("incomplete tile size")),
        };

        let offsets = self
            .tag_values(entries, offsets_tag)?
            .ok_or_else(|| invalid(format!("missing chunk offsets (tag {})", offsets_tag)))?;
        let byte_counts = self
            .tag_values(entries, counts_tag)?
            .ok_or_else(|| invalid(format!("missing chunk byte counts (tag {})", counts_tag)))?;

        let directory = ImageDirectory {
            width,
            height,
            samples_per_pixel,
            bits_per_sample,
            sample_format,
            compression,
            predictor,
            planar,
            reduced_resolution: subfile & 0b101 != 0,
            layout,
            offsets,
            byte_counts,
        };

        let (across, down) = directory.chunk_grid();
        let planes = if planar { samples_per_pixel } else { 1 };
        let expected = planes * across * down;
        if directory.offsets.len() != expected || directory.byte_counts.len() != expected {
            return Err(invalid(format!(
                "expected {} chunks, found {} offsets and {} byte counts",
                expected,
                directory.offsets.len(),
                directory.byte_counts.len()
            )));
        }

        Ok(directory)
    }

    /// Decode every sample of `dir`, one `Vec` per sample in file order
    pub fn read_bands(&mut self, dir: &ImageDirectory) -> Result<Vec<Vec<f64>>, RasterError> {
        dir.check_sample_type()?;

        let pixels = dir
            .width
            .checked_mul(dir.height)
            .filter(|p| p.checked_mul(dir.samples_per_pixel).is_some())
            .ok_or_else(|| invalid("image dimensions overflow"))?;
        let mut bands = vec![vec![0.0; pixels]; dir.samples_per_pixel];

        let bytes = dir.bytes_per_sample();
        let (chunk_width, chunk_height) = match dir.layout {
            ChunkLayout::Strips { rows_per_strip } => (dir.width, rows_per_strip),
            ChunkLayout::Tiles { width, height } => (width, height),
        };
        let (across, down) = dir.chunk_grid();
        let (planes, interleaved) = if dir.planar {
            (dir.samples_per_pixel, 1)
        } else {
            (1, dir.samples_per_pixel)
        };
        let row_samples = chunk_width * interleaved;

        for plane in 0..planes {
            for chunk_y in 0..down {
                for chunk_x in 0..across {
                    let index = (plane * down + chunk_y) * across + chunk_x;
                    let top = chunk_y * chunk_height;
                    let rows = match dir.layout {
                        ChunkLayout::Strips { .. } => chunk_height.min(dir.height - top),
                        ChunkLayout::Tiles { .. } => chunk_height,
                    };
                    let expected = rows * row_samples * bytes;

                    let raw = self.read_at(dir.offsets[index], dir.byte_counts[index] as usize)?;
                    let mut data = decompress_chunk(&raw, dir.compression, expected)?;
                    if data.len() < expected {
                        return Err(invalid(format!(
                            "chunk {} decodes to {} bytes, expected {}",
                            index,
                            data.len(),
                            expected
                        )));
                    }
                    data.truncate(expected);

                    let endian = match dir.predictor {
                        predictor::NONE => self.endian,
                        predictor::HORIZONTAL => {
                            undo_horizontal(&mut data, self.endian, bytes, row_samples, interleaved);
                            self.endian
                        }
                        predictor::FLOATING_POINT => {
                            data = undo_floating_point(&data, bytes, row_samples, interleaved);
                            Endian::Little
                        }
                        other => return Err(RasterError::UnsupportedPredictor(other)),
                    };

                    let left = chunk_x * chunk_width;
                    for r in 0..rows.min(dir.height - top) {
                        let y = top + r;
                        for c in 0..chunk_width.min(dir.width - left) {
                            let x = left + c;
                            for s in 0..interleaved {
                                let band = if dir.planar { plane } else { s };
                                let pos = ((r * chunk_width + c) * interleaved + s) * bytes;
                                bands[band][y * dir.width + x] = sample_value(
                                    &data[pos..pos + bytes],
                                    endian,
                                    dir.sample_format,
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(bands)
    }
}

fn invalid(reason: impl Into<String>) -> RasterError {
    RasterError::InvalidTiff(reason.into())
}

/// Fill `buf` as far as the stream allows
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Decompress one strip or tile
pub fn decompress_chunk(
    data: &[u8],
    compression_code: u16,
    expected_size: usize,
) -> Result<Vec<u8>, RasterError> {
    match compression_code {
        compression::NONE => Ok(data.to_vec()),
        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            // zlib framing is standard but some writers emit raw deflate
            let mut out = Vec::with_capacity(expected_size);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_err() {
                out.clear();
                flate2::read::DeflateDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| RasterError::Decompress(format!("DEFLATE: {}", e)))?;
            }
            Ok(out)
        }
        compression::LZW => {
            let mut decoder =
                weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            decoder
                .decode(data)
                .map_err(|e| RasterError::Decompress(format!("LZW: {}", e)))
        }
        other => Err(RasterError::UnsupportedCompression(other)),
    }
}

/// Reverse horizontal differencing, row by row, with `stride` samples per pixel
fn undo_horizontal(data: &mut [u8], endian: Endian, bytes: usize, row_samples: usize, stride: usize) {
    let mask = if bytes == 8 { u64::MAX } else { (1u64 << (bytes * 8)) - 1 };
    for row in data.chunks_exact_mut(row_samples * bytes) {
        for i in stride..row_samples {
            let prev = endian.uint(&row[(i - stride) * bytes..(i - stride + 1) * bytes]);
            let cell = &mut row[i * bytes..(i + 1) * bytes];
            let value = endian.uint(cell).wrapping_add(prev) & mask;
            endian.write_uint(cell, value);
        }
    }
}

/// Reverse the floating-point predictor; the result is little-endian
fn undo_floating_point(data: &[u8], bytes: usize, row_samples: usize, stride: usize) -> Vec<u8> {
    let row_len = row_samples * bytes;
    let mut out = vec![0u8; data.len()];
    for (row, out_row) in data.chunks_exact(row_len).zip(out.chunks_exact_mut(row_len)) {
        let mut acc = row.to_vec();
        for i in stride..row_len {
            acc[i] = acc[i].wrapping_add(acc[i - stride]);
        }
        // byte planes run from most to least significant
        for j in 0..row_samples {
            for k in 0..bytes {
                out_row[j * bytes + k] = acc[(bytes - 1 - k) * row_samples + j];
            }
        }
    }
    out
}

fn sample_value(bytes: &[u8], endian: Endian, format: u16) -> f64 {
    let raw = endian.uint(bytes);
    match (format, bytes.len()) {
        (sample_format::FLOAT, 4) => f64::from(f32::from_bits(raw as u32)),
        (sample_format::FLOAT, _) => f64::from_bits(raw),
        (sample_format::SIGNED_INT, n) => {
            let shift = 64 - 8 * n as u32;
            ((raw << shift) as i64 >> shift) as f64
        }
        _ => raw as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    /// Little-endian classic TIFF: 2x2 pixels, 3 u16 samples, one uncompressed strip
    fn tiny_chunky() -> Vec<u8> {
        let mut buf = b"II*\0".to_vec();
        buf.extend_from_slice(&0u32.to_le_bytes());
        let data_offset = buf.len() as u32;
        for v in 0u16..12 {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let bps_offset = buf.len() as u32;
        for _ in 0..3 {
            buf.extend_from_slice(&16u16.to_le_bytes());
        }
        buf.extend_from_slice(&[0, 0]);
        let ifd = buf.len() as u32;
        buf[4..8].copy_from_slice(&ifd.to_le_bytes());

        let entries: [(u16, u16, u32, u32); 8] = [
            (256, 3, 1, 2),
            (257, 3, 1, 2),
            (258, 3, 3, bps_offset),
            (259, 3, 1, 1),
            (273, 4, 1, data_offset),
            (277, 3, 1, 3),
            (278, 3, 1, 2),
            (279, 4, 1, 24),
        ];
        buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (tag, type_id, count, value) in entries {
            buf.extend_from_slice(&tag.to_le_bytes());
            buf.extend_from_slice(&type_id.to_le_bytes());
            buf.extend_from_slice(&count.to_le_bytes());
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf
    }

    #[test]
    fn test_parse_header_le() {
        let reader = TiffReader::new(Cursor::new(tiny_chunky())).unwrap();
        assert_eq!(reader.endian(), Endian::Little);
        assert!(!reader.is_bigtiff());
    }

    #[test]
    fn test_parse_header_bigtiff_be() {
        let mut header = b"MM\0\x2b\0\x08\0\0".to_vec();
        header.extend_from_slice(&0u64.to_be_bytes());
        let mut reader = TiffReader::new(Cursor::new(header)).unwrap();
        assert_eq!(reader.endian(), Endian::Big);
        assert!(reader.is_bigtiff());
        assert!(reader.next_directory().unwrap().is_none());
    }

    #[test]
    fn test_parse_header_rejects_bad_magic() {
        let result = TiffReader::new(Cursor::new(b"II\x2a\x01\0\0\0\0".to_vec()));
        assert!(matches!(result, Err(RasterError::InvalidTiff(_))));
    }

    #[test]
    fn test_read_chunky_directory() {
        let mut reader = TiffReader::new(Cursor::new(tiny_chunky())).unwrap();
        let dir = reader.next_directory().unwrap().unwrap();

        assert_eq!((dir.width, dir.height, dir.samples_per_pixel), (2, 2, 3));
        assert_eq!(dir.bits_per_sample, 16);
        assert!(!dir.planar);
        assert_eq!(dir.layout, ChunkLayout::Strips { rows_per_strip: 2 });

        let bands = reader.read_bands(&dir).unwrap();
        assert_eq!(bands[0], vec![0.0, 3.0, 6.0, 9.0]);
        assert_eq!(bands[2], vec![2.0, 5.0, 8.0, 11.0]);
        assert!(reader.next_directory().unwrap().is_none());
    }

    #[test]
    fn test_directory_loop_is_rejected() {
        let mut bytes = tiny_chunky();
        let ifd = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let next = bytes.len() - 4;
        bytes[next..].copy_from_slice(&ifd.to_le_bytes());

        let mut reader = TiffReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.next_directory().unwrap().is_some());
        assert!(matches!(reader.next_directory(), Err(RasterError::InvalidTiff(_))));
    }

    #[test]
    fn test_undo_horizontal_wraps() {
        // two pixels of two u8 samples: deltas 250, 10 and 10, 1
        let mut data = vec![250u8, 10, 10, 1];
        undo_horizontal(&mut data, Endian::Little, 1, 4, 2);
        assert_eq!(data, vec![250, 10, 4, 11]);
    }

    #[test]
    fn test_undo_floating_point() {
        let values = [1.5f32, -2.25, 1024.0];
        // byte-plane shuffle, most significant plane first, then differencing
        let mut planes = Vec::new();
        for k in (0..4).rev() {
            for v in values {
                planes.push(v.to_le_bytes()[k]);
            }
        }
        let mut encoded = planes.clone();
        for i in (1..encoded.len()).rev() {
            encoded[i] = encoded[i].wrapping_sub(encoded[i - 1]);
        }

        let decoded = undo_floating_point(&encoded, 4, 3, 1);
        let got: Vec<f32> = decoded
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(got, values);
    }

    #[test]
    fn test_sample_value_types() {
        assert_eq!(sample_value(&[0xff, 0xff], Endian::Little, sample_format::SIGNED_INT), -1.0);
        assert_eq!(sample_value(&[0xff, 0xff], Endian::Little, sample_format::UNSIGNED_INT), 65535.0);
        assert_eq!(sample_value(&[0x00, 0x01], Endian::Big, sample_format::UNSIGNED_INT), 1.0);
        let bits = 0.5f32.to_be_bytes();
        assert_eq!(sample_value(&bits, Endian::Big, sample_format::FLOAT), 0.5);
    }

    #[test]
    fn test_decompress_deflate_and_lzw() {
        let raw: Vec<u8> = (0..200u8).map(|v| v % 7).collect();

        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        zlib.write_all(&raw).unwrap();
        let deflated = zlib.finish().unwrap();
        assert_eq!(decompress_chunk(&deflated, compression::DEFLATE, raw.len()).unwrap(), raw);

        let lzw = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(&raw)
            .unwrap();
        assert_eq!(decompress_chunk(&lzw, compression::LZW, raw.len()).unwrap(), raw);
    }

    #[test]
    fn test_unsupported_compression() {
        let result = decompress_chunk(&[0u8; 4], 7, 4);
        assert!(matches!(result, Err(RasterError::UnsupportedCompression(7))));
    }
}
