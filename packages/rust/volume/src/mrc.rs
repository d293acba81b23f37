//! MRC/CCP4 density map codec.
//!
//! The header is 256 little- or big-endian 32-bit words. Only the fields
//! needed to place samples in space are interpreted:
//!
//! | words   | meaning                              |
//! |---------|--------------------------------------|
//! | 0..3    | columns, rows, sections              |
//! | 3       | data mode                            |
//! | 4..7    | start index of columns/rows/sections |
//! | 7..10   | sampling intervals along X, Y, Z     |
//! | 10..13  | cell lengths along X, Y, Z           |
//! | 16..19  | axis assigned to columns/rows/sections |
//! | 19..22  | min, max, mean density               |
//! | 23      | extended header length in bytes      |
//! | 49..52  | MRC2014 origin                       |
//! | 52      | `"MAP "`                             |
//! | 53      | machine stamp                        |

use std::path::Path;

use meshmaker_shared::{MeshmakerError, Result};
use tracing::debug;

use crate::Volume;

const HEADER_LEN: usize = 1024;
const WORD_DIMS: usize = 0;
const WORD_MODE: usize = 3;
const WORD_START: usize = 4;
const WORD_SAMPLING: usize = 7;
const WORD_CELL: usize = 10;
const WORD_CELL_ANGLES: usize = 13;
const WORD_AXES: usize = 16;
const WORD_STATS: usize = 19;
const WORD_SPACEGROUP: usize = 22;
const WORD_NSYMBT: usize = 23;
const WORD_ORIGIN: usize = 49;
const WORD_MAP: usize = 52;
const WORD_STAMP: usize = 53;
const WORD_RMS: usize = 54;

/// Largest per-axis dimension accepted when guessing the byte order.
const PLAUSIBLE_DIM: i32 = 1 << 16;

// ---------------------------------------------------------------------------
// Header primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Trust the machine stamp; otherwise pick the order that yields a sane header.
    fn detect(header: &[u8]) -> Result<Self> {
        match header[WORD_STAMP * 4] {
            0x44 => return Ok(Self::Little),
            0x11 => return Ok(Self::Big),
            _ => {}
        }

        [Self::Little, Self::Big]
            .into_iter()
            .find(|order| order.plausible(header))
            .ok_or_else(|| MeshmakerError::decode("cannot determine byte order of map header"))
    }

    fn plausible(self, header: &[u8]) -> bool {
        let dims_ok =
            (0..3).all(|i| (1..=PLAUSIBLE_DIM).contains(&self.i32(header, WORD_DIMS + i)));
        dims_ok && Mode::from_code(self.i32(header, WORD_MODE)).is_some()
    }

    fn i32(self, bytes: &[u8], word: usize) -> i32 {
        let raw = word_bytes(bytes, word);
        match self {
            Self::Little => i32::from_le_bytes(raw),
            Self::Big => i32::from_be_bytes(raw),
        }
    }

    fn f32(self, bytes: &[u8], word: usize) -> f32 {
        let raw = word_bytes(bytes, word);
        match self {
            Self::Little => f32::from_le_bytes(raw),
            Self::Big => f32::from_be_bytes(raw),
        }
    }
}

fn word_bytes(bytes: &[u8], word: usize) -> [u8; 4] {
    let at = word * 4;
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

/// Sample encoding named by the header's mode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Int8,
    Int16,
    Float32,
    UInt16,
}

impl Mode {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Int8),
            1 => Some(Self::Int16),
            2 => Some(Self::Float32),
            6 => Some(Self::UInt16),
            _ => None,
        }
    }

    const fn width(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Float32 => 4,
        }
    }

    fn sample(self, order: ByteOrder, raw: &[u8]) -> f32 {
        match (self, order) {
            (Self::Int8, _) => f32::from(raw[0] as i8),
            (Self::Int16, ByteOrder::Little) => f32::from(i16::from_le_bytes([raw[0], raw[1]])),
            (Self::Int16, ByteOrder::Big) => f32::from(i16::from_be_bytes([raw[0], raw[1]])),
            (Self::UInt16, ByteOrder::Little) => f32::from(u16::from_le_bytes([raw[0], raw[1]])),
            (Self::UInt16, ByteOrder::Big) => f32::from(u16::from_be_bytes([raw[0], raw[1]])),
            (Self::Float32, ByteOrder::Little) => {
                f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
            }
            (Self::Float32, ByteOrder::Big) => {
                f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Read and decode the map at `path`.
pub fn read_mrc(path: &Path) -> Result<Volume> {
    let bytes = std::fs::read(path).map_err(|e| MeshmakerError::io(path, e))?;
    decode_mrc(&bytes)
}

/// Decode an in-memory MRC/CCP4 map into an x-fastest [`Volume`].
pub fn decode_mrc(bytes: &[u8]) -> Result<Volume> {
    if bytes.len() < HEADER_LEN {
        return Err(MeshmakerError::decode(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    let header = &bytes[..HEADER_LEN];
    let order = ByteOrder::detect(header)?;

    let mode_code = order.i32(header, WORD_MODE);
    let mode = Mode::from_code(mode_code)
        .ok_or_else(|| MeshmakerError::decode(format!("unsupported data mode {mode_code}")))?;

    // Extents in file order: columns, rows, sections.
    let mut extents = [0usize; 3];
    for (i, extent) in extents.iter_mut().enumerate() {
        let n = order.i32(header, WORD_DIMS + i);
        *extent = usize::try_from(n)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| MeshmakerError::decode(format!("non-positive grid dimension {n}")))?;
    }

    let axes = axis_map(order, header)?;

    let mut dims = [0usize; 3];
    for (file_axis, &axis) in axes.iter().enumerate() {
        dims[axis] = extents[file_axis];
    }

    let mut spacing = [1.0f64; 3];
    for (axis, step) in spacing.iter_mut().enumerate() {
        let sampling = order.i32(header, WORD_SAMPLING + axis);
        let cell = f64::from(order.f32(header, WORD_CELL + axis));
        if sampling > 0 && cell.is_finite() && cell > 0.0 {
            *step = cell / f64::from(sampling);
        }
    }

    let origin = origin(order, header, &axes, &spacing);

    let nsymbt = order.i32(header, WORD_NSYMBT);
    let extended = usize::try_from(nsymbt)
        .map_err(|_| MeshmakerError::decode(format!("negative extended header length {nsymbt}")))?;
    let oversized = || MeshmakerError::decode(format!("grid {extents:?} is too large to address"));
    let data_start = HEADER_LEN.checked_add(extended).ok_or_else(oversized)?;
    let count = extents
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(oversized)?;
    let data_len = count.checked_mul(mode.width()).ok_or_else(oversized)?;
    let data_end = data_start.checked_add(data_len).ok_or_else(oversized)?;
    let data = bytes
        .get(data_start..data_end)
        .ok_or_else(|| {
            MeshmakerError::decode(format!(
                "truncated data: expected {data_len} bytes after offset {data_start}, file has {}",
                bytes.len()
            ))
        })?;

    debug!(?order, ?mode, ?dims, ?spacing, ?origin, extended, "decoded map header");

    let mut values = vec![0.0f32; count];
    for (i, raw) in data.chunks_exact(mode.width()).enumerate() {
        let col = i % extents[0];
        let row = (i / extents[0]) % extents[1];
        let sec = i / (extents[0] * extents[1]);

        let mut index = [0usize; 3];
        index[axes[0]] = col;
        index[axes[1]] = row;
        index[axes[2]] = sec;

        values[index[0] + dims[0] * (index[1] + dims[1] * index[2])] = mode.sample(order, raw);
    }

    Volume::new(dims, spacing, origin, values)
}

/// Zero-based spatial axis for columns, rows and sections.
fn axis_map(order: ByteOrder, header: &[u8]) -> Result<[usize; 3]> {
    let raw = [
        order.i32(header, WORD_AXES),
        order.i32(header, WORD_AXES + 1),
        order.i32(header, WORD_AXES + 2),
    ];

    // Some writers leave the axis words zeroed.
    if raw == [0, 0, 0] {
        return Ok([0, 1, 2]);
    }

    let mut axes = [0usize; 3];
    let mut seen = [false; 3];
    for (slot, &value) in axes.iter_mut().zip(raw.iter()) {
        let axis = usize::try_from(value)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .filter(|&v| v < 3 && !seen[v])
            .ok_or_else(|| MeshmakerError::decode(format!("invalid axis order {raw:?}")))?;
        seen[axis] = true;
        *slot = axis;
    }
    Ok(axes)
}

/// MRC2014 origin when set, otherwise the start indices scaled by spacing.
fn origin(order: ByteOrder, header: &[u8], axes: &[usize; 3], spacing: &[f64; 3]) -> [f64; 3] {
    let explicit = [
        f64::from(order.f32(header, WORD_ORIGIN)),
        f64::from(order.f32(header, WORD_ORIGIN + 1)),
        f64::from(order.f32(header, WORD_ORIGIN + 2)),
    ];
    if explicit.iter().all(|v| v.is_finite()) && explicit.iter().any(|&v| v != 0.0) {
        return explicit;
    }

    let mut origin = [0.0f64; 3];
    for (file_axis, &axis) in axes.iter().enumerate() {
        let start = f64::from(order.i32(header, WORD_START + file_axis));
        origin[axis] = start * spacing[axis];
    }
    origin
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `volume` as a little-endian float32 (mode 2) map.
pub fn encode_mrc(volume: &Volume) -> Vec<u8> {
    let dims = volume.dims();
    let spacing = volume.spacing();
    let origin = volume.origin();
    let (min, max) = volume.range().unwrap_or((0.0, 0.0));
    let mean = volume.mean() as f32;

    let mut header = [0u8; HEADER_LEN];
    let mut put = |word: usize, raw: [u8; 4]| header[word * 4..word * 4 + 4].copy_from_slice(&raw);

    for axis in 0..3 {
        let n = i32::try_from(dims[axis]).unwrap_or(i32::MAX);
        put(WORD_DIMS + axis, n.to_le_bytes());
        put(WORD_SAMPLING + axis, n.to_le_bytes());
        put(WORD_CELL + axis, ((dims[axis] as f64 * spacing[axis]) as f32).to_le_bytes());
        put(WORD_CELL_ANGLES + axis, 90.0f32.to_le_bytes());
        put(WORD_AXES + axis, (axis as i32 + 1).to_le_bytes());
        put(WORD_ORIGIN + axis, (origin[axis] as f32).to_le_bytes());
    }
    put(WORD_MODE, 2i32.to_le_bytes());
    put(WORD_STATS, min.to_le_bytes());
    put(WORD_STATS + 1, max.to_le_bytes());
    put(WORD_STATS + 2, mean.to_le_bytes());
    put(WORD_SPACEGROUP, 1i32.to_le_bytes());
    put(WORD_MAP, *b"MAP ");
    put(WORD_STAMP, [0x44, 0x44, 0x00, 0x00]);
    put(WORD_RMS, 0.0f32.to_le_bytes());

    let mut bytes = Vec::with_capacity(HEADER_LEN + volume.len() * 4);
    bytes.extend_from_slice(&header);
    for value in volume.values() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Write `volume` to `path` as a float32 map.
pub fn write_mrc(path: &Path, volume: &Volume) -> Result<()> {
    std::fs::write(path, encode_mrc(volume)).map_err(|e| MeshmakerError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Hand-built header for decoder tests.
    struct RawMap {
        order: ByteOrder,
        extents: [i32; 3],
        mode: i32,
        start: [i32; 3],
        sampling: [i32; 3],
        cell: [f32; 3],
        axes: [i32; 3],
        origin: [f32; 3],
        stamp: u8,
        extended: Vec<u8>,
    }

    impl RawMap {
        fn new(order: ByteOrder, extents: [i32; 3], mode: i32) -> Self {
            Self {
                order,
                extents,
                mode,
                start: [0; 3],
                sampling: extents,
                cell: [extents[0] as f32, extents[1] as f32, extents[2] as f32],
                axes: [1, 2, 3],
                origin: [0.0; 3],
                stamp: match order {
                    ByteOrder::Little => 0x44,
                    ByteOrder::Big => 0x11,
                },
                extended: Vec::new(),
            }
        }

        fn header(&self) -> Vec<u8> {
            let mut header = vec![0u8; HEADER_LEN];
            let order = self.order;
            let mut int = |word: usize, v: i32| {
                let raw = match order {
                    ByteOrder::Little => v.to_le_bytes(),
                    ByteOrder::Big => v.to_be_bytes(),
                };
                header[word * 4..word * 4 + 4].copy_from_slice(&raw);
            };
            for i in 0..3 {
                int(WORD_DIMS + i, self.extents[i]);
                int(WORD_START + i, self.start[i]);
                int(WORD_SAMPLING + i, self.sampling[i]);
                int(WORD_AXES + i, self.axes[i]);
            }
            int(WORD_MODE, self.mode);
            int(WORD_NSYMBT, self.extended.len() as i32);

            for i in 0..3 {
                let cell = match order {
                    ByteOrder::Little => self.cell[i].to_le_bytes(),
                    ByteOrder::Big => self.cell[i].to_be_bytes(),
                };
                header[(WORD_CELL + i) * 4..(WORD_CELL + i) * 4 + 4].copy_from_slice(&cell);
                let origin = match order {
                    ByteOrder::Little => self.origin[i].to_le_bytes(),
                    ByteOrder::Big => self.origin[i].to_be_bytes(),
                };
                header[(WORD_ORIGIN + i) * 4..(WORD_ORIGIN + i) * 4 + 4].copy_from_slice(&origin);
            }
            header[WORD_MAP * 4..WORD_MAP * 4 + 4].copy_from_slice(b"MAP ");
            header[WORD_STAMP * 4] = self.stamp;
            header.extend_from_slice(&self.extended);
            header
        }
    }

    fn int16_samples(order: ByteOrder, values: &[i16]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| match order {
                ByteOrder::Little => v.to_le_bytes(),
                ByteOrder::Big => v.to_be_bytes(),
            })
            .collect()
    }

    #[test]
    fn float_map_roundtrips_through_disk() {
        let volume = Volume::from_fn([4, 3, 2], [0.5, 1.0, 1.5], [1.0, 2.0, 3.0], |x, y, z| {
            x as f32 - y as f32 * 0.25 + z as f32
        })
        .unwrap();

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("grid.map");
        write_mrc(&path, &volume).expect("write");

        let decoded = read_mrc(&path).expect("read");
        assert_eq!(decoded.dims(), [4, 3, 2]);
        assert_eq!(decoded.values(), volume.values());
        for axis in 0..3 {
            assert_relative_eq!(decoded.spacing()[axis], volume.spacing()[axis], epsilon = 1e-6);
            assert_relative_eq!(decoded.origin()[axis], volume.origin()[axis], epsilon = 1e-6);
        }
    }

    #[test]
    fn big_endian_int16_map() {
        let raw = RawMap::new(ByteOrder::Big, [2, 2, 1], 1);
        let mut bytes = raw.header();
        bytes.extend(int16_samples(ByteOrder::Big, &[-3, 7, 300, -1000]));

        let volume = decode_mrc(&bytes).expect("decode");
        assert_eq!(volume.values(), &[-3.0, 7.0, 300.0, -1000.0]);
    }

    #[test]
    fn byte_order_is_inferred_without_stamp() {
        let mut raw = RawMap::new(ByteOrder::Big, [2, 1, 1], 1);
        raw.stamp = 0;
        let mut bytes = raw.header();
        bytes.extend(int16_samples(ByteOrder::Big, &[1, 2]));

        let volume = decode_mrc(&bytes).expect("decode");
        assert_eq!(volume.dims(), [2, 1, 1]);
        assert_eq!(volume.values(), &[1.0, 2.0]);
    }

    #[test]
    fn int8_and_uint16_modes() {
        let raw = RawMap::new(ByteOrder::Little, [2, 1, 1], 0);
        let mut bytes = raw.header();
        bytes.extend_from_slice(&[0xFF, 0x05]);
        assert_eq!(decode_mrc(&bytes).unwrap().values(), &[-1.0, 5.0]);

        let raw = RawMap::new(ByteOrder::Little, [2, 1, 1], 6);
        let mut bytes = raw.header();
        bytes.extend_from_slice(&60000u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        assert_eq!(decode_mrc(&bytes).unwrap().values(), &[60000.0, 2.0]);
    }

    #[test]
    fn extended_header_is_skipped() {
        let mut raw = RawMap::new(ByteOrder::Little, [1, 1, 2], 1);
        raw.extended = vec![0xAB; 80];
        let mut bytes = raw.header();
        bytes.extend(int16_samples(ByteOrder::Little, &[4, 9]));

        assert_eq!(decode_mrc(&bytes).unwrap().values(), &[4.0, 9.0]);
    }

    #[test]
    fn axis_order_is_permuted_to_x_fastest() {
        // Columns run along Z, rows along X, sections along Y.
        let mut raw = RawMap::new(ByteOrder::Little, [2, 3, 1], 1);
        raw.axes = [3, 1, 2];
        let mut bytes = raw.header();
        // file index = col + 2 * row
        bytes.extend(int16_samples(ByteOrder::Little, &[0, 1, 10, 11, 20, 21]));

        let volume = decode_mrc(&bytes).expect("decode");
        assert_eq!(volume.dims(), [3, 1, 2]);
        // value(x=row, y=section, z=col)
        assert_eq!(volume.value(0, 0, 0), 0.0);
        assert_eq!(volume.value(0, 0, 1), 1.0);
        assert_eq!(volume.value(2, 0, 0), 20.0);
        assert_eq!(volume.value(1, 0, 1), 11.0);
    }

    #[test]
    fn spacing_and_start_origin() {
        let mut raw = RawMap::new(ByteOrder::Little, [2, 2, 2], 1);
        raw.sampling = [4, 4, 4];
        raw.cell = [8.0, 2.0, 4.0];
        raw.start = [-2, 1, 3];
        let mut bytes = raw.header();
        bytes.extend(int16_samples(ByteOrder::Little, &[0; 8]));

        let volume = decode_mrc(&bytes).expect("decode");
        assert_eq!(volume.spacing(), [2.0, 0.5, 1.0]);
        assert_eq!(volume.origin(), [-4.0, 0.5, 3.0]);
    }

    #[test]
    fn explicit_origin_wins_over_start() {
        let mut raw = RawMap::new(ByteOrder::Little, [1, 1, 1], 2);
        raw.start = [5, 5, 5];
        raw.origin = [1.5, -2.0, 0.0];
        let mut bytes = raw.header();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());

        assert_eq!(decode_mrc(&bytes).unwrap().origin(), [1.5, -2.0, 0.0]);
    }

    #[test]
    fn truncated_data_is_rejected() {
        let raw = RawMap::new(ByteOrder::Little, [4, 4, 4], 2);
        let mut bytes = raw.header();
        bytes.extend_from_slice(&[0u8; 16]);

        let err = decode_mrc(&bytes).unwrap_err();
        assert!(err.to_string().contains("truncated data"));
    }

    #[test]
    fn oversized_grid_is_a_decode_error() {
        for extents in [[1 << 21, 1 << 21, 1 << 22], [1 << 21, 1 << 21, 1 << 21]] {
            let raw = RawMap::new(ByteOrder::Little, extents, 2);
            let mut bytes = raw.header();
            bytes.extend_from_slice(&[0u8; 64]);

            let err = decode_mrc(&bytes).unwrap_err();
            assert!(matches!(err, MeshmakerError::Decode { .. }), "{extents:?}: {err}");
            assert!(err.to_string().contains("too large"), "{extents:?}: {err}");
        }
    }

    #[test]
    fn short_header_is_rejected() {
        assert!(decode_mrc(&[0u8; 100]).is_err());
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        let raw = RawMap::new(ByteOrder::Little, [1, 1, 1], 4);
        let mut bytes = raw.header();
        bytes.extend_from_slice(&[0u8; 8]);

        let err = decode_mrc(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported data mode 4"));
    }

    #[test]
    fn invalid_axis_map_is_rejected() {
        let mut raw = RawMap::new(ByteOrder::Little, [1, 1, 1], 2);
        raw.axes = [1, 1, 3];
        let mut bytes = raw.header();
        bytes.extend_from_slice(&[0u8; 4]);

        assert!(decode_mrc(&bytes).unwrap_err().to_string().contains("invalid axis order"));
    }

    #[test]
    fn non_positive_dimension_is_rejected() {
        let raw = RawMap::new(ByteOrder::Little, [0, 1, 1], 2);
        let bytes = raw.header();
        assert!(decode_mrc(&bytes).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_mrc(&dir.path().join("absent.map")).unwrap_err();
        assert!(matches!(err, MeshmakerError::Io { .. }));
    }
}
