//! Minimal reader and writer for NumPy `.npy` array files.
//!
//! Only C-order, little-endian (or byte-sized) integer arrays are handled,
//! which is all a corruption shard or label file ever holds.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::dataset::checksum::compute_checksum_bytes;
use crate::error::{Error, Result};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Element type of an array, from the header's `descr` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl Dtype {
    fn parse(descr: &str) -> Option<Self> {
        let (order, kind) = descr.split_at_checked(1)?;
        let dtype = match kind {
            "u1" => Self::U8,
            "i1" => Self::I8,
            "u2" => Self::U16,
            "i2" => Self::I16,
            "u4" => Self::U32,
            "i4" => Self::I32,
            "u8" => Self::U64,
            "i8" => Self::I64,
            _ => return None,
        };
        // Multi-byte types must be little-endian.
        match order {
            "<" | "|" => Some(dtype),
            "=" if cfg!(target_endian = "little") => Some(dtype),
            _ if dtype.size() == 1 => Some(dtype),
            _ => None,
        }
    }

    /// Bytes per element.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::U64 | Self::I64 => 8,
        }
    }

    fn descr(self) -> &'static str {
        match self {
            Self::U8 => "|u1",
            Self::I8 => "|i1",
            Self::U16 => "<u2",
            Self::I16 => "<i2",
            Self::U32 => "<u4",
            Self::I32 => "<i4",
            Self::U64 => "<u8",
            Self::I64 => "<i8",
        }
    }
}

/// A decoded `.npy` array: shape, element type and raw element bytes.
#[derive(Debug, Clone)]
pub struct NpyArray {
    /// Array dimensions.
    pub shape: Vec<usize>,
    /// Element type.
    pub dtype: Dtype,
    data: Vec<u8>,
}

impl NpyArray {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    /// Whether the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes, valid only for `u8` arrays.
    pub fn into_u8(self) -> Option<Vec<u8>> {
        (self.dtype == Dtype::U8).then_some(self.data)
    }

    /// All elements widened to `i64`.
    ///
    /// `u64` values above `i64::MAX` wrap; class labels never get there.
    #[must_use]
    pub fn to_i64(&self) -> Vec<i64> {
        let size = self.dtype.size();
        self.data
            .chunks_exact(size)
            .map(|b| match self.dtype {
                Dtype::U8 => i64::from(b[0]),
                Dtype::I8 => i64::from(b[0] as i8),
                Dtype::U16 => i64::from(u16::from_le_bytes([b[0], b[1]])),
                Dtype::I16 => i64::from(i16::from_le_bytes([b[0], b[1]])),
                Dtype::U32 => i64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                Dtype::I32 => i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                Dtype::U64 => u64::from_le_bytes(b.try_into().unwrap_or([0; 8])) as i64,
                Dtype::I64 => i64::from_le_bytes(b.try_into().unwrap_or([0; 8])),
            })
            .collect()
    }
}

/// Read an `.npy` file.
///
/// # Errors
///
/// [`Error::NotFound`] if the file is missing, [`Error::Npy`] if it is not a
/// supported array file.
pub fn read_npy(path: &Path) -> Result<NpyArray> {
    read_npy_with_checksum(path).map(|(array, _)| array)
}

/// Read an `.npy` file and fingerprint its bytes with [`compute_checksum_bytes`].
pub fn read_npy_with_checksum(path: &Path) -> Result<(NpyArray, String)> {
    let bytes = fs::read(path).map_err(|e| Error::from_io(path, e))?;
    let checksum = compute_checksum_bytes(&bytes);
    let array = parse_npy(&bytes).map_err(|reason| Error::Npy {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok((array, checksum))
}

/// Parse `.npy` bytes. Errors are plain reasons; [`read_npy`] attaches the path.
pub fn parse_npy(bytes: &[u8]) -> std::result::Result<NpyArray, String> {
    if bytes.len() < 10 || !bytes.starts_with(MAGIC) {
        return Err("missing NUMPY magic".to_string());
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header length".to_string());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(format!("unsupported format version {v}")),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| "truncated header".to_string())?;
    let header = std::str::from_utf8(header).map_err(|_| "header is not text".to_string())?;

    let descr = dict_value(header, "descr")
        .and_then(quoted)
        .ok_or_else(|| "header has no descr".to_string())?;
    let dtype = Dtype::parse(descr).ok_or_else(|| format!("unsupported dtype {descr}"))?;

    let fortran = dict_value(header, "fortran_order").ok_or_else(|| "header has no fortran_order".to_string())?;
    if fortran.starts_with("True") {
        return Err("Fortran-order arrays are not supported".to_string());
    }

    let shape = dict_value(header, "shape")
        .and_then(parse_shape)
        .ok_or_else(|| "header has no valid shape".to_string())?;

    let expected = byte_len(&shape, dtype).ok_or_else(|| "shape overflows".to_string())?;
    let data = &bytes[data_start..];
    if data.len() < expected {
        return Err(format!(
            "expected {expected} data bytes for shape {shape:?}, found {}",
            data.len()
        ));
    }

    Ok(NpyArray {
        shape,
        dtype,
        data: data[..expected].to_vec(),
    })
}

/// Write a `u8` array in `.npy` format 1.0.
pub fn write_npy_u8(path: &Path, shape: &[usize], data: &[u8]) -> Result<()> {
    write_npy(path, Dtype::U8, shape, data)
}

/// Write an `i64` array in `.npy` format 1.0.
pub fn write_npy_i64(path: &Path, shape: &[usize], data: &[i64]) -> Result<()> {
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_npy(path, Dtype::I64, shape, &bytes)
}

fn write_npy(path: &Path, dtype: Dtype, shape: &[usize], data: &[u8]) -> Result<()> {
    let expected = byte_len(shape, dtype);
    if expected != Some(data.len()) {
        return Err(Error::ShapeMismatch {
            what: format!("npy data for {}", path.display()),
            expected: expected.map_or_else(|| "shape overflows".to_string(), |n| n.to_string()),
            actual: data.len().to_string(),
        });
    }

    let dims = match shape {
        [single] => format!("({single},)"),
        _ => format!(
            "({})",
            shape.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {dims}, }}",
        dtype.descr()
    );
    // Pad so the data starts on a 64-byte boundary, header ends with '\n'.
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut file = fs::File::create(path)?;
    file.write_all(MAGIC)?;
    file.write_all(&[1, 0])?;
    file.write_all(&(header.len() as u16).to_le_bytes())?;
    file.write_all(header.as_bytes())?;
    file.write_all(data)?;
    Ok(())
}

/// Data size in bytes, `None` if it does not fit in `usize`.
fn byte_len(shape: &[usize], dtype: Dtype) -> Option<usize> {
    shape
        .iter()
        .try_fold(dtype.size(), |acc, &dim| acc.checked_mul(dim))
}

/// Text following `'key':` in a header dict, trimmed on the left.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start = header.find(&needle)? + needle.len();
    Some(header[start..].trim_start())
}

fn quoted(value: &str) -> Option<&str> {
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &value[1..];
    rest.find(quote).map(|end| &rest[..end])
}

fn parse_shape(value: &str) -> Option<Vec<usize>> {
    let inner = value.strip_prefix('(')?;
    let inner = &inner[..inner.find(')')?];
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_v1(dict: &str, data: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        bytes.extend_from_slice(dict.as_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_parse_u8_images() {
        let bytes = header_v1(
            "{'descr': '|u1', 'fortran_order': False, 'shape': (2, 1, 1, 3), }\n",
            &[1, 2, 3, 4, 5, 6],
        );
        let arr = parse_npy(&bytes).unwrap();
        assert_eq!(arr.shape, vec![2, 1, 1, 3]);
        assert_eq!(arr.dtype, Dtype::U8);
        assert_eq!(arr.into_u8().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_parse_i32_labels() {
        let data: Vec<u8> = [3i32, -1, 9].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = header_v1("{'descr': '<i4', 'fortran_order': False, 'shape': (3,), }\n", &data);
        let arr = parse_npy(&bytes).unwrap();
        assert_eq!(arr.shape, vec![3]);
        assert_eq!(arr.to_i64(), vec![3, -1, 9]);
        assert!(arr.into_u8().is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        assert!(parse_npy(b"not an array file").is_err());
    }

    #[test]
    fn test_rejects_fortran_order() {
        let bytes = header_v1("{'descr': '|u1', 'fortran_order': True, 'shape': (1,), }\n", &[0]);
        assert!(parse_npy(&bytes).unwrap_err().contains("Fortran"));
    }

    #[test]
    fn test_rejects_big_endian() {
        let bytes = header_v1("{'descr': '>i8', 'fortran_order': False, 'shape': (1,), }\n", &[0; 8]);
        assert!(parse_npy(&bytes).is_err());
    }

    #[test]
    fn test_rejects_truncated_data() {
        let bytes = header_v1("{'descr': '|u1', 'fortran_order': False, 'shape': (4,), }\n", &[0, 1]);
        assert!(parse_npy(&bytes).unwrap_err().contains("expected 4"));
    }

    #[test]
    fn test_rejects_overflowing_shape() {
        let bytes = header_v1(
            "{'descr': '<i8', 'fortran_order': False, 'shape': (4611686018427387904, 8), }\n",
            &[0; 64],
        );
        assert_eq!(parse_npy(&bytes).unwrap_err(), "shape overflows");

        let dir = tempfile::tempdir().unwrap();
        let err = write_npy_u8(&dir.path().join("x.npy"), &[usize::MAX, 2], &[0; 2]).unwrap_err();
        assert!(err.to_string().contains("shape overflows"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.npy");
        write_npy_i64(&path, &[4], &[0, 7, 2, 9]).unwrap();

        let raw = fs::read(&path).unwrap();
        let header_len = usize::from(u16::from_le_bytes([raw[8], raw[9]]));
        assert_eq!((10 + header_len) % 64, 0);

        let arr = read_npy(&path).unwrap();
        assert_eq!(arr.to_i64(), vec![0, 7, 2, 9]);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_npy(&dir.path().join("fog.npy")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_write_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_npy_u8(&dir.path().join("x.npy"), &[2, 2], &[0; 3]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
