//! Level 5 MAT-file reader.
//!
//! Parses the 128-byte header, then the top-level data elements. Both normal
//! (8-byte tag) and small (packed 4+4) element tags are handled, as are
//! `miCOMPRESSED` elements, which hold a zlib stream wrapping a single
//! `miMATRIX` element. Compressed elements are not 8-byte padded on disk
//! (MATLAB itself does not pad them), so padding is skipped for that tag.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;

use super::{
    CellArray, CharArray, MatArray, MatError, MatFile, NumericArray, StructArray, MI_COMPRESSED,
    MI_DOUBLE, MI_INT16, MI_INT32, MI_INT64, MI_INT8, MI_MATRIX, MI_SINGLE, MI_UINT16, MI_UINT32,
    MI_UINT64, MI_UINT8, MI_UTF16, MI_UTF8, MX_CELL, MX_CHAR, MX_DOUBLE, MX_OBJECT, MX_SPARSE,
    MX_STRUCT, MX_UINT64,
};

/// Reads and parses a MAT-file from disk.
pub fn read_mat(path: &Path) -> Result<MatFile, MatError> {
    let bytes = fs::read(path)?;
    parse_mat_bytes(&bytes)
}

/// Parses a MAT-file from an in-memory byte buffer.
pub fn parse_mat_bytes(bytes: &[u8]) -> Result<MatFile, MatError> {
    if bytes.len() < 128 {
        return Err(MatError::BadHeader(
            "file shorter than the 128-byte header".to_string(),
        ));
    }

    // A level 4 file starts with a numeric type field that contains zero
    // bytes; the level 5 description text never does.
    if bytes[..4].contains(&0) {
        return Err(MatError::BadHeader(
            "looks like a level 4 MAT-file".to_string(),
        ));
    }

    match &bytes[126..128] {
        b"IM" => {}
        b"MI" => return Err(MatError::BigEndian),
        other => {
            return Err(MatError::BadHeader(format!(
                "bad endian indicator {:?}",
                other
            )))
        }
    }

    let version = u16::from_le_bytes([bytes[124], bytes[125]]);
    if version != 0x0100 {
        return Err(MatError::BadHeader(format!(
            "unsupported version 0x{version:04x}"
        )));
    }

    let mut reader = Reader {
        buf: bytes,
        pos: 128,
    };
    let mut variables = Vec::new();

    while reader.remaining() >= 8 {
        let (element_type, data) = reader.read_element()?;
        match element_type {
            MI_MATRIX => {
                let (name, array) = parse_matrix(data)?;
                variables.push((name, array));
            }
            MI_COMPRESSED => {
                let mut decoded = Vec::new();
                ZlibDecoder::new(data).read_to_end(&mut decoded)?;
                let mut inner = Reader {
                    buf: &decoded,
                    pos: 0,
                };
                let (inner_type, inner_data) = inner.read_element()?;
                if inner_type != MI_MATRIX {
                    return Err(MatError::Malformed(format!(
                        "compressed element wraps type {inner_type}, expected miMATRIX"
                    )));
                }
                let (name, array) = parse_matrix(inner_data)?;
                variables.push((name, array));
            }
            other => return Err(MatError::UnsupportedType(other)),
        }
    }

    Ok(MatFile { variables })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MatError> {
        if self.remaining() < n {
            return Err(MatError::UnexpectedEof { offset: self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, MatError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads one data element, returning its type tag and payload.
    fn read_element(&mut self) -> Result<(u32, &'a [u8]), MatError> {
        let first = self.read_u32()?;

        // Small data element: byte count packed into the upper half-word,
        // payload in the remaining 4 tag bytes.
        if first >> 16 != 0 {
            let element_type = first & 0xffff;
            let byte_count = (first >> 16) as usize;
            if byte_count > 4 {
                return Err(MatError::Malformed(format!(
                    "small element claims {byte_count} bytes"
                )));
            }
            let data = &self.take(4)?[..byte_count];
            return Ok((element_type, data));
        }

        let element_type = first;
        let byte_count = self.read_u32()? as usize;
        let data = self.take(byte_count)?;

        // Payloads are padded to the next 8-byte boundary, except after
        // miCOMPRESSED elements.
        if element_type != MI_COMPRESSED {
            let pad = byte_count.next_multiple_of(8) - byte_count;
            let pad = pad.min(self.remaining());
            self.pos += pad;
        }

        Ok((element_type, data))
    }
}

/// Parses an `miMATRIX` payload into its name and array value.
fn parse_matrix(data: &[u8]) -> Result<(String, MatArray), MatError> {
    let mut reader = Reader { buf: data, pos: 0 };

    let (flags_type, flags) = reader.read_element()?;
    if flags_type != MI_UINT32 || flags.len() < 8 {
        return Err(MatError::Malformed("bad array flags element".to_string()));
    }
    let flag_word = u32::from_le_bytes([flags[0], flags[1], flags[2], flags[3]]);
    let class = (flag_word & 0xff) as u8;

    let (dims_type, dims_data) = reader.read_element()?;
    if dims_type != MI_INT32 {
        return Err(MatError::Malformed("bad dimensions element".to_string()));
    }
    let mut dims = Vec::with_capacity(dims_data.len() / 4);
    for chunk in dims_data.chunks_exact(4) {
        let dim = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if dim < 0 {
            return Err(MatError::Malformed(format!("negative dimension {dim}")));
        }
        dims.push(dim as usize);
    }

    let (name_type, name_data) = reader.read_element()?;
    if name_type != MI_INT8 && name_type != MI_UINT8 {
        return Err(MatError::Malformed("bad array name element".to_string()));
    }
    let name = String::from_utf8_lossy(name_data)
        .trim_end_matches('\0')
        .to_string();

    let count: usize = dims.iter().product();

    let array = match class {
        MX_CHAR => {
            let text = if count == 0 && reader.remaining() < 8 {
                String::new()
            } else {
                let (text_type, text_data) = reader.read_element()?;
                decode_char(text_type, text_data)?
            };
            MatArray::Char(CharArray { dims, text })
        }
        MX_CELL => {
            let mut cells = Vec::with_capacity(count);
            for _ in 0..count {
                let (cell_type, cell_data) = reader.read_element()?;
                if cell_type != MI_MATRIX {
                    return Err(MatError::Malformed(format!(
                        "cell contains element type {cell_type}, expected miMATRIX"
                    )));
                }
                let (_, cell) = parse_matrix(cell_data)?;
                cells.push(cell);
            }
            MatArray::Cell(CellArray { dims, cells })
        }
        MX_STRUCT => {
            let (len_type, len_data) = reader.read_element()?;
            if len_type != MI_INT32 || len_data.len() < 4 {
                return Err(MatError::Malformed(
                    "bad struct field name length".to_string(),
                ));
            }
            let max_len = i32::from_le_bytes([len_data[0], len_data[1], len_data[2], len_data[3]]);
            if max_len < 0 {
                return Err(MatError::Malformed(
                    "negative struct field name length".to_string(),
                ));
            }
            let max_len = max_len as usize;

            let (names_type, names_data) = reader.read_element()?;
            if names_type != MI_INT8 && names_type != MI_UINT8 {
                return Err(MatError::Malformed("bad struct field names".to_string()));
            }
            let field_names: Vec<String> = if max_len == 0 {
                Vec::new()
            } else {
                names_data
                    .chunks(max_len)
                    .map(|chunk| {
                        String::from_utf8_lossy(chunk)
                            .trim_end_matches('\0')
                            .to_string()
                    })
                    .collect()
            };

            // Field values are element-major: all fields of element 0, then
            // all fields of element 1, and so on.
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                let mut values = Vec::with_capacity(field_names.len());
                for _ in 0..field_names.len() {
                    let (value_type, value_data) = reader.read_element()?;
                    if value_type != MI_MATRIX {
                        return Err(MatError::Malformed(format!(
                            "struct field holds element type {value_type}, expected miMATRIX"
                        )));
                    }
                    let (_, value) = parse_matrix(value_data)?;
                    values.push(value);
                }
                elements.push(values);
            }
            MatArray::Struct(StructArray {
                dims,
                field_names,
                elements,
            })
        }
        MX_SPARSE | MX_OBJECT => return Err(MatError::UnsupportedClass(class)),
        c if (MX_DOUBLE..=MX_UINT64).contains(&c) => {
            let data = if count == 0 && reader.remaining() < 8 {
                Vec::new()
            } else {
                let (data_type, raw) = reader.read_element()?;
                decode_numeric(data_type, raw)?
            };
            if data.len() != count {
                return Err(MatError::Malformed(format!(
                    "numeric array '{name}' holds {} values for {count} elements",
                    data.len()
                )));
            }
            // An imaginary part may follow for complex arrays; the annotation
            // data is always real, so it is ignored.
            MatArray::Numeric(NumericArray { dims, data })
        }
        other => return Err(MatError::UnsupportedClass(other)),
    };

    Ok((name, array))
}

fn decode_char(element_type: u32, data: &[u8]) -> Result<String, MatError> {
    match element_type {
        MI_UINT16 | MI_UTF16 => {
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        }
        MI_UTF8 | MI_UINT8 | MI_INT8 => Ok(String::from_utf8_lossy(data).to_string()),
        other => Err(MatError::UnsupportedType(other)),
    }
}

fn decode_numeric(element_type: u32, data: &[u8]) -> Result<Vec<f64>, MatError> {
    fn convert<const N: usize>(
        data: &[u8],
        f: impl Fn([u8; N]) -> f64,
    ) -> Result<Vec<f64>, MatError> {
        if data.len() % N != 0 {
            return Err(MatError::Malformed(format!(
                "numeric payload of {} bytes is not a multiple of {N}",
                data.len()
            )));
        }
        Ok(data
            .chunks_exact(N)
            .map(|chunk| f(chunk.try_into().expect("chunks_exact yields N bytes")))
            .collect())
    }

    match element_type {
        MI_INT8 => Ok(data.iter().map(|&b| b as i8 as f64).collect()),
        MI_UINT8 => Ok(data.iter().map(|&b| b as f64).collect()),
        MI_INT16 => convert(data, |b| i16::from_le_bytes(b) as f64),
        MI_UINT16 => convert(data, |b| u16::from_le_bytes(b) as f64),
        MI_INT32 => convert(data, |b| i32::from_le_bytes(b) as f64),
        MI_UINT32 => convert(data, |b| u32::from_le_bytes(b) as f64),
        MI_SINGLE => convert(data, |b| f32::from_le_bytes(b) as f64),
        MI_DOUBLE => convert(data, f64::from_le_bytes),
        MI_INT64 => convert(data, |b| i64::from_le_bytes(b) as f64),
        MI_UINT64 => convert(data, |b| u64::from_le_bytes(b) as f64),
        other => Err(MatError::UnsupportedType(other)),
    }
}
