//! Level 5 MAT-file writer.
//!
//! Emits the same subset of the format the reader understands: numeric data
//! as `miDOUBLE`, char data as UTF-16, cell and struct nesting, and
//! optionally zlib-compressed variables. Small element tags are never
//! produced; every element gets a full 8-byte tag, which readers must accept.

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{
    MatArray, MatError, MI_COMPRESSED, MI_DOUBLE, MI_INT32, MI_INT8, MI_MATRIX, MI_UINT16,
    MI_UINT32, MX_CELL, MX_CHAR, MX_DOUBLE, MX_STRUCT,
};

/// Struct field names are stored in fixed-width slots of this many bytes
/// (31 characters plus a terminating NUL), the width MATLAB uses.
const FIELD_NAME_SLOT: usize = 32;

/// Incrementally builds a MAT-file in memory.
pub struct MatWriter {
    buf: Vec<u8>,
}

impl MatWriter {
    pub fn new() -> Self {
        let mut buf = b"MATLAB 5.0 MAT-file, created by searchset".to_vec();
        buf.resize(116, b' ');
        buf.extend([0u8; 8]); // subsystem data offset, unused
        buf.extend(0x0100u16.to_le_bytes());
        buf.extend(*b"IM");
        Self { buf }
    }

    /// Appends a top-level variable.
    pub fn add(&mut self, name: &str, array: &MatArray) {
        let body = matrix_bytes(name, array);
        write_element(&mut self.buf, MI_MATRIX, &body);
    }

    /// Appends a top-level variable as a zlib-compressed element, the way
    /// MATLAB writes by default. Compressed elements carry no tail padding.
    pub fn add_compressed(&mut self, name: &str, array: &MatArray) -> Result<(), MatError> {
        let mut element = Vec::new();
        write_element(&mut element, MI_MATRIX, &matrix_bytes(name, array));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&element)?;
        let compressed = encoder.finish()?;

        self.buf.extend(MI_COMPRESSED.to_le_bytes());
        self.buf.extend((compressed.len() as u32).to_le_bytes());
        self.buf.extend(&compressed);
        Ok(())
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Writes the accumulated file to disk.
    pub fn write_to(&self, path: &Path) -> Result<(), MatError> {
        fs::write(path, &self.buf)?;
        Ok(())
    }
}

impl Default for MatWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes one data element with a full tag and 8-byte tail padding.
fn write_element(out: &mut Vec<u8>, element_type: u32, data: &[u8]) {
    out.extend(element_type.to_le_bytes());
    out.extend((data.len() as u32).to_le_bytes());
    out.extend(data);
    let pad = data.len().next_multiple_of(8) - data.len();
    out.extend(std::iter::repeat(0u8).take(pad));
}

/// Serializes an array into an `miMATRIX` payload.
fn matrix_bytes(name: &str, array: &MatArray) -> Vec<u8> {
    let mut out = Vec::new();

    let class = match array {
        MatArray::Numeric(_) => MX_DOUBLE,
        MatArray::Char(_) => MX_CHAR,
        MatArray::Cell(_) => MX_CELL,
        MatArray::Struct(_) => MX_STRUCT,
    };

    let mut flags = Vec::with_capacity(8);
    flags.extend((class as u32).to_le_bytes());
    flags.extend(0u32.to_le_bytes());
    write_element(&mut out, MI_UINT32, &flags);

    let mut dims = Vec::new();
    for &dim in array.dims() {
        dims.extend((dim as i32).to_le_bytes());
    }
    write_element(&mut out, MI_INT32, &dims);

    write_element(&mut out, MI_INT8, name.as_bytes());

    match array {
        MatArray::Numeric(numeric) => {
            let mut data = Vec::with_capacity(numeric.data.len() * 8);
            for &value in &numeric.data {
                data.extend(value.to_le_bytes());
            }
            write_element(&mut out, MI_DOUBLE, &data);
        }
        MatArray::Char(chars) => {
            let mut data = Vec::new();
            for unit in chars.text.encode_utf16() {
                data.extend(unit.to_le_bytes());
            }
            write_element(&mut out, MI_UINT16, &data);
        }
        MatArray::Cell(cell) => {
            for value in &cell.cells {
                let body = matrix_bytes("", value);
                write_element(&mut out, MI_MATRIX, &body);
            }
        }
        MatArray::Struct(strukt) => {
            write_element(&mut out, MI_INT32, &(FIELD_NAME_SLOT as i32).to_le_bytes());

            let mut names = Vec::with_capacity(strukt.field_names.len() * FIELD_NAME_SLOT);
            for field in &strukt.field_names {
                let mut slot = field.as_bytes().to_vec();
                slot.truncate(FIELD_NAME_SLOT - 1);
                slot.resize(FIELD_NAME_SLOT, 0);
                names.extend(slot);
            }
            write_element(&mut out, MI_INT8, &names);

            for element in &strukt.elements {
                for value in element {
                    let body = matrix_bytes("", value);
                    write_element(&mut out, MI_MATRIX, &body);
                }
            }
        }
    }

    out
}
