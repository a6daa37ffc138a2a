//! Minimal Level 5 MAT-file codec.
//!
//! The person-search annotation files are MATLAB v5 `.mat` containers. This
//! module reads the subset of the format those files use - numeric, character,
//! cell, and struct arrays, plus zlib-compressed elements - and writes files
//! the reader accepts, which is how test fixtures are produced.
//!
//! Values are exposed as a small tree model ([`MatArray`]) rather than
//! typed matrices: numeric data is widened to `f64`, and element order is
//! column-major as stored. Sparse and object arrays are rejected.

mod read;
mod write;

use thiserror::Error;

pub use read::{parse_mat_bytes, read_mat};
pub use write::MatWriter;

/// Errors produced while reading or writing MAT-files.
#[derive(Debug, Error)]
pub enum MatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a level 5 MAT-file: {0}")]
    BadHeader(String),

    #[error("big-endian MAT-files are not supported")]
    BigEndian,

    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEof { offset: usize },

    #[error("unsupported data element type {0}")]
    UnsupportedType(u32),

    #[error("unsupported array class {0}")]
    UnsupportedClass(u8),

    #[error("malformed MAT data: {0}")]
    Malformed(String),
}

/// A parsed MAT-file: the top-level variables in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatFile {
    pub variables: Vec<(String, MatArray)>,
}

impl MatFile {
    /// Looks up a top-level variable by name.
    pub fn variable(&self, name: &str) -> Option<&MatArray> {
        self.variables
            .iter()
            .find(|(var, _)| var == name)
            .map(|(_, array)| array)
    }
}

/// A MATLAB array value.
#[derive(Clone, Debug, PartialEq)]
pub enum MatArray {
    Numeric(NumericArray),
    Char(CharArray),
    Cell(CellArray),
    Struct(StructArray),
}

impl MatArray {
    /// The array dimensions as stored (at least two in well-formed files).
    pub fn dims(&self) -> &[usize] {
        match self {
            MatArray::Numeric(a) => &a.dims,
            MatArray::Char(a) => &a.dims,
            MatArray::Cell(a) => &a.dims,
            MatArray::Struct(a) => &a.dims,
        }
    }

    /// Total element count (product of dimensions).
    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            MatArray::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<&CharArray> {
        match self {
            MatArray::Char(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&CellArray> {
        match self {
            MatArray::Cell(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            MatArray::Struct(a) => Some(a),
            _ => None,
        }
    }

    /// The text of a char array, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        self.as_char().map(|a| a.text.as_str())
    }

    /// A 1x1 numeric array holding `value`.
    pub fn scalar(value: f64) -> Self {
        MatArray::Numeric(NumericArray {
            dims: vec![1, 1],
            data: vec![value],
        })
    }

    /// A 1xN numeric row vector.
    pub fn row(values: Vec<f64>) -> Self {
        MatArray::Numeric(NumericArray {
            dims: vec![1, values.len()],
            data: values,
        })
    }

    /// The canonical 0x0 empty numeric array.
    pub fn empty() -> Self {
        MatArray::Numeric(NumericArray {
            dims: vec![0, 0],
            data: Vec::new(),
        })
    }

    /// A 1xN char row vector holding `text`.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        MatArray::Char(CharArray {
            dims: vec![1, text.chars().count()],
            text,
        })
    }

    /// An Nx1 cell array over `cells`.
    pub fn cell_column(cells: Vec<MatArray>) -> Self {
        MatArray::Cell(CellArray {
            dims: vec![cells.len(), 1],
            cells,
        })
    }
}

/// Numeric array with data widened to `f64`, column-major.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericArray {
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

impl NumericArray {
    /// The single value of a 1x1 array.
    pub fn scalar(&self) -> Option<f64> {
        if self.data.len() == 1 {
            Some(self.data[0])
        } else {
            None
        }
    }

    /// Values truncated to `i32`, the form annotation coordinates take.
    pub fn to_i32_vec(&self) -> Vec<i32> {
        self.data.iter().map(|&v| v as i32).collect()
    }
}

/// Character array. Multi-row char matrices are decoded in storage order;
/// the annotation files only ever contain row vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct CharArray {
    pub dims: Vec<usize>,
    pub text: String,
}

/// Cell array, cells in column-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct CellArray {
    pub dims: Vec<usize>,
    pub cells: Vec<MatArray>,
}

/// Struct array: shared field names, one value row per element.
#[derive(Clone, Debug, PartialEq)]
pub struct StructArray {
    pub dims: Vec<usize>,
    pub field_names: Vec<String>,
    /// `elements[i][f]` is field `f` of element `i` (column-major element order).
    pub elements: Vec<Vec<MatArray>>,
}

impl StructArray {
    /// An empty 1x0 struct array with the given field names.
    pub fn with_fields(fields: &[&str]) -> Self {
        Self {
            dims: vec![1, 0],
            field_names: fields.iter().map(|f| f.to_string()).collect(),
            elements: Vec::new(),
        }
    }

    /// Appends one element; `values` must match the field order.
    pub fn push_element(&mut self, values: Vec<MatArray>) {
        debug_assert_eq!(values.len(), self.field_names.len());
        self.elements.push(values);
        self.dims = vec![1, self.elements.len()];
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|f| f == name)
    }

    /// Field `name` of element `elem`.
    pub fn field(&self, elem: usize, name: &str) -> Option<&MatArray> {
        let index = self.field_index(name)?;
        self.elements.get(elem)?.get(index)
    }
}

// Data element type tags.
pub(crate) const MI_INT8: u32 = 1;
pub(crate) const MI_UINT8: u32 = 2;
pub(crate) const MI_INT16: u32 = 3;
pub(crate) const MI_UINT16: u32 = 4;
pub(crate) const MI_INT32: u32 = 5;
pub(crate) const MI_UINT32: u32 = 6;
pub(crate) const MI_SINGLE: u32 = 7;
pub(crate) const MI_DOUBLE: u32 = 9;
pub(crate) const MI_INT64: u32 = 12;
pub(crate) const MI_UINT64: u32 = 13;
pub(crate) const MI_MATRIX: u32 = 14;
pub(crate) const MI_COMPRESSED: u32 = 15;
pub(crate) const MI_UTF8: u32 = 16;
pub(crate) const MI_UTF16: u32 = 17;

// Array class codes.
pub(crate) const MX_CELL: u8 = 1;
pub(crate) const MX_STRUCT: u8 = 2;
pub(crate) const MX_OBJECT: u8 = 3;
pub(crate) const MX_CHAR: u8 = 4;
pub(crate) const MX_SPARSE: u8 = 5;
pub(crate) const MX_DOUBLE: u8 = 6;
pub(crate) const MX_UINT64: u8 = 15;
