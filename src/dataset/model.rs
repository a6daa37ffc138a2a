//! Core record types for the person-search dataset.
//!
//! Boxes keep the integer pixel coordinates of the source annotations.
//! The annotation files store `(x, y, w, h)`; assembled records use the
//! canonical `(x1, y1, x2, y2)` layout.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchsetError;

/// A bounding box as stored in the annotation files: top-left corner plus
/// width and height, in absolute pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxXYWH {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoxXYWH {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether the box has positive extent. Annotations failing this are
    /// dropped at load time.
    pub fn is_valid(&self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Converts to corner form.
    pub fn to_xyxy(&self) -> BoxXYXY {
        BoxXYXY {
            x1: self.x,
            y1: self.y,
            x2: self.x + self.w,
            y2: self.y + self.h,
        }
    }
}

/// A bounding box in corner form, absolute pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxXYXY {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoxXYXY {
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// A person identity label. Non-negative values are identities numbered
/// `0..N-1` within one split; [`PersonId::UNLABELED`] marks a background
/// individual no protocol entry claimed.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PersonId(pub i32);

impl PersonId {
    pub const UNLABELED: PersonId = PersonId(-1);

    #[inline]
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    #[inline]
    pub fn is_labeled(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Debug for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersonId({})", self.0)
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One roidb entry: the ground truth for a single gallery image.
///
/// `boxes` and `pids` are parallel; `pids[i]` labels `boxes[i]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoiRecord {
    /// Resolved path of the image file.
    pub image: PathBuf,

    /// Image width in pixels.
    pub width: usize,

    /// Image height in pixels.
    pub height: usize,

    /// Ground-truth boxes in corner form.
    pub boxes: Vec<BoxXYXY>,

    /// Person identity per box.
    pub pids: Vec<PersonId>,
}

/// A search query: one image region whose identity is looked up in the
/// gallery during evaluation. Test split only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    /// Resolved path of the query image.
    pub image: PathBuf,

    /// The query region in corner form.
    pub roi: BoxXYXY,
}

/// Which partition of the dataset to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = SearchsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            other => Err(SearchsetError::UnknownSplit(other.to_string())),
        }
    }
}
