use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegError {
    #[error("Pixel measures functional group is missing")]
    MissingPixelMeasures,

    #[error("Plane orientation functional group is missing")]
    MissingOrientation,

    #[error("Segment {0} was declared more than once")]
    DuplicateSegment(u16),

    #[error("Invalid segment number {0}, segment numbers start at 1")]
    InvalidSegmentNumber(u16),

    #[error("Invalid value {value:?} for {attribute}")]
    InvalidEnumValue {
        attribute: &'static str,
        value: String,
    },

    #[error("Only BINARY segmentations can be read as multi-class, got {0}")]
    UnsupportedSegmentationType(crate::enums::SegmentationType),

    #[error("Segmentation contains overlapping segments, cannot read as multi-class")]
    OverlappingSegments,

    #[error("Frame {frame} maps to slice {slice}, outside of 0..{slices}")]
    FrameOutOfBounds {
        frame: usize,
        slice: i64,
        slices: usize,
    },

    #[error("Frame {frame} references undeclared segment {segment}")]
    UndeclaredSegment { frame: usize, segment: u16 },

    #[error("Segmentation contains no frames")]
    NoFrames,

    #[error("Missing attribute {name}")]
    MissingAttribute { name: &'static str },

    #[error("Invalid attribute {name}: {reason}")]
    InvalidAttribute { name: &'static str, reason: String },

    #[error("Pixel data holds {actual} frames, functional groups declare {expected}")]
    FrameCountMismatch { expected: usize, actual: usize },

    #[error("Unsupported bits allocated: {0}")]
    UnsupportedBitsAllocated(u16),

    #[error("Pixel data too short: expected {expected} bytes, got {actual}")]
    PixelDataTooShort { expected: usize, actual: usize },

    #[error("DICOM error: {0}")]
    Read(#[from] dicom::object::ReadError),

    #[error("Pixel data decoding error: {0}")]
    PixelDecode(#[from] dicom::pixeldata::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegError {
    pub(crate) fn invalid_attribute(name: &'static str, reason: impl ToString) -> Self {
        SegError::InvalidAttribute {
            name,
            reason: reason.to_string(),
        }
    }
}
