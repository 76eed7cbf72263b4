//! # DICOM-SEG volume library
//!
//! This crate reconstructs 3D volumes from DICOM Segmentation objects.

//!
//! This library is part of the dicom-rs ecosystem. A DICOM-SEG object stores
//! a stack of 2D frames, each tagged with a patient position and the number
//! of the segment it belongs to. Frames carry no slice index, so the slice
//! axis, origin and number of slices are inferred from the frame positions
//! projected onto the normal of the shared image plane. Repeated positions,
//! e.g. the same slice sent once per segment, count only once.
//!
//! Two decoders are provided:
//!  - [`SegmentReader`] builds one volume per segment. BINARY data yields
//!    `u8` volumes, FRACTIONAL data `f32` volumes scaled to `[0, 1]`.
//!    Segments are decoded in parallel using rayon.
//!  - [`MultiClassReader`] builds a single labelmap holding segment numbers.
//!    It requires BINARY data without overlapping segments and uses `u16`
//!    labels once a segment number exceeds 255.
//!
//! Frame payloads are read from native pixel data (1, 8 or 16 bits
//! allocated). Encapsulated pixel data is decoded through dicom-pixeldata.
//!
//! # Examples
//!
//! ## Reading a segmentation as a labelmap
//!
//! ```no_run
//! # use dicom_seg_volume::MultiClassReader;
//! let reader = MultiClassReader::load_from_file("seg.dcm")
//!     .expect("should have decoded the segmentation");
//! println!("{:?}", reader.header.geometry.size());
//! ```
//!
//! ## Reading every segment into its own volume
//!
//! ```no_run
//! # use dicom_seg_volume::{DecodeOptions, SegmentReader, SegmentVolumes, Orientation};
//! let reader = SegmentReader::load_from_file("seg.dcm", &DecodeOptions::default())
//!     .expect("should have decoded the segmentation");
//! if let SegmentVolumes::Binary(volumes) = &reader.volumes {
//!     for (number, volume) in volumes {
//!         let image = volume
//!             .get_image_from_axis(volume.dim().0 / 2, Orientation::Axial)
//!             .expect("should have returned image at center of volume");
//!         image.save(format!("segment-{number}.png")).unwrap();
//!     }
//! }
//! ```

mod dataset;
pub mod enums;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod options;
pub mod reader;
pub mod segment;
#[cfg(test)]
mod testing;
pub mod volume;

pub use enums::{AlgorithmType, Orientation, SegmentationType, SegmentsOverlap};
pub use error::SegError;
pub use frames::{FrameInfo, Frames};
pub use geometry::{Geometry, Size};
pub use options::DecodeOptions;
pub use reader::{
    MultiClassReader, MultiClassVolume, ReferencedSeries, SegmentReader, SegmentVolumes,
    SegmentationHeader,
};
pub use segment::{Code, SegmentInfo};
pub use volume::{Volume, Voxel};
