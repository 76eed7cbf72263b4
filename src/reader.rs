use crate::{
    dataset::{first_item_opt, read_f64_opt, read_string, read_string_opt, sequence},
    enums::{SegmentationType, SegmentsOverlap},
    error::SegError,
    frames::{FrameInfo, Frames, read_frame_infos},
    geometry::Geometry,
    options::DecodeOptions,
    segment::{SegmentInfo, decode_segments},
    volume::{Volume, Voxel},
};

use dicom::object::{InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use ndarray::s;
use rayon::prelude::*;
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, trace};

/// Series the segmentation was derived from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferencedSeries {
    pub series_instance_uid: String,
    pub instance_uids: Vec<String>,
}

/// Everything shared by both decoders: the segment catalog, the resolved
/// geometry and the per-frame metadata.
#[derive(Clone, Debug)]
pub struct SegmentationHeader {
    pub segment_infos: BTreeMap<u16, SegmentInfo>,
    pub geometry: Geometry,
    pub frame_infos: Vec<FrameInfo>,
    pub segmentation_type: SegmentationType,
    pub segments_overlap: SegmentsOverlap,
    pub maximum_fractional_value: Option<f64>,
    pub referenced_series: Option<ReferencedSeries>,
}

impl SegmentationHeader {
    /// # Errors
    ///
    /// Fails on any malformed or missing attribute, on duplicate segment
    /// numbers and on frames referencing an undeclared segment.
    pub fn from_dataset(dataset: &InMemDicomObject) -> Result<Self, SegError> {
        let segment_infos = decode_segments(dataset)?;
        let frame_infos = read_frame_infos(dataset)?;
        let geometry = Geometry::resolve(dataset, frame_infos.iter().map(|frame| frame.position))?;

        if let Some(frame) = frame_infos
            .iter()
            .find(|frame| !segment_infos.contains_key(&frame.segment_number))
        {
            return Err(SegError::UndeclaredSegment {
                frame: frame.index,
                segment: frame.segment_number,
            });
        }

        let segmentation_type: SegmentationType =
            read_string(dataset, tags::SEGMENTATION_TYPE, "SegmentationType")?.parse()?;
        let segments_overlap: SegmentsOverlap = read_string_opt(dataset, tags::SEGMENTS_OVERLAP, "SegmentsOverlap")?
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();
        let maximum_fractional_value = read_f64_opt(
            dataset,
            tags::MAXIMUM_FRACTIONAL_VALUE,
            "MaximumFractionalValue",
        )?;

        debug!(
            segments = segment_infos.len(),
            frames = frame_infos.len(),
            %segmentation_type,
            "read segmentation header"
        );

        Ok(Self {
            segment_infos,
            geometry,
            frame_infos,
            segmentation_type,
            segments_overlap,
            maximum_fractional_value,
            referenced_series: Self::referenced_series(dataset)?,
        })
    }

    pub fn referenced_series_uid(&self) -> Option<&str> {
        self.referenced_series
            .as_ref()
            .map(|series| series.series_instance_uid.as_str())
    }

    pub fn referenced_instance_uids(&self) -> &[String] {
        self.referenced_series
            .as_ref()
            .map(|series| series.instance_uids.as_slice())
            .unwrap_or_default()
    }

    fn referenced_series(dataset: &InMemDicomObject) -> Result<Option<ReferencedSeries>, SegError> {
        let Some(series) = first_item_opt(dataset, tags::REFERENCED_SERIES_SEQUENCE) else {
            return Ok(None);
        };

        let instance_uids = match series.get(tags::REFERENCED_INSTANCE_SEQUENCE) {
            Some(_) => sequence(
                series,
                tags::REFERENCED_INSTANCE_SEQUENCE,
                "ReferencedInstanceSequence",
            )?
            .iter()
            .map(|item| {
                read_string(
                    item,
                    tags::REFERENCED_SOP_INSTANCE_UID,
                    "ReferencedSOPInstanceUID",
                )
            })
            .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

        Ok(Some(ReferencedSeries {
            series_instance_uid: read_string(series, tags::SERIES_INSTANCE_UID, "SeriesInstanceUID")?,
            instance_uids,
        }))
    }

    fn check_frames(&self, frames: &Frames) -> Result<(), SegError> {
        if frames.len() != self.frame_infos.len() {
            return Err(SegError::FrameCountMismatch {
                expected: self.frame_infos.len(),
                actual: frames.len(),
            });
        }
        let size = self.geometry.size();
        if frames.frame_dim() != (size.rows, size.columns) {
            return Err(SegError::invalid_attribute(
                "PixelData",
                format!(
                    "frames are {:?}, expected ({}, {})",
                    frames.frame_dim(),
                    size.rows,
                    size.columns
                ),
            ));
        }
        Ok(())
    }

    fn frame<'a>(
        &self,
        frames: &'a Frames,
        info: &FrameInfo,
    ) -> Result<(usize, ndarray::ArrayView2<'a, u16>), SegError> {
        let slice = self.geometry.slice_index(info.index, info.position)?;
        let pixels = frames.get(info.index).ok_or(SegError::FrameCountMismatch {
            expected: self.frame_infos.len(),
            actual: frames.len(),
        })?;
        trace!(frame = info.index, segment = info.segment_number, slice, "placing frame");
        Ok((slice, pixels))
    }
}

/// One volume per declared segment
#[derive(Clone, Debug, PartialEq)]
pub enum SegmentVolumes {
    Binary(BTreeMap<u16, Volume<u8>>),
    Fractional(BTreeMap<u16, Volume<f32>>),
}

impl SegmentVolumes {
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(volumes) => volumes.len(),
            Self::Fractional(volumes) => volumes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn segment_numbers(&self) -> Vec<u16> {
        match self {
            Self::Binary(volumes) => volumes.keys().copied().collect(),
            Self::Fractional(volumes) => volumes.keys().copied().collect(),
        }
    }
}

/// Decodes every segment into its own volume.
///
/// BINARY segmentations produce `u8` volumes, FRACTIONAL ones `f32`
/// volumes scaled to `[0, 1]`.
#[derive(Clone, Debug)]
pub struct SegmentReader {
    pub header: SegmentationHeader,
    pub volumes: SegmentVolumes,
}

impl SegmentReader {
    pub fn read(dataset: &InMemDicomObject, frames: &Frames) -> Result<Self, SegError> {
        Self::read_with_options(dataset, frames, &DecodeOptions::default())
    }

    pub fn read_with_options(
        dataset: &InMemDicomObject,
        frames: &Frames,
        options: &DecodeOptions,
    ) -> Result<Self, SegError> {
        let header = SegmentationHeader::from_dataset(dataset)?;
        let volumes = Self::decode(&header, frames, options)?;
        Ok(Self { header, volumes })
    }

    /// Load and decode a DICOM-SEG file
    pub fn load_from_file(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self, SegError> {
        let dicom_object = open_file(path.as_ref())?;
        let frames = Frames::from_file_object(&dicom_object)?;
        Self::read_with_options(&dicom_object, &frames, options)
    }

    pub fn decode(
        header: &SegmentationHeader,
        frames: &Frames,
        options: &DecodeOptions,
    ) -> Result<SegmentVolumes, SegError> {
        header.check_frames(frames)?;

        match header.segmentation_type {
            SegmentationType::Binary => {
                let volumes = Self::decode_segments(header, frames, options.parallel, |value| {
                    u8::try_from(value).unwrap_or(u8::MAX)
                })?;
                Ok(SegmentVolumes::Binary(volumes))
            }
            SegmentationType::Fractional => {
                let divisor = if options.rescale_fractional {
                    let maximum = header
                        .maximum_fractional_value
                        .ok_or(SegError::MissingAttribute {
                            name: "MaximumFractionalValue",
                        })?;
                    if maximum <= 0.0 {
                        return Err(SegError::invalid_attribute(
                            "MaximumFractionalValue",
                            format!("must be positive, got {maximum}"),
                        ));
                    }
                    maximum as f32
                } else {
                    1.0
                };
                let volumes = Self::decode_segments(header, frames, options.parallel, |value| {
                    f32::from(value) / divisor
                })?;
                Ok(SegmentVolumes::Fractional(volumes))
            }
        }
    }

    fn decode_segments<T: Voxel>(
        header: &SegmentationHeader,
        frames: &Frames,
        parallel: bool,
        convert: impl Fn(u16) -> T + Sync,
    ) -> Result<BTreeMap<u16, Volume<T>>, SegError> {
        // every segment rescans the full frame list
        let decode_segment = |&number: &u16| -> Result<(u16, Volume<T>), SegError> {
            debug!(segment = number, "decoding segment");
            let mut volume = Volume::zeros(header.geometry.clone());
            for info in header
                .frame_infos
                .iter()
                .filter(|info| info.segment_number == number)
            {
                let (slice, pixels) = header.frame(frames, info)?;
                volume
                    .data_mut()
                    .slice_mut(s![slice, .., ..])
                    .zip_mut_with(&pixels, |voxel, &value| *voxel = convert(value));
            }
            Ok((number, volume))
        };

        let numbers: Vec<u16> = header.segment_infos.keys().copied().collect();
        if parallel {
            numbers.par_iter().map(decode_segment).collect()
        } else {
            numbers.iter().map(decode_segment).collect()
        }
    }
}

/// Labelmap whose voxels hold segment numbers, `0` being background
#[derive(Clone, Debug, PartialEq)]
pub enum MultiClassVolume {
    U8(Volume<u8>),
    U16(Volume<u16>),
}

impl MultiClassVolume {
    pub fn geometry(&self) -> &Geometry {
        match self {
            Self::U8(volume) => volume.geometry(),
            Self::U16(volume) => volume.geometry(),
        }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::U8(volume) => volume.dim(),
            Self::U16(volume) => volume.dim(),
        }
    }

    /// Segment number at `(slice, row, column)`
    pub fn label(&self, index: [usize; 3]) -> Option<u16> {
        match self {
            Self::U8(volume) => volume.data().get(index).map(|&v| u16::from(v)),
            Self::U16(volume) => volume.data().get(index).copied(),
        }
    }
}

/// Decodes all segments into a single labelmap.
///
/// Only valid for BINARY segmentations without overlapping segments.
/// Frames are applied in their declared order, later frames overwrite
/// earlier ones.
#[derive(Clone, Debug)]
pub struct MultiClassReader {
    pub header: SegmentationHeader,
    pub volume: MultiClassVolume,
}

impl MultiClassReader {
    pub fn read(dataset: &InMemDicomObject, frames: &Frames) -> Result<Self, SegError> {
        let header = SegmentationHeader::from_dataset(dataset)?;
        let volume = Self::decode(&header, frames)?;
        Ok(Self { header, volume })
    }

    /// Load and decode a DICOM-SEG file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SegError> {
        let dicom_object = open_file(path.as_ref())?;
        let frames = Frames::from_file_object(&dicom_object)?;
        Self::read(&dicom_object, &frames)
    }

    pub fn decode(
        header: &SegmentationHeader,
        frames: &Frames,
    ) -> Result<MultiClassVolume, SegError> {
        if header.segmentation_type != SegmentationType::Binary {
            return Err(SegError::UnsupportedSegmentationType(
                header.segmentation_type,
            ));
        }
        if header.segments_overlap == SegmentsOverlap::Yes {
            return Err(SegError::OverlappingSegments);
        }
        header.check_frames(frames)?;

        let max_segment_number = header.segment_infos.keys().max().copied().unwrap_or(0);
        if max_segment_number < 256 {
            Self::decode_labels(header, frames, |number| number as u8).map(MultiClassVolume::U8)
        } else {
            Self::decode_labels(header, frames, |number| number).map(MultiClassVolume::U16)
        }
    }

    fn decode_labels<T: Voxel>(
        header: &SegmentationHeader,
        frames: &Frames,
        label: impl Fn(u16) -> T,
    ) -> Result<Volume<T>, SegError> {
        let mut volume = Volume::zeros(header.geometry.clone());
        for info in &header.frame_infos {
            let (slice, pixels) = header.frame(frames, info)?;
            let value = label(info.segment_number);
            volume
                .data_mut()
                .slice_mut(s![slice, .., ..])
                .zip_mut_with(&pixels, |voxel, &mask| {
                    if mask > 0 {
                        *voxel = value;
                    }
                });
        }
        Ok(volume)
    }
}
