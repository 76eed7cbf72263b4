use crate::{
    dataset::{element, first_item, read_f64s, read_u16, read_u32_opt, sequence},
    error::SegError,
    volume::MAX_VOXELS,
};

use dicom::{
    core::value::Value,
    object::{FileDicomObject, InMemDicomObject},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array3, ArrayView2, s};
use tracing::debug;

/// Spatial metadata of one frame from the per-frame functional groups
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    /// Position in the declared frame sequence
    pub index: usize,
    pub segment_number: u16,
    pub position: [f64; 3],
}

/// Read the referenced segment and plane position of every frame.
pub fn read_frame_infos(dataset: &InMemDicomObject) -> Result<Vec<FrameInfo>, SegError> {
    let groups = sequence(
        dataset,
        tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
        "PerFrameFunctionalGroupsSequence",
    )?;
    if groups.is_empty() {
        return Err(SegError::NoFrames);
    }

    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let plane_position =
                first_item(group, tags::PLANE_POSITION_SEQUENCE, "PlanePositionSequence")?;
            let identification = first_item(
                group,
                tags::SEGMENT_IDENTIFICATION_SEQUENCE,
                "SegmentIdentificationSequence",
            )?;

            Ok(FrameInfo {
                index,
                segment_number: read_u16(
                    identification,
                    tags::REFERENCED_SEGMENT_NUMBER,
                    "ReferencedSegmentNumber",
                )?,
                position: read_f64s::<3>(
                    plane_position,
                    tags::IMAGE_POSITION_PATIENT,
                    "ImagePositionPatient",
                )?,
            })
        })
        .collect()
}

/// Pixel payload of all frames, shaped `(frames, rows, columns)`
#[derive(Clone, Debug, PartialEq)]
pub struct Frames {
    data: Array3<u16>,
}

impl Frames {
    pub fn new(data: Array3<u16>) -> Self {
        Self { data }
    }

    /// Extract the frames of a segmentation file, decoding encapsulated
    /// pixel data if needed.
    pub fn from_file_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Self, SegError> {
        let pixel_data = element(dicom_object, tags::PIXEL_DATA, "PixelData")?;
        if !matches!(pixel_data.value(), Value::PixelSequence(_)) {
            return Self::from_native(dicom_object);
        }

        debug!("decoding encapsulated pixel data");
        let decoded = dicom_object.decode_pixel_data()?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::None)
            .with_voi_lut(VoiLutOption::Identity);
        let array = decoded.to_ndarray_with_options::<u16>(&options)?;
        Ok(Self::new(array.slice_move(s![.., .., .., 0])))
    }

    /// Unpack native (uncompressed) pixel data.
    ///
    /// Supports 1 bit per pixel, as written for BINARY segmentations, as
    /// well as 8 and 16 bits.
    pub fn from_native(dataset: &InMemDicomObject) -> Result<Self, SegError> {
        let rows = usize::from(read_u16(dataset, tags::ROWS, "Rows")?);
        let columns = usize::from(read_u16(dataset, tags::COLUMNS, "Columns")?);
        let frames = read_u32_opt(dataset, tags::NUMBER_OF_FRAMES, "NumberOfFrames")?.unwrap_or(1)
            as usize;
        let bits_allocated = read_u16(dataset, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let count = frames
            .checked_mul(rows)
            .and_then(|n| n.checked_mul(columns))
            .filter(|&n| n <= MAX_VOXELS)
            .ok_or_else(|| {
                SegError::invalid_attribute(
                    "NumberOfFrames",
                    format!("{frames} frames of {rows}x{columns} exceed {MAX_VOXELS} pixels"),
                )
            })?;

        let bytes = element(dataset, tags::PIXEL_DATA, "PixelData")?
            .to_bytes()
            .map_err(|e| SegError::invalid_attribute("PixelData", e))?;
        let values = unpack(&bytes, bits_allocated, count)?;

        Array3::from_shape_vec((frames, rows, columns), values)
            .map(Self::new)
            .map_err(|e| SegError::invalid_attribute("PixelData", e))
    }

    pub fn len(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(rows, columns)` of a single frame
    pub fn frame_dim(&self) -> (usize, usize) {
        let (_, rows, columns) = self.data.dim();
        (rows, columns)
    }

    pub fn get(&self, index: usize) -> Option<ArrayView2<'_, u16>> {
        (index < self.len()).then(|| self.data.slice(s![index, .., ..]))
    }
}

fn unpack(bytes: &[u8], bits_allocated: u16, count: usize) -> Result<Vec<u16>, SegError> {
    let expected = match bits_allocated {
        1 => count.div_ceil(8),
        8 => count,
        16 => count * 2,
        other => return Err(SegError::UnsupportedBitsAllocated(other)),
    };
    if bytes.len() < expected {
        return Err(SegError::PixelDataTooShort {
            expected,
            actual: bytes.len(),
        });
    }

    let values = match bits_allocated {
        // frames follow each other without padding, least significant bit first
        1 => (0..count)
            .map(|i| u16::from((bytes[i / 8] >> (i % 8)) & 1))
            .collect(),
        8 => bytes[..count].iter().map(|&b| u16::from(b)).collect(),
        _ => bytes[..expected]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SegFixture, us};
    use assert_matches::assert_matches;
    use dicom::core::value::PrimitiveValue;
    use dicom::core::{DataElement, VR};
    use ndarray::array;

    #[test]
    fn reads_frame_infos_in_declared_order() {
        let fixture = SegFixture::binary(1, 2)
            .segment(1)
            .segment(2)
            .filled_frame(2, 5.0, 1)
            .filled_frame(1, -2.5, 1);

        let infos = read_frame_infos(&fixture.build()).unwrap();
        assert_eq!(
            infos,
            vec![
                FrameInfo {
                    index: 0,
                    segment_number: 2,
                    position: [0.0, 0.0, 5.0]
                },
                FrameInfo {
                    index: 1,
                    segment_number: 1,
                    position: [0.0, 0.0, -2.5]
                },
            ]
        );
    }

    #[test]
    fn no_frames() {
        let fixture = SegFixture::binary(1, 1).segment(1);
        assert_matches!(read_frame_infos(&fixture.build()), Err(SegError::NoFrames));
    }

    #[test]
    fn unpacks_bit_packed_frames_across_byte_boundaries() {
        // 3 frames of 1x3 pixels, 9 bits total
        let fixture = SegFixture::binary(1, 3)
            .segment(1)
            .frame(1, 0.0, vec![1, 0, 1])
            .frame(1, 1.0, vec![0, 1, 1])
            .frame(1, 2.0, vec![0, 0, 1]);

        let frames = Frames::from_native(&fixture.build()).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.frame_dim(), (1, 3));
        assert_eq!(frames.get(0).unwrap(), array![[1, 0, 1]]);
        assert_eq!(frames.get(1).unwrap(), array![[0, 1, 1]]);
        assert_eq!(frames.get(2).unwrap(), array![[0, 0, 1]]);
        assert!(frames.get(3).is_none());
    }

    #[test]
    fn unpacks_byte_frames() {
        let fixture = SegFixture::fractional(2, 2, 255)
            .segment(1)
            .frame(1, 0.0, vec![0, 64, 128, 255]);

        let frames = Frames::from_native(&fixture.build()).unwrap();
        assert_eq!(frames.get(0).unwrap(), array![[0, 64], [128, 255]]);
    }

    #[test]
    fn rejects_short_or_unsupported_pixel_data() {
        let fixture = SegFixture::binary(4, 4).segment(1).filled_frame(1, 0.0, 1);

        let mut dataset = fixture.build();
        dataset.put(us(tags::BITS_ALLOCATED, 16));
        assert_matches!(
            Frames::from_native(&dataset),
            Err(SegError::PixelDataTooShort {
                expected: 32,
                actual: 2
            })
        );

        dataset.put(us(tags::BITS_ALLOCATED, 12));
        assert_matches!(
            Frames::from_native(&dataset),
            Err(SegError::UnsupportedBitsAllocated(12))
        );
    }

    #[test]
    fn rejects_oversized_frame_count_before_unpacking() {
        let mut dataset = SegFixture::binary(2, 2)
            .segment(1)
            .filled_frame(1, 0.0, 1)
            .build();
        dataset.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from("4294967295"),
        ));

        assert_matches!(
            Frames::from_native(&dataset),
            Err(SegError::InvalidAttribute { name: "NumberOfFrames", .. })
        );
    }

    #[test]
    fn unpacks_little_endian_words() {
        assert_eq!(unpack(&[0x01, 0x02, 0xff, 0x00], 16, 2).unwrap(), vec![0x0201, 0x00ff]);
    }
}
