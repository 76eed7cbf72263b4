//! In-memory segmentation fixtures for unit tests.

use dicom::core::value::{DataSetSequence, PrimitiveValue, Value};
use dicom::core::{DataElement, Length, Tag, VR};
use dicom::object::{InMemDicomObject, mem::InMemElement};
use dicom_dictionary_std::tags;

pub(crate) fn ds(tag: Tag, values: &[f64]) -> InMemElement {
    DataElement::new(tag, VR::DS, PrimitiveValue::F64(values.iter().copied().collect()))
}

pub(crate) fn us(tag: Tag, value: u16) -> InMemElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

pub(crate) fn str_elem(tag: Tag, value: &str) -> InMemElement {
    DataElement::new(tag, VR::LO, PrimitiveValue::from(value))
}

pub(crate) fn seq(tag: Tag, items: Vec<InMemDicomObject>) -> InMemElement {
    DataElement::new(
        tag,
        VR::SQ,
        Value::Sequence(DataSetSequence::new(items, Length::UNDEFINED)),
    )
}

pub(crate) fn item(elements: Vec<InMemElement>) -> InMemDicomObject {
    InMemDicomObject::from_element_iter(elements)
}

fn code(value: &str, scheme: &str, meaning: &str) -> InMemDicomObject {
    item(vec![
        str_elem(tags::CODE_VALUE, value),
        str_elem(tags::CODING_SCHEME_DESIGNATOR, scheme),
        str_elem(tags::CODE_MEANING, meaning),
    ])
}

pub(crate) fn segment_item(number: u16, label: &str, algorithm_type: &str) -> InMemDicomObject {
    item(vec![
        us(tags::SEGMENT_NUMBER, number),
        str_elem(tags::SEGMENT_LABEL, label),
        str_elem(tags::SEGMENT_ALGORITHM_TYPE, algorithm_type),
        seq(
            tags::SEGMENTED_PROPERTY_CATEGORY_CODE_SEQUENCE,
            vec![code("123037004", "SCT", "Anatomical Structure")],
        ),
        seq(
            tags::SEGMENTED_PROPERTY_TYPE_CODE_SEQUENCE,
            vec![code("10200004", "SCT", "Liver")],
        ),
    ])
}

pub(crate) struct FixtureFrame {
    pub segment: u16,
    pub position: [f64; 3],
    pub pixels: Vec<u16>,
}

/// Builder for a minimal, well-formed DICOM-SEG data set.
pub(crate) struct SegFixture {
    pub rows: u16,
    pub columns: u16,
    pub segments: Vec<u16>,
    pub frames: Vec<FixtureFrame>,
    pub segmentation_type: &'static str,
    pub overlap: Option<&'static str>,
    pub maximum_fractional_value: Option<u16>,
    pub pixel_spacing: [f64; 2],
    pub slice_thickness: f64,
    pub spacing_between_slices: Option<f64>,
    pub orientation: [f64; 6],
    pub with_pixel_measures: bool,
    pub with_orientation: bool,
}

impl SegFixture {
    pub fn binary(rows: u16, columns: u16) -> Self {
        Self {
            rows,
            columns,
            segments: Vec::new(),
            frames: Vec::new(),
            segmentation_type: "BINARY",
            overlap: Some("NO"),
            maximum_fractional_value: None,
            pixel_spacing: [1.0, 1.0],
            slice_thickness: 1.0,
            spacing_between_slices: None,
            orientation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            with_pixel_measures: true,
            with_orientation: true,
        }
    }

    pub fn fractional(rows: u16, columns: u16, maximum: u16) -> Self {
        Self {
            segmentation_type: "FRACTIONAL",
            overlap: None,
            maximum_fractional_value: Some(maximum),
            ..Self::binary(rows, columns)
        }
    }

    pub fn segment(mut self, number: u16) -> Self {
        self.segments.push(number);
        self
    }

    pub fn frame(mut self, segment: u16, z: f64, pixels: Vec<u16>) -> Self {
        self.frames.push(FixtureFrame {
            segment,
            position: [0.0, 0.0, z],
            pixels,
        });
        self
    }

    /// A frame with every pixel set to `value`.
    pub fn filled_frame(self, segment: u16, z: f64, value: u16) -> Self {
        let count = usize::from(self.rows) * usize::from(self.columns);
        self.frame(segment, z, vec![value; count])
    }

    pub fn build(&self) -> InMemDicomObject {
        let segments = self
            .segments
            .iter()
            .map(|&number| segment_item(number, &format!("Segment {number}"), "MANUAL"))
            .collect();

        let mut pixel_measures = vec![
            ds(tags::PIXEL_SPACING, &self.pixel_spacing),
            ds(tags::SLICE_THICKNESS, &[self.slice_thickness]),
        ];
        if let Some(spacing) = self.spacing_between_slices {
            pixel_measures.push(ds(tags::SPACING_BETWEEN_SLICES, &[spacing]));
        }
        let mut shared = Vec::new();
        if self.with_pixel_measures {
            shared.push(seq(tags::PIXEL_MEASURES_SEQUENCE, vec![item(pixel_measures)]));
        }
        if self.with_orientation {
            shared.push(seq(
                tags::PLANE_ORIENTATION_SEQUENCE,
                vec![item(vec![ds(tags::IMAGE_ORIENTATION_PATIENT, &self.orientation)])],
            ));
        }

        let per_frame = self
            .frames
            .iter()
            .map(|frame| {
                item(vec![
                    seq(
                        tags::PLANE_POSITION_SEQUENCE,
                        vec![item(vec![ds(tags::IMAGE_POSITION_PATIENT, &frame.position)])],
                    ),
                    seq(
                        tags::SEGMENT_IDENTIFICATION_SEQUENCE,
                        vec![item(vec![us(tags::REFERENCED_SEGMENT_NUMBER, frame.segment)])],
                    ),
                ])
            })
            .collect();

        let mut elements = vec![
            str_elem(tags::SEGMENTATION_TYPE, self.segmentation_type),
            us(tags::ROWS, self.rows),
            us(tags::COLUMNS, self.columns),
            DataElement::new(
                tags::NUMBER_OF_FRAMES,
                VR::IS,
                PrimitiveValue::from(self.frames.len().to_string()),
            ),
            seq(tags::SEGMENT_SEQUENCE, segments),
            seq(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, vec![item(shared)]),
            seq(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, per_frame),
            seq(
                tags::REFERENCED_SERIES_SEQUENCE,
                vec![item(vec![
                    str_elem(tags::SERIES_INSTANCE_UID, "1.2.3.4"),
                    seq(
                        tags::REFERENCED_INSTANCE_SEQUENCE,
                        vec![
                            item(vec![str_elem(tags::REFERENCED_SOP_INSTANCE_UID, "1.2.3.4.1")]),
                            item(vec![str_elem(tags::REFERENCED_SOP_INSTANCE_UID, "1.2.3.4.2")]),
                        ],
                    ),
                ])],
            ),
        ];
        if let Some(overlap) = self.overlap {
            elements.push(str_elem(tags::SEGMENTS_OVERLAP, overlap));
        }
        if let Some(maximum) = self.maximum_fractional_value {
            elements.push(us(tags::MAXIMUM_FRACTIONAL_VALUE, maximum));
        }
        elements.extend(self.pixel_data());

        InMemDicomObject::from_element_iter(elements)
    }

    fn pixel_data(&self) -> Vec<InMemElement> {
        let pixels: Vec<u16> = self
            .frames
            .iter()
            .flat_map(|frame| frame.pixels.iter().copied())
            .collect();

        let (bits, bytes) = if self.segmentation_type == "BINARY" {
            let mut packed = vec![0u8; pixels.len().div_ceil(8)];
            for (i, &value) in pixels.iter().enumerate() {
                if value != 0 {
                    packed[i / 8] |= 1 << (i % 8);
                }
            }
            (1, packed)
        } else {
            (8, pixels.iter().map(|&value| value as u8).collect())
        };

        vec![
            us(tags::BITS_ALLOCATED, bits),
            DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(bytes)),
        ]
    }
}
