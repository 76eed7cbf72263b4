use crate::{
    dataset::{first_item, read_string, read_string_opt, read_u16, sequence},
    enums::AlgorithmType,
    error::SegError,
};

use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use std::collections::BTreeMap;
use tracing::debug;

/// A coded concept, e.g. a SNOMED CT term
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Code {
    pub value: String,
    pub coding_scheme_designator: String,
    pub meaning: String,
}

impl Code {
    fn from_item(item: &InMemDicomObject) -> Result<Self, SegError> {
        Ok(Self {
            value: read_string(item, tags::CODE_VALUE, "CodeValue")?,
            coding_scheme_designator: read_string(
                item,
                tags::CODING_SCHEME_DESIGNATOR,
                "CodingSchemeDesignator",
            )?,
            meaning: read_string(item, tags::CODE_MEANING, "CodeMeaning")?,
        })
    }
}

/// Metadata of a single declared segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentInfo {
    pub number: u16,
    pub label: String,
    pub description: String,
    pub algorithm_type: AlgorithmType,
    pub property_category: Code,
    pub property_type: Code,
}

impl SegmentInfo {
    fn from_item(item: &InMemDicomObject) -> Result<Self, SegError> {
        let number = read_u16(item, tags::SEGMENT_NUMBER, "SegmentNumber")?;
        if number == 0 {
            return Err(SegError::InvalidSegmentNumber(number));
        }

        Ok(Self {
            number,
            label: read_string(item, tags::SEGMENT_LABEL, "SegmentLabel")?,
            description: read_string_opt(item, tags::SEGMENT_DESCRIPTION, "SegmentDescription")?
                .unwrap_or_default(),
            algorithm_type: read_string(item, tags::SEGMENT_ALGORITHM_TYPE, "SegmentAlgorithmType")?
                .parse()?,
            property_category: Code::from_item(first_item(
                item,
                tags::SEGMENTED_PROPERTY_CATEGORY_CODE_SEQUENCE,
                "SegmentedPropertyCategoryCodeSequence",
            )?)?,
            property_type: Code::from_item(first_item(
                item,
                tags::SEGMENTED_PROPERTY_TYPE_CODE_SEQUENCE,
                "SegmentedPropertyTypeCodeSequence",
            )?)?,
        })
    }
}

/// Decode the Segment Sequence into a catalog keyed by segment number.
///
/// # Errors
///
/// Returns [`SegError::DuplicateSegment`] if a segment number is declared
/// twice and [`SegError::InvalidEnumValue`] for an unknown algorithm type.
pub fn decode_segments(
    dataset: &InMemDicomObject,
) -> Result<BTreeMap<u16, SegmentInfo>, SegError> {
    let mut segment_infos = BTreeMap::new();

    for item in sequence(dataset, tags::SEGMENT_SEQUENCE, "SegmentSequence")? {
        let info = SegmentInfo::from_item(item)?;
        if segment_infos.contains_key(&info.number) {
            return Err(SegError::DuplicateSegment(info.number));
        }
        debug!(number = info.number, label = %info.label, "decoded segment");
        segment_infos.insert(info.number, info);
    }

    Ok(segment_infos)
}
