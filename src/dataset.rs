//! Attribute access over an in-memory DICOM data set.
//!
//! Every lookup carries the attribute keyword so that a malformed
//! segmentation reports which attribute it is missing.

use crate::error::SegError;

use dicom::core::Tag;
use dicom::object::{InMemDicomObject, mem::InMemElement};

pub(crate) fn element<'a>(
    obj: &'a InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<&'a InMemElement, SegError> {
    obj.get(tag).ok_or(SegError::MissingAttribute { name })
}

/// First item of a sequence attribute, `None` if the attribute is absent
/// or the sequence has no items.
pub(crate) fn first_item_opt(obj: &InMemDicomObject, tag: Tag) -> Option<&InMemDicomObject> {
    obj.get(tag)?.items()?.first()
}

pub(crate) fn first_item<'a>(
    obj: &'a InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<&'a InMemDicomObject, SegError> {
    let items = sequence(obj, tag, name)?;
    items
        .first()
        .ok_or_else(|| SegError::invalid_attribute(name, "sequence has no items"))
}

pub(crate) fn sequence<'a>(
    obj: &'a InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<&'a [InMemDicomObject], SegError> {
    element(obj, tag, name)?
        .items()
        .ok_or_else(|| SegError::invalid_attribute(name, "not a sequence"))
}

pub(crate) fn read_string(
    obj: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<String, SegError> {
    let value = element(obj, tag, name)?
        .to_str()
        .map_err(|e| SegError::invalid_attribute(name, e))?;
    Ok(clean(&value))
}

pub(crate) fn read_string_opt(
    obj: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<String>, SegError> {
    match obj.get(tag) {
        Some(elem) => elem
            .to_str()
            .map(|value| Some(clean(&value)))
            .map_err(|e| SegError::invalid_attribute(name, e)),
        None => Ok(None),
    }
}

pub(crate) fn read_u16(obj: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<u16, SegError> {
    element(obj, tag, name)?
        .to_int::<u16>()
        .map_err(|e| SegError::invalid_attribute(name, e))
}

pub(crate) fn read_u32_opt(
    obj: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<u32>, SegError> {
    obj.get(tag)
        .map(|elem| elem.to_int::<u32>().map_err(|e| SegError::invalid_attribute(name, e)))
        .transpose()
}

pub(crate) fn read_f64(obj: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<f64, SegError> {
    element(obj, tag, name)?
        .to_float64()
        .map_err(|e| SegError::invalid_attribute(name, e))
}

pub(crate) fn read_f64_opt(
    obj: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<f64>, SegError> {
    obj.get(tag)
        .map(|elem| elem.to_float64().map_err(|e| SegError::invalid_attribute(name, e)))
        .transpose()
}

/// Multi-valued decimal attribute with an exact value multiplicity.
pub(crate) fn read_f64s<const N: usize>(
    obj: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<[f64; N], SegError> {
    let values = element(obj, tag, name)?
        .to_multi_float64()
        .map_err(|e| SegError::invalid_attribute(name, e))?;
    let found = values.len();
    values
        .try_into()
        .map_err(|_| SegError::invalid_attribute(name, format!("expected {N} values, got {found}")))
}

// DICOM pads strings to even length with spaces or NUL.
fn clean(value: &str) -> String {
    value.trim_end_matches(['\0', ' ']).trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ds, seq, str_elem};
    use assert_matches::assert_matches;
    use dicom_dictionary_std::tags;

    #[test]
    fn strings_are_stripped_of_padding() {
        let obj = InMemDicomObject::from_element_iter([str_elem(tags::SEGMENT_LABEL, "Liver \0")]);
        assert_eq!(
            read_string(&obj, tags::SEGMENT_LABEL, "SegmentLabel").unwrap(),
            "Liver"
        );
    }

    #[test]
    fn missing_attribute_reports_keyword() {
        let obj = InMemDicomObject::new_empty();
        assert_matches!(
            read_string(&obj, tags::SEGMENT_LABEL, "SegmentLabel"),
            Err(SegError::MissingAttribute { name: "SegmentLabel" })
        );
        assert_eq!(
            read_string_opt(&obj, tags::SEGMENT_DESCRIPTION, "SegmentDescription").unwrap(),
            None
        );
    }

    #[test]
    fn value_multiplicity_is_checked() {
        let obj = InMemDicomObject::from_element_iter([ds(tags::PIXEL_SPACING, &[0.5, 0.5, 1.0])]);
        assert_matches!(
            read_f64s::<2>(&obj, tags::PIXEL_SPACING, "PixelSpacing"),
            Err(SegError::InvalidAttribute { name: "PixelSpacing", .. })
        );
        assert_eq!(
            read_f64s::<3>(&obj, tags::PIXEL_SPACING, "PixelSpacing").unwrap(),
            [0.5, 0.5, 1.0]
        );
    }

    #[test]
    fn empty_sequence_has_no_first_item() {
        let obj = InMemDicomObject::from_element_iter([seq(tags::SEGMENT_SEQUENCE, vec![])]);
        assert!(first_item_opt(&obj, tags::SEGMENT_SEQUENCE).is_none());
        assert_matches!(
            first_item(&obj, tags::SEGMENT_SEQUENCE, "SegmentSequence"),
            Err(SegError::InvalidAttribute { .. })
        );
    }
}
