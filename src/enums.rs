use std::{fmt, str::FromStr};

use crate::error::SegError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Segment Algorithm Type (0062,0008)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlgorithmType {
    Automatic,
    Semiautomatic,
    Manual,
}

/// Segmentation Type (0062,0001)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentationType {
    Binary,
    Fractional,
}

/// Segments Overlap (0062,0013)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SegmentsOverlap {
    Yes,
    #[default]
    Undefined,
    No,
}

fn invalid(attribute: &'static str, value: &str) -> SegError {
    SegError::InvalidEnumValue {
        attribute,
        value: value.to_string(),
    }
}

impl FromStr for AlgorithmType {
    type Err = SegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "AUTOMATIC" => Ok(Self::Automatic),
            "SEMIAUTOMATIC" => Ok(Self::Semiautomatic),
            "MANUAL" => Ok(Self::Manual),
            other => Err(invalid("SegmentAlgorithmType", other)),
        }
    }
}

impl FromStr for SegmentationType {
    type Err = SegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "BINARY" => Ok(Self::Binary),
            "FRACTIONAL" => Ok(Self::Fractional),
            other => Err(invalid("SegmentationType", other)),
        }
    }
}

impl FromStr for SegmentsOverlap {
    type Err = SegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "YES" => Ok(Self::Yes),
            "UNDEFINED" => Ok(Self::Undefined),
            "NO" => Ok(Self::No),
            other => Err(invalid("SegmentsOverlap", other)),
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Automatic => "AUTOMATIC",
            Self::Semiautomatic => "SEMIAUTOMATIC",
            Self::Manual => "MANUAL",
        })
    }
}

impl fmt::Display for SegmentationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Binary => "BINARY",
            Self::Fractional => "FRACTIONAL",
        })
    }
}
