//! Geometry resolution for DICOM-SEG frames.
//!
//! A segmentation carries no explicit slice ordering, only the patient
//! position of every frame. The slice axis, origin and number of slices
//! are inferred by projecting the unique frame positions onto the normal
//! of the shared image plane.

use crate::{
    dataset::{first_item, first_item_opt, read_f64, read_f64_opt, read_f64s, read_u16},
    error::SegError,
    volume::MAX_VOXELS,
};

use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use ndarray::{Array1, Array2, ArrayView1, arr1};
use std::collections::HashMap;
use tracing::{debug, warn};

const ORTHOGONALITY_TOLERANCE: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub rows: usize,
    pub columns: usize,
    pub slices: usize,
}

impl Size {
    /// Number of voxels, `None` if it overflows or exceeds [`MAX_VOXELS`].
    pub fn voxel_count(&self) -> Option<usize> {
        self.slices
            .checked_mul(self.rows)?
            .checked_mul(self.columns)
            .filter(|&count| count <= MAX_VOXELS)
    }
}

/// Spatial layout shared by every volume decoded from one segmentation.
///
/// `direction` holds the row, column and slice axis unit vectors as its
/// columns, in patient coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    origin: Array1<f64>,
    spacing: Array1<f64>,
    direction: Array2<f64>,
    size: Size,
    inverse: Array2<f64>,
}

impl Geometry {
    /// # Errors
    ///
    /// Fails if any spacing is not strictly positive or if
    /// `direction · diag(spacing)` is singular.
    pub fn new(
        origin: [f64; 3],
        spacing: [f64; 3],
        direction: Array2<f64>,
        size: Size,
    ) -> Result<Self, SegError> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(SegError::invalid_attribute(
                "PixelMeasuresSequence",
                format!("spacing must be positive, got {spacing:?}"),
            ));
        }
        if direction.dim() != (3, 3) {
            return Err(SegError::invalid_attribute(
                "ImageOrientationPatient",
                "direction must be a 3x3 matrix",
            ));
        }
        size.voxel_count().ok_or_else(|| {
            SegError::invalid_attribute(
                "PerFrameFunctionalGroupsSequence",
                format!("volume of {size:?} exceeds {MAX_VOXELS} voxels"),
            )
        })?;

        let spacing = arr1(&spacing);
        let scaled = &direction * &spacing;
        let inverse = invert3(&scaled).ok_or_else(|| {
            SegError::invalid_attribute("ImageOrientationPatient", "degenerate image orientation")
        })?;

        Ok(Self {
            origin: arr1(&origin),
            spacing,
            direction,
            size,
            inverse,
        })
    }

    /// Resolve the geometry from the shared functional groups and the
    /// positions of all frames.
    pub fn resolve(
        dataset: &InMemDicomObject,
        positions: impl IntoIterator<Item = [f64; 3]>,
    ) -> Result<Self, SegError> {
        let spacing = declared_spacing(dataset)?;
        let direction = image_direction(dataset)?;
        let (origin, extent) =
            origin_and_extent(positions, direction.column(2)).ok_or(SegError::NoFrames)?;

        let size = Size {
            rows: usize::from(read_u16(dataset, tags::ROWS, "Rows")?),
            columns: usize::from(read_u16(dataset, tags::COLUMNS, "Columns")?),
            slices: slice_count(extent, spacing[2])?,
        };

        debug!(?origin, ?spacing, extent, ?size, "resolved segmentation geometry");
        Self::new(origin, spacing, direction, size)
    }

    pub fn origin(&self) -> [f64; 3] {
        to_array(self.origin.view())
    }

    pub fn spacing(&self) -> [f64; 3] {
        to_array(self.spacing.view())
    }

    pub fn direction(&self) -> &Array2<f64> {
        &self.direction
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Buffer shape `(slices, rows, columns)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.size.slices, self.size.rows, self.size.columns)
    }

    /// Map a patient position to the nearest `(column, row, slice)` index.
    pub fn physical_to_index(&self, point: [f64; 3]) -> [i64; 3] {
        let continuous = self.inverse.dot(&(arr1(&point) - &self.origin));
        // round half up, like ITK
        [0, 1, 2].map(|axis| (continuous[axis] + 0.5).floor() as i64)
    }

    pub fn index_to_physical(&self, index: [f64; 3]) -> [f64; 3] {
        let scaled = &self.direction * &self.spacing;
        to_array((&self.origin + &scaled.dot(&arr1(&index))).view())
    }

    /// Slice of the volume a frame at `position` belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`SegError::FrameOutOfBounds`] if the slice index is not
    /// within `0..size.slices`.
    pub fn slice_index(&self, frame: usize, position: [f64; 3]) -> Result<usize, SegError> {
        let slice = self.physical_to_index(position)[2];
        usize::try_from(slice)
            .ok()
            .filter(|&s| s < self.size.slices)
            .ok_or(SegError::FrameOutOfBounds {
                frame,
                slice,
                slices: self.size.slices,
            })
    }
}

/// Pixel spacing `(x, y)` plus slice spacing, which falls back to the
/// slice thickness when Spacing Between Slices is absent.
pub fn declared_spacing(dataset: &InMemDicomObject) -> Result<[f64; 3], SegError> {
    let shared = first_item(
        dataset,
        tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
        "SharedFunctionalGroupsSequence",
    )?;
    let pixel_measures = first_item_opt(shared, tags::PIXEL_MEASURES_SEQUENCE)
        .ok_or(SegError::MissingPixelMeasures)?;

    let [x_spacing, y_spacing] = read_f64s::<2>(pixel_measures, tags::PIXEL_SPACING, "PixelSpacing")?;
    let z_spacing = match read_f64_opt(
        pixel_measures,
        tags::SPACING_BETWEEN_SLICES,
        "SpacingBetweenSlices",
    )? {
        Some(spacing) => positive("SpacingBetweenSlices", spacing)?,
        None => positive(
            "SliceThickness",
            read_f64(pixel_measures, tags::SLICE_THICKNESS, "SliceThickness")?,
        )?,
    };

    Ok([
        positive("PixelSpacing", x_spacing)?,
        positive("PixelSpacing", y_spacing)?,
        z_spacing,
    ])
}

fn positive(name: &'static str, spacing: f64) -> Result<f64, SegError> {
    if spacing.is_finite() && spacing > 0.0 {
        Ok(spacing)
    } else {
        Err(SegError::invalid_attribute(
            name,
            format!("spacing must be positive, got {spacing}"),
        ))
    }
}

/// `ceil(extent / z_spacing) + 1`
fn slice_count(extent: f64, z_spacing: f64) -> Result<usize, SegError> {
    let steps = (extent / z_spacing).ceil();
    let too_many = || {
        SegError::invalid_attribute(
            "ImagePositionPatient",
            format!("extent {extent} spans too many slices of {z_spacing}"),
        )
    };
    if !steps.is_finite() || steps < 0.0 || steps >= MAX_VOXELS as f64 {
        return Err(too_many());
    }
    (steps as usize).checked_add(1).ok_or_else(too_many)
}

/// Direction matrix with the normalised row vector, column vector and
/// their cross product as columns.
// NOTE: the columns are stacked as-is. Whether some orientation conventions
// need the transpose is unverified against reference data.
pub fn image_direction(dataset: &InMemDicomObject) -> Result<Array2<f64>, SegError> {
    let shared = first_item(
        dataset,
        tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
        "SharedFunctionalGroupsSequence",
    )?;
    let orientation = first_item_opt(shared, tags::PLANE_ORIENTATION_SEQUENCE)
        .ok_or(SegError::MissingOrientation)?;
    let iop = read_f64s::<6>(orientation, tags::IMAGE_ORIENTATION_PATIENT, "ImageOrientationPatient")?;

    direction_from_orientation(iop)
}

pub fn direction_from_orientation(iop: [f64; 6]) -> Result<Array2<f64>, SegError> {
    let x_dir = normalize(arr1(&iop[..3]))?;
    let y_dir = normalize(arr1(&iop[3..]))?;

    let dot = x_dir.dot(&y_dir);
    if dot.abs() > ORTHOGONALITY_TOLERANCE {
        warn!(dot, "image orientation row and column vectors are not orthogonal");
    }
    let z_dir = cross(&x_dir, &y_dir);

    let columns = [x_dir, y_dir, z_dir];
    Ok(Array2::from_shape_fn((3, 3), |(row, col)| columns[col][row]))
}

/// Origin and extent along `slice_dir` of a set of frame positions.
///
/// Positions are measured against the first one. Repeated positions count
/// once. The origin is the position with the smallest signed distance,
/// the extent the spread between smallest and largest distance. Returns
/// `None` for an empty input.
pub fn origin_and_extent(
    positions: impl IntoIterator<Item = [f64; 3]>,
    slice_dir: ArrayView1<f64>,
) -> Option<([f64; 3], f64)> {
    let mut positions = positions.into_iter().peekable();
    let reference = arr1(positions.peek()?);

    let mut distances: HashMap<[u64; 3], f64> = HashMap::new();
    let mut origin = None;
    let mut min_distance = f64::INFINITY;
    let mut max_distance = f64::NEG_INFINITY;

    for position in positions {
        // +0.0 folds -0.0 into 0.0 so both hash alike
        let key = position.map(|v| (v + 0.0).to_bits());
        if distances.contains_key(&key) {
            continue;
        }

        let distance = (arr1(&position) - &reference).dot(&slice_dir);
        distances.insert(key, distance);

        if origin.is_none() || distance < min_distance {
            min_distance = distance;
            origin = Some(position);
        }
        max_distance = max_distance.max(distance);
    }

    let extent = if distances.len() > 1 {
        (max_distance - min_distance).abs()
    } else {
        0.0
    };
    origin.map(|origin| (origin, extent))
}

fn normalize(v: Array1<f64>) -> Result<Array1<f64>, SegError> {
    let norm = v.dot(&v).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(SegError::invalid_attribute(
            "ImageOrientationPatient",
            "orientation vector has zero length",
        ));
    }
    Ok(v / norm)
}

fn cross(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    arr1(&[
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ])
}

fn invert3(m: &Array2<f64>) -> Option<Array2<f64>> {
    let cofactor = |r: usize, c: usize| {
        let (r0, r1) = ((r + 1) % 3, (r + 2) % 3);
        let (c0, c1) = ((c + 1) % 3, (c + 2) % 3);
        m[[r0, c0]] * m[[r1, c1]] - m[[r0, c1]] * m[[r1, c0]]
    };
    let det = (0..3).map(|c| m[[0, c]] * cofactor(0, c)).sum::<f64>();
    if det.abs() < f64::EPSILON {
        return None;
    }
    // inverse is the transposed cofactor matrix over the determinant
    Some(Array2::from_shape_fn((3, 3), |(r, c)| cofactor(c, r) / det))
}

fn to_array(v: ArrayView1<f64>) -> [f64; 3] {
    [v[0], v[1], v[2]]
}
