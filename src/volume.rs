use crate::enums::Orientation;
use crate::geometry::Geometry;

use image::ImageBuffer;
use image::Luma;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

/// Largest voxel count accepted for one buffer. An `f32` buffer of this
/// size stays within `isize::MAX` bytes on every target.
pub const MAX_VOXELS: usize = {
    let by_bytes = isize::MAX as usize / std::mem::size_of::<f32>();
    if by_bytes < u32::MAX as usize {
        by_bytes
    } else {
        u32::MAX as usize
    }
};

/// Voxel element types produced by the decoders
pub trait Voxel: Copy + Default + PartialEq + Send + Sync + 'static {
    fn to_f32(self) -> f32;
}

impl Voxel for u8 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Voxel for u16 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Voxel for f32 {
    fn to_f32(self) -> f32 {
        self
    }
}

/// A voxel buffer shaped `(slices, rows, columns)` placed in patient space
#[derive(Clone, Debug, PartialEq)]
pub struct Volume<T> {
    pub data: Array3<T>,
    pub geometry: Geometry,
}

impl<T: Voxel> Volume<T> {
    pub fn new(data: Array3<T>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    /// Zero-initialised buffer matching the geometry
    pub fn zeros(geometry: Geometry) -> Self {
        Self {
            data: Array3::from_elem(geometry.shape(), T::default()),
            geometry,
        }
    }

    /// Get the dimensions of the volume (slices, rows, columns)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, T>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    /// Render a slice as an 8-bit grayscale image, scaled to the volume's
    /// maximum value.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, &orientation)?;
        Self::slice_to_image(&slice, self.max_value())
    }

    fn max_value(&self) -> f32 {
        self.data
            .iter()
            .fold(0.0_f32, |max, value| max.max(value.to_f32()))
    }

    #[inline]
    fn normalize_to_u8(value: T, max: f32) -> u8 {
        if max <= 0.0 {
            return 0;
        }
        ((value.to_f32() / max) * 255.0).clamp(0.0, 255.0) as u8
    }

    fn slice_to_image(
        slice: &ArrayView2<'_, T>,
        max: f32,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| Self::normalize_to_u8(v, max))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}
