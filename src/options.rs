/// Options controlling how segmentation frames are assembled into volumes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Assemble per-segment volumes on the rayon thread pool
    pub parallel: bool,
    /// Divide FRACTIONAL values by the Maximum Fractional Value
    pub rescale_fractional: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            rescale_fractional: true,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_rescale_fractional(mut self, rescale: bool) -> Self {
        self.rescale_fractional = rescale;
        self
    }
}
