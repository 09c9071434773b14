pub use super::*;

pub mod covariance_3d_backward;
pub mod covariance_backward;
pub mod rasterize_backward;
pub mod spherical_harmonics_backward;
pub mod transform_backward;
