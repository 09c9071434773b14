pub use super::*;

/// Forward-pass state and upstream loss gradients consumed by the backward
/// pass. All buffers are allocated by the external caller for one training
/// step; the backward kernels only read them.
///
/// Shapes: `P` = point count, `T` = sorted tile-point pair count, `B` =
/// bucket count, `I_x`/`I_y` = image size, `T_x`/`T_y` = tile size.
#[derive(Clone, Debug, Default)]
pub struct RenderInput {
    /// `[B, T_x * T_y, 3]`
    ///
    /// Accumulated color checkpoint at each bucket's pixel boundary.
    pub bucket_colors_rgb_2d: Vec<f32>,
    /// `[B, T_x * T_y]`
    ///
    /// Accumulated inverse-depth checkpoint at each bucket's pixel boundary.
    pub bucket_inverse_depths_2d: Vec<f32>,
    /// `[B]`
    pub bucket_tile_indices: Vec<u32>,
    /// `[B, T_x * T_y]`
    ///
    /// Transmittance checkpoint at each bucket's pixel boundary.
    pub bucket_transmittances: Vec<f32>,
    /// `[3]`
    pub colors_background: [f32; 3],
    /// `[P, 3]`
    ///
    /// Empty if colors are not derived from spherical harmonics.
    pub colors_dc: Vec<f32>,
    /// `[I_y, I_x, 3]`
    ///
    /// Composited color, excluding the background term.
    pub colors_rgb_2d: Vec<f32>,
    /// `[I_y, I_x, 3]`
    pub colors_rgb_2d_grad: Vec<f32>,
    /// `[P, 3]`
    pub colors_rgb_3d: Vec<f32>,
    /// `[P, 15, 3]`
    ///
    /// Empty if colors are not derived from spherical harmonics.
    pub colors_sh: Vec<f32>,
    /// `[P, 3]`
    pub conics: Vec<f32>,
    /// `[P, 6]`
    pub covariances_3d: Vec<f32>,
    /// `[P]`
    pub depths: Vec<f32>,
    /// `f_x <- I_x / tan(Fov_x / 2) / 2`
    pub focal_length_x: f32,
    /// `f_y <- I_y / tan(Fov_y / 2) / 2`
    pub focal_length_y: f32,
    /// `I_x`
    pub image_size_x: u32,
    /// `I_y`
    pub image_size_y: u32,
    /// `[I_y, I_x]`
    ///
    /// Composited inverse depth.
    pub inverse_depths_2d: Vec<f32>,
    /// `[I_y, I_x]`
    pub inverse_depths_2d_grad: Vec<f32>,
    /// `[P, 3]`
    pub is_colors_rgb_3d_not_clamped: Vec<f32>,
    /// `[P]`
    ///
    /// Raw opacity, before the anti-aliasing convolution.
    pub opacities_3d: Vec<f32>,
    /// `[P]`
    ///
    /// The opacity composited by the forward pass. Equals `opacities_3d`
    /// when anti-aliasing is disabled.
    pub opacities_3d_rendered: Vec<f32>,
    /// `P`
    pub point_count: u32,
    /// `[T]`
    pub point_indices: Vec<u32>,
    /// `[I_y, I_x]`
    ///
    /// Count of contributing points per pixel, relative to the tile's range.
    pub point_rendered_counts: Vec<u32>,
    /// `[I_y / T_y * I_x / T_x]`
    ///
    /// Maximum of `point_rendered_counts` over each tile.
    pub point_rendered_counts_max: Vec<u32>,
    /// `[P, 2]`
    ///
    /// Screen-space means in pixel coordinates.
    pub positions_2d: Vec<f32>,
    /// `[P, 3]`
    pub positions_3d: Vec<f32>,
    /// `[3 + 1, 3 + 1]`
    ///
    /// Column-major view-projection transform.
    pub projection_transform: [[f32; 4]; 4],
    /// `[P]`
    ///
    /// Screen-space radii. Non-positive radii mark culled points.
    pub radii: Vec<i32>,
    /// `[P, 4] <- (r, x, y, z)`
    ///
    /// Not necessarily unit quaternions. Empty if covariances are not
    /// derived from scalings and rotations.
    pub rotations: Vec<f32>,
    /// `[P, 3]`
    ///
    /// Empty if covariances are not derived from scalings and rotations.
    pub scalings: Vec<f32>,
    /// `tan(Fov_x / 2)`
    pub tan_fov_x: f32,
    /// `tan(Fov_y / 2)`
    pub tan_fov_y: f32,
    /// `[I_y / T_y * I_x / T_x]`
    ///
    /// Exclusive prefix sum of per-tile bucket counts.
    pub tile_bucket_offsets: Vec<u32>,
    /// `[I_y / T_y * I_x / T_x, 2]`
    pub tile_point_ranges: Vec<u32>,
    /// `[I_y, I_x]`
    ///
    /// Final transmittance per pixel.
    pub transmittances: Vec<f32>,
    /// `[3]`
    pub view_position: [f32; 3],
    /// `[3 + 1, 3 + 1]`
    ///
    /// Column-major view transform.
    pub view_transform: [[f32; 4]; 4],
}

/// Dense per-point gradients produced for the external optimizer layer.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// `[P, 3]`
    ///
    /// Empty if colors are not derived from spherical harmonics.
    pub colors_dc_grad: Vec<f32>,
    /// `[P, 3]`
    pub colors_rgb_3d_grad: Vec<f32>,
    /// `[P, 15, 3]`
    ///
    /// Empty if colors are not derived from spherical harmonics.
    pub colors_sh_grad: Vec<f32>,
    /// `[P, 3]`
    ///
    /// The cross-entry gradient carries half weight, matching the conic
    /// gradient convention of the forward rasterizer.
    pub conics_grad: Vec<f32>,
    /// `[P, 6]`
    pub covariances_3d_grad: Vec<f32>,
    /// `[P]`
    pub inverse_depths_grad: Vec<f32>,
    /// `[P]`
    ///
    /// Gradient with respect to the raw opacity.
    pub opacities_3d_grad: Vec<f32>,
    /// `[P, 2]`
    ///
    /// Gradient with respect to the normalized-device-coordinate mean.
    pub positions_2d_grad: Vec<f32>,
    /// `[P, 2]`
    ///
    /// Unsigned-magnitude accumulation of the same quantity, consumed by
    /// the external densification heuristic.
    pub positions_2d_grad_abs: Vec<f32>,
    /// `[P]`
    pub positions_2d_grad_norm: Vec<f32>,
    /// `[P, 3]`
    pub positions_3d_grad: Vec<f32>,
    /// `[P, 4]`
    ///
    /// Not projected onto the unit-quaternion tangent space. Empty if
    /// covariances are not derived from scalings and rotations.
    pub rotations_grad: Vec<f32>,
    /// `[P, 3]`
    ///
    /// Empty if covariances are not derived from scalings and rotations.
    pub scalings_grad: Vec<f32>,
}
