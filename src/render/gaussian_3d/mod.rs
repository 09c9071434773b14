pub mod backward;
pub mod kernel;

pub use crate::{
    backend::GradientBuffer,
    error::Error,
    preset::{render::*, spherical_harmonics::*},
    spherical_harmonics::SH_COEF,
};
pub use backward::{RenderInput, RenderOutput};
pub use glam::{Mat3, Mat4, Vec3};
pub use kernel::covariance_backward::FILTER_LOW_PASS;

#[derive(Clone, Debug, PartialEq)]
pub struct Gaussian3dBackwardOptions {
    /// Rescaling the opacity gradient by the low-pass determinant ratio
    /// when enabled, matching a forward pass that convolved the filter into
    /// the opacity.
    pub antialiasing: bool,
    /// It should be no more than [`SH_DEGREE_MAX`].
    pub colors_sh_degree_max: u32,
    pub scale_modifier: f32,
}

impl Default for Gaussian3dBackwardOptions {
    #[inline]
    fn default() -> Self {
        Self {
            antialiasing: false,
            colors_sh_degree_max: SH_DEGREE_MAX,
            scale_modifier: 1.0,
        }
    }
}

/// Differentiating the rendered image against the point parameters.
///
/// Kernel order follows the data flow: the compositing backward and the
/// covariance backward produce partial screen-space and covariance
/// gradients, which the transform backward completes into position, color,
/// scaling, and rotation gradients.
pub fn backward(
    input: &RenderInput,
    options: &Gaussian3dBackwardOptions,
) -> Result<RenderOutput, Error> {
    #[cfg(debug_assertions)]
    log::debug!(target: "splatgrad::render::gaussian_3d::backward", "start");

    // I_x / T_x
    let tile_count_x = input.image_size_x.div_ceil(TILE_SIZE_X);
    // I_y / T_y
    let tile_count_y = input.image_size_y.div_ceil(TILE_SIZE_Y);

    validate(input, options, tile_count_x, tile_count_y)?;

    // Launching the kernels

    let outputs_rasterize = kernel::rasterize_backward::main(
        kernel::rasterize_backward::Arguments {
            bucket_count: input.bucket_tile_indices.len() as u32,
            colors_background: input.colors_background,
            image_size_x: input.image_size_x,
            image_size_y: input.image_size_y,
            point_count: input.point_count,
            tile_count_x,
            tile_count_y,
        },
        kernel::rasterize_backward::Inputs {
            bucket_colors_rgb_2d: &input.bucket_colors_rgb_2d,
            bucket_inverse_depths_2d: &input.bucket_inverse_depths_2d,
            bucket_tile_indices: &input.bucket_tile_indices,
            bucket_transmittances: &input.bucket_transmittances,
            colors_rgb_2d: &input.colors_rgb_2d,
            colors_rgb_2d_grad: &input.colors_rgb_2d_grad,
            colors_rgb_3d: &input.colors_rgb_3d,
            conics: &input.conics,
            depths: &input.depths,
            inverse_depths_2d: &input.inverse_depths_2d,
            inverse_depths_2d_grad: &input.inverse_depths_2d_grad,
            opacities_3d_rendered: &input.opacities_3d_rendered,
            point_indices: &input.point_indices,
            point_rendered_counts: &input.point_rendered_counts,
            point_rendered_counts_max: &input.point_rendered_counts_max,
            positions_2d: &input.positions_2d,
            tile_bucket_offsets: &input.tile_bucket_offsets,
            tile_point_ranges: &input.tile_point_ranges,
            transmittances: &input.transmittances,
        },
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "splatgrad::render::gaussian_3d::backward",
        "rasterize_backward",
    );

    let outputs_covariance = kernel::covariance_backward::main(
        kernel::covariance_backward::Arguments {
            antialiasing: options.antialiasing as u32,
            focal_length_x: input.focal_length_x,
            focal_length_y: input.focal_length_y,
            point_count: input.point_count,
            view_bound_x: input.tan_fov_x * (FILTER_LOW_PASS + 1.0),
            view_bound_y: input.tan_fov_y * (FILTER_LOW_PASS + 1.0),
            _padding_1: [0; 2],
            view_transform: input.view_transform,
        },
        kernel::covariance_backward::Inputs {
            conics_grad: &outputs_rasterize.conics_grad,
            covariances_3d: &input.covariances_3d,
            inverse_depths_grad: &outputs_rasterize.inverse_depths_grad,
            opacities_3d: &input.opacities_3d,
            opacities_3d_grad: &outputs_rasterize.opacities_3d_grad,
            positions_3d: &input.positions_3d,
            radii: &input.radii,
        },
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "splatgrad::render::gaussian_3d::backward",
        "covariance_backward",
    );

    let outputs_transform = kernel::transform_backward::main(
        kernel::transform_backward::Arguments {
            colors_sh_degree_max: options.colors_sh_degree_max,
            point_count: input.point_count,
            scale_modifier: options.scale_modifier,
            _padding_1: [0; 1],
            projection_transform: input.projection_transform,
            view_position: input.view_position,
            _padding_2: [0; 1],
        },
        kernel::transform_backward::Inputs {
            colors_dc: &input.colors_dc,
            colors_rgb_3d_grad: &outputs_rasterize.colors_rgb_3d_grad,
            colors_sh: &input.colors_sh,
            covariances_3d_grad: &outputs_covariance.covariances_3d_grad,
            is_colors_rgb_3d_not_clamped: &input
                .is_colors_rgb_3d_not_clamped,
            positions_2d_grad: &outputs_rasterize.positions_2d_grad,
            positions_3d: &input.positions_3d,
            positions_3d_grad: &outputs_covariance.positions_3d_grad,
            radii: &input.radii,
            rotations: &input.rotations,
            scalings: &input.scalings,
        },
    );
    #[cfg(debug_assertions)]
    log::debug!(
        target: "splatgrad::render::gaussian_3d::backward",
        "transform_backward",
    );

    Ok(RenderOutput {
        colors_dc_grad: outputs_transform.colors_dc_grad,
        colors_rgb_3d_grad: outputs_rasterize.colors_rgb_3d_grad,
        colors_sh_grad: outputs_transform.colors_sh_grad,
        conics_grad: outputs_rasterize.conics_grad,
        covariances_3d_grad: outputs_covariance.covariances_3d_grad,
        inverse_depths_grad: outputs_rasterize.inverse_depths_grad,
        opacities_3d_grad: outputs_covariance.opacities_3d_grad,
        positions_2d_grad: outputs_rasterize.positions_2d_grad,
        positions_2d_grad_abs: outputs_rasterize.positions_2d_grad_abs,
        positions_2d_grad_norm: outputs_transform.positions_2d_grad_norm,
        positions_3d_grad: outputs_transform.positions_3d_grad,
        rotations_grad: outputs_transform.rotations_grad,
        scalings_grad: outputs_transform.scalings_grad,
    })
}

fn validate(
    input: &RenderInput,
    options: &Gaussian3dBackwardOptions,
    tile_count_x: u32,
    tile_count_y: u32,
) -> Result<(), Error> {
    let check = |name: &'static str, actual: usize, expected: usize| {
        if actual != expected {
            return Err(Error::BufferSize(name, expected, actual));
        }
        Ok(())
    };

    if options.colors_sh_degree_max > SH_DEGREE_MAX {
        return Err(Error::Validation(
            "colors_sh_degree_max".into(),
            format!("no more than {SH_DEGREE_MAX}"),
        ));
    }
    if input.image_size_x == 0 || input.image_size_y == 0 {
        return Err(Error::Validation(
            "image_size".into(),
            "nonzero".into(),
        ));
    }
    if input.image_size_x as u64 * input.image_size_y as u64
        > PIXEL_COUNT_MAX as u64
    {
        return Err(Error::Validation(
            "pixel count".into(),
            format!("no more than {PIXEL_COUNT_MAX}"),
        ));
    }
    if input.point_count == 0 {
        return Err(Error::Validation(
            "point_count".into(),
            "nonzero".into(),
        ));
    }

    // P
    let point_count = input.point_count as usize;
    // I_y * I_x
    let pixel_count =
        input.image_size_x as usize * input.image_size_y as usize;
    let tile_count = tile_count_x as usize * tile_count_y as usize;
    // B
    let bucket_count = input.bucket_tile_indices.len();
    let bucket_pixel_count = bucket_count * TILE_PIXEL_COUNT as usize;

    check(
        "bucket_colors_rgb_2d",
        input.bucket_colors_rgb_2d.len(),
        bucket_pixel_count * 3,
    )?;
    check(
        "bucket_inverse_depths_2d",
        input.bucket_inverse_depths_2d.len(),
        bucket_pixel_count,
    )?;
    check(
        "bucket_transmittances",
        input.bucket_transmittances.len(),
        bucket_pixel_count,
    )?;
    check("colors_rgb_2d", input.colors_rgb_2d.len(), pixel_count * 3)?;
    check(
        "colors_rgb_2d_grad",
        input.colors_rgb_2d_grad.len(),
        pixel_count * 3,
    )?;
    check("colors_rgb_3d", input.colors_rgb_3d.len(), point_count * 3)?;
    check("conics", input.conics.len(), point_count * 3)?;
    check(
        "covariances_3d",
        input.covariances_3d.len(),
        point_count * 6,
    )?;
    check("depths", input.depths.len(), point_count)?;
    check(
        "inverse_depths_2d",
        input.inverse_depths_2d.len(),
        pixel_count,
    )?;
    check(
        "inverse_depths_2d_grad",
        input.inverse_depths_2d_grad.len(),
        pixel_count,
    )?;
    check(
        "is_colors_rgb_3d_not_clamped",
        input.is_colors_rgb_3d_not_clamped.len(),
        point_count * 3,
    )?;
    check("opacities_3d", input.opacities_3d.len(), point_count)?;
    check(
        "opacities_3d_rendered",
        input.opacities_3d_rendered.len(),
        point_count,
    )?;
    check(
        "point_rendered_counts",
        input.point_rendered_counts.len(),
        pixel_count,
    )?;
    check(
        "point_rendered_counts_max",
        input.point_rendered_counts_max.len(),
        tile_count,
    )?;
    check("positions_2d", input.positions_2d.len(), point_count * 2)?;
    check("positions_3d", input.positions_3d.len(), point_count * 3)?;
    check("radii", input.radii.len(), point_count)?;
    check(
        "tile_bucket_offsets",
        input.tile_bucket_offsets.len(),
        tile_count,
    )?;
    check(
        "tile_point_ranges",
        input.tile_point_ranges.len(),
        tile_count * 2,
    )?;
    check("transmittances", input.transmittances.len(), pixel_count)?;

    // The spherical harmonics path is enabled by buffer presence
    if input.colors_dc.is_empty() != input.colors_sh.is_empty() {
        return Err(Error::Validation(
            "colors_dc and colors_sh".into(),
            "both present or both empty".into(),
        ));
    }
    if !input.colors_dc.is_empty() {
        check("colors_dc", input.colors_dc.len(), point_count * 3)?;
        check("colors_sh", input.colors_sh.len(), point_count * 45)?;
    }

    // The scaling-rotation path is enabled by buffer presence
    if input.scalings.is_empty() != input.rotations.is_empty() {
        return Err(Error::Validation(
            "scalings and rotations".into(),
            "both present or both empty".into(),
        ));
    }
    if !input.scalings.is_empty() {
        check("rotations", input.rotations.len(), point_count * 4)?;
        check("scalings", input.scalings.len(), point_count * 3)?;
    }

    Ok(())
}
