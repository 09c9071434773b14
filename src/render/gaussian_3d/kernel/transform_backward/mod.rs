pub use super::*;
pub use bytemuck::{Pod, Zeroable};

use bytemuck::cast_slice;
use rayon::prelude::*;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Arguments {
    /// `(0 ~ 3)`
    pub colors_sh_degree_max: u32,
    /// `P`
    pub point_count: u32,
    pub scale_modifier: f32,
    /// Padding
    pub _padding_1: [u32; 1],
    /// `[3 + 1, 3 + 1]`
    ///
    /// Column-major view-projection transform.
    pub projection_transform: [[f32; 4]; 4],
    /// `[3]`
    pub view_position: [f32; 3],
    /// Padding
    pub _padding_2: [u32; 1],
}

#[derive(Clone, Debug)]
pub struct Inputs<'a> {
    /// `[P, 3]` (empty to disable the spherical harmonics path)
    pub colors_dc: &'a [f32],
    /// `[P, 3]`
    pub colors_rgb_3d_grad: &'a [f32],
    /// `[P, 15, 3]`
    pub colors_sh: &'a [f32],
    /// `[P, 6]`
    pub covariances_3d_grad: &'a [f32],
    /// `[P, 3]`
    pub is_colors_rgb_3d_not_clamped: &'a [f32],
    /// `[P, 2]`
    pub positions_2d_grad: &'a [f32],
    /// `[P, 3]`
    pub positions_3d: &'a [f32],
    /// `[P, 3]`
    ///
    /// The projection-induced part written by the covariance backward.
    pub positions_3d_grad: &'a [f32],
    /// `[P]`
    pub radii: &'a [i32],
    /// `[P, 4]` (empty to disable the scaling-rotation path)
    pub rotations: &'a [f32],
    /// `[P, 3]` (empty to disable the scaling-rotation path)
    pub scalings: &'a [f32],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[P, 3]`
    pub colors_dc_grad: Vec<f32>,
    /// `[P, 15, 3]`
    pub colors_sh_grad: Vec<f32>,
    /// `[P]`
    pub positions_2d_grad_norm: Vec<f32>,
    /// `[P, 3]`
    pub positions_3d_grad: Vec<f32>,
    /// `[P, 4]`
    pub rotations_grad: Vec<f32>,
    /// `[P, 3]`
    pub scalings_grad: Vec<f32>,
}

/// Transforming the points, backward.
///
/// Completes the position gradient through the perspective divide and
/// conditionally runs the spherical harmonics and scaling-rotation
/// backwards. One parallel unit per point; culled points keep zero
/// gradients.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // Specifying the parameters

    let colors_sh_degree_max = arguments.colors_sh_degree_max;
    let has_colors_sh = !inputs.colors_dc.is_empty();
    let has_scalings = !inputs.scalings.is_empty();
    let point_count = arguments.point_count as usize;
    let projection_transform =
        Mat4::from_cols_array_2d(&arguments.projection_transform);
    let scale_modifier = arguments.scale_modifier;
    let view_position = Vec3::from_array(arguments.view_position);

    // [P, 3]
    let colors_rgb_3d_grad: &[[f32; 3]] =
        cast_slice(inputs.colors_rgb_3d_grad);
    // [P, 6]
    let covariances_3d_grad: &[[f32; 6]] =
        cast_slice(inputs.covariances_3d_grad);
    // [P, 3]
    let is_colors_rgb_3d_not_clamped: &[[f32; 3]] =
        cast_slice(inputs.is_colors_rgb_3d_not_clamped);
    // [P, 2]
    let positions_2d_grad: &[[f32; 2]] = cast_slice(inputs.positions_2d_grad);
    // [P, 3]
    let positions_3d: &[[f32; 3]] = cast_slice(inputs.positions_3d);

    let mut colors_dc_grad =
        vec![0.0_f32; if has_colors_sh { point_count * 3 } else { 0 }];
    let mut colors_sh_grad =
        vec![0.0_f32; if has_colors_sh { point_count * 45 } else { 0 }];
    let mut positions_2d_grad_norm = vec![0.0_f32; point_count];
    let mut positions_3d_grad = inputs.positions_3d_grad.to_vec();
    let mut rotations_grad =
        vec![0.0_f32; if has_scalings { point_count * 4 } else { 0 }];
    let mut scalings_grad =
        vec![0.0_f32; if has_scalings { point_count * 3 } else { 0 }];

    positions_3d_grad
        .par_chunks_exact_mut(3)
        .zip(positions_2d_grad_norm.par_iter_mut())
        .enumerate()
        .for_each(|(index, (position_3d_grad, position_2d_grad_norm))| {
            if inputs.radii[index] <= 0 {
                return;
            }

            let position_2d_grad = positions_2d_grad[index];
            *position_2d_grad_norm = (position_2d_grad[0]
                * position_2d_grad[0]
                + position_2d_grad[1] * position_2d_grad[1])
                .sqrt();

            // The screen-space gradient through the perspective divide
            let position_3d = Vec3::from_array(positions_3d[index]);
            let hom = projection_transform * position_3d.extend(1.0);
            let w_inverse = 1.0 / (hom.w + 1.0e-7);
            let mul_1 = hom.x * w_inverse * w_inverse;
            let mul_2 = hom.y * w_inverse * w_inverse;
            let proj = &projection_transform;
            position_3d_grad[0] += (proj.x_axis.x * w_inverse
                - proj.x_axis.w * mul_1)
                * position_2d_grad[0]
                + (proj.x_axis.y * w_inverse - proj.x_axis.w * mul_2)
                    * position_2d_grad[1];
            position_3d_grad[1] += (proj.y_axis.x * w_inverse
                - proj.y_axis.w * mul_1)
                * position_2d_grad[0]
                + (proj.y_axis.y * w_inverse - proj.y_axis.w * mul_2)
                    * position_2d_grad[1];
            position_3d_grad[2] += (proj.z_axis.x * w_inverse
                - proj.z_axis.w * mul_1)
                * position_2d_grad[0]
                + (proj.z_axis.y * w_inverse - proj.z_axis.w * mul_2)
                    * position_2d_grad[1];
        });

    // Gradients from computing colors from spherical harmonics

    if has_colors_sh {
        // [P, 15, 3]
        let colors_sh: &[[[f32; 3]; 15]] = cast_slice(inputs.colors_sh);

        colors_dc_grad
            .par_chunks_exact_mut(3)
            .zip(colors_sh_grad.par_chunks_exact_mut(45))
            .zip(positions_3d_grad.par_chunks_exact_mut(3))
            .enumerate()
            .for_each(
                |(
                    index,
                    ((color_dc_grad, color_sh_grad), position_3d_grad),
                )| {
                    if inputs.radii[index] <= 0 {
                        return;
                    }

                    let outputs = spherical_harmonics_backward::point(
                        Vec3::from_array(colors_rgb_3d_grad[index]),
                        &colors_sh[index],
                        colors_sh_degree_max,
                        is_colors_rgb_3d_not_clamped[index],
                        Vec3::from_array(positions_3d[index]),
                        view_position,
                    );

                    color_dc_grad
                        .copy_from_slice(&outputs.color_dc_grad.to_array());
                    color_sh_grad.copy_from_slice(cast_slice(
                        outputs.colors_sh_grad.as_slice(),
                    ));
                    for axis in 0..3 {
                        position_3d_grad[axis] +=
                            outputs.position_3d_grad[axis];
                    }
                },
            );
    }

    // Gradients from computing covariances from scalings and rotations

    if has_scalings {
        // [P, 4]
        let rotations: &[[f32; 4]] = cast_slice(inputs.rotations);
        // [P, 3]
        let scalings: &[[f32; 3]] = cast_slice(inputs.scalings);

        rotations_grad
            .par_chunks_exact_mut(4)
            .zip(scalings_grad.par_chunks_exact_mut(3))
            .enumerate()
            .for_each(|(index, (rotation_grad, scaling_grad))| {
                if inputs.radii[index] <= 0 {
                    return;
                }

                let outputs = covariance_3d_backward::point(
                    &covariances_3d_grad[index],
                    rotations[index],
                    scale_modifier,
                    scalings[index],
                );

                rotation_grad.copy_from_slice(&outputs.rotation_grad);
                scaling_grad
                    .copy_from_slice(&outputs.scaling_grad.to_array());
            });
    }

    Outputs {
        colors_dc_grad,
        colors_sh_grad,
        positions_2d_grad_norm,
        positions_3d_grad,
        rotations_grad,
        scalings_grad,
    }
}
