pub use super::*;
pub use bytemuck::{Pod, Zeroable};

use bytemuck::cast_slice;
use rayon::prelude::*;

/// `C_f`
///
/// Variance of the low-pass filter added to the projected covariance
/// diagonal.
pub const FILTER_LOW_PASS: f32 = 0.3;
/// Lower clamp on the determinant ratio of the anti-aliasing convolution.
pub const FILTER_RATIO_MIN: f32 = 2.5e-5;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Arguments {
    /// Rescaling the opacity gradient by the square root of the low-pass
    /// determinant ratio when nonzero.
    pub antialiasing: u32,
    /// `f_x <- I_x / tan(Fov_x / 2) / 2`
    pub focal_length_x: f32,
    /// `f_y <- I_y / tan(Fov_y / 2) / 2`
    pub focal_length_y: f32,
    /// `P`
    pub point_count: u32,
    /// `tan(Fov_x / 2) * (C_f + 1)`
    pub view_bound_x: f32,
    /// `tan(Fov_y / 2) * (C_f + 1)`
    pub view_bound_y: f32,
    /// Padding
    pub _padding_1: [u32; 2],
    /// `[3 + 1, 3 + 1]`
    pub view_transform: [[f32; 4]; 4],
}

#[derive(Clone, Debug)]
pub struct Inputs<'a> {
    /// `[P, 3]`
    pub conics_grad: &'a [f32],
    /// `[P, 6]`
    pub covariances_3d: &'a [f32],
    /// `[P]`
    pub inverse_depths_grad: &'a [f32],
    /// `[P]`
    pub opacities_3d: &'a [f32],
    /// `[P]`
    pub opacities_3d_grad: &'a [f32],
    /// `[P, 3]`
    pub positions_3d: &'a [f32],
    /// `[P]`
    pub radii: &'a [i32],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[P, 6]`
    pub covariances_3d_grad: Vec<f32>,
    /// `[P]`
    pub opacities_3d_grad: Vec<f32>,
    /// `[P, 3]`
    ///
    /// The projection-induced part only. This kernel is the pipeline's
    /// first writer of the position gradient.
    pub positions_3d_grad: Vec<f32>,
}

/// Projecting the 3D covariances onto the image plane, backward.
///
/// One parallel unit per point. Culled points (non-positive radius) keep
/// zero gradients.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // Specifying the parameters

    let antialiasing = arguments.antialiasing != 0;
    let focal_length_x = arguments.focal_length_x;
    let focal_length_y = arguments.focal_length_y;
    let point_count = arguments.point_count as usize;
    let view_bound_x = arguments.view_bound_x;
    let view_bound_y = arguments.view_bound_y;
    let view_transform = Mat4::from_cols_array_2d(&arguments.view_transform);
    let view_rotation = Mat3::from_mat4(view_transform);
    // The camera rotation rows, as used by the forward projection
    let w = view_rotation.transpose();

    // [P, 3]
    let conics_grad: &[[f32; 3]] = cast_slice(inputs.conics_grad);
    // [P, 6]
    let covariances_3d: &[[f32; 6]] = cast_slice(inputs.covariances_3d);
    // [P, 3]
    let positions_3d: &[[f32; 3]] = cast_slice(inputs.positions_3d);

    let mut covariances_3d_grad = vec![0.0_f32; point_count * 6];
    let mut opacities_3d_grad = inputs.opacities_3d_grad.to_vec();
    let mut positions_3d_grad = vec![0.0_f32; point_count * 3];

    covariances_3d_grad
        .par_chunks_exact_mut(6)
        .zip(positions_3d_grad.par_chunks_exact_mut(3))
        .zip(opacities_3d_grad.par_iter_mut())
        .enumerate()
        .for_each(
            |(index, ((covariance_3d_grad, position_3d_grad), opacity_3d_grad))| {
                if inputs.radii[index] <= 0 {
                    return;
                }

                // Recomputing the projected covariance as in the forward pass

                let position_3d = Vec3::from_array(positions_3d[index]);
                let mut t = view_transform.transform_point3(position_3d);
                let t_x_z = t.x / t.z;
                let t_y_z = t.y / t.z;
                // The clamp masks forward and backward identically
                let x_grad_mul =
                    if t_x_z < -view_bound_x || t_x_z > view_bound_x {
                        0.0
                    } else {
                        1.0
                    };
                let y_grad_mul =
                    if t_y_z < -view_bound_y || t_y_z > view_bound_y {
                        0.0
                    } else {
                        1.0
                    };
                t.x = t_x_z.clamp(-view_bound_x, view_bound_x) * t.z;
                t.y = t_y_z.clamp(-view_bound_y, view_bound_y) * t.z;

                let j = Mat3::from_cols(
                    Vec3::new(
                        focal_length_x / t.z,
                        0.0,
                        -(focal_length_x * t.x) / (t.z * t.z),
                    ),
                    Vec3::new(
                        0.0,
                        focal_length_y / t.z,
                        -(focal_length_y * t.y) / (t.z * t.z),
                    ),
                    Vec3::ZERO,
                );
                let t_mat = w * j;

                let covariance_3d = covariances_3d[index];
                let vrk = Mat3::from_cols(
                    Vec3::new(
                        covariance_3d[0],
                        covariance_3d[1],
                        covariance_3d[2],
                    ),
                    Vec3::new(
                        covariance_3d[1],
                        covariance_3d[3],
                        covariance_3d[4],
                    ),
                    Vec3::new(
                        covariance_3d[2],
                        covariance_3d[4],
                        covariance_3d[5],
                    ),
                );
                let covariance_2d =
                    t_mat.transpose() * vrk.transpose() * t_mat;

                let mut c_xx = covariance_2d.x_axis.x;
                let c_xy = covariance_2d.x_axis.y;
                let mut c_yy = covariance_2d.y_axis.y;
                let determinant_raw = c_xx * c_yy - c_xy * c_xy;
                c_xx += FILTER_LOW_PASS;
                c_yy += FILTER_LOW_PASS;
                let determinant = c_xx * c_yy - c_xy * c_xy;

                // The opacity gradient arrived with respect to the rendered
                // (convolved) opacity; rescale it back to the raw opacity
                // and push the scaling's own derivative into the covariance.
                let mut ratio_grad = 0.0;
                if antialiasing {
                    let ratio = determinant_raw / determinant;
                    let scaling = ratio.max(FILTER_RATIO_MIN).sqrt();
                    let scaling_grad =
                        *opacity_3d_grad * inputs.opacities_3d[index];
                    *opacity_3d_grad *= scaling;
                    ratio_grad = if ratio <= FILTER_RATIO_MIN {
                        0.0
                    } else {
                        scaling_grad / (2.0 * scaling)
                    };
                }

                // Inverting the regularized covariance into the conic,
                // backward. A singular regularized covariance yields zero
                // covariance gradients; the inverse-depth term below still
                // applies.
                let mut c_xx_grad = 0.0;
                let mut c_xy_grad = 0.0;
                let mut c_yy_grad = 0.0;
                if determinant != 0.0 {
                    let determinant_2_inverse =
                        1.0 / (determinant * determinant + 1.0e-7);

                    let conic_grad = conics_grad[index];
                    c_xx_grad = determinant_2_inverse
                        * (-c_yy * c_yy * conic_grad[0]
                            + 2.0 * c_xy * c_yy * conic_grad[1]
                            + (determinant - c_xx * c_yy) * conic_grad[2]);
                    c_yy_grad = determinant_2_inverse
                        * (-c_xx * c_xx * conic_grad[2]
                            + 2.0 * c_xx * c_xy * conic_grad[1]
                            + (determinant - c_xx * c_yy) * conic_grad[0]);
                    c_xy_grad = determinant_2_inverse
                        * 2.0
                        * (c_xy * c_yy * conic_grad[0]
                            - (determinant + 2.0 * c_xy * c_xy)
                                * conic_grad[1]
                            + c_xx * c_xy * conic_grad[2]);

                    // Quotient rule over the determinant ratio; the raw
                    // determinant reads the pre-filter diagonal.
                    c_xx_grad += ratio_grad
                        * determinant_2_inverse
                        * ((c_yy - FILTER_LOW_PASS) * determinant
                            - determinant_raw * c_yy);
                    c_yy_grad += ratio_grad
                        * determinant_2_inverse
                        * ((c_xx - FILTER_LOW_PASS) * determinant
                            - determinant_raw * c_xx);
                    c_xy_grad += ratio_grad
                        * determinant_2_inverse
                        * (2.0 * c_xy * (determinant_raw - determinant));
                }

                // Gradients of the six 3D covariance entries. Off-diagonal
                // entries are used twice by the bilinear form, hence the
                // doubled terms.
                let t00 = t_mat.x_axis.x;
                let t01 = t_mat.x_axis.y;
                let t02 = t_mat.x_axis.z;
                let t10 = t_mat.y_axis.x;
                let t11 = t_mat.y_axis.y;
                let t12 = t_mat.y_axis.z;
                covariance_3d_grad[0] = t00 * t00 * c_xx_grad
                    + t00 * t10 * c_xy_grad
                    + t10 * t10 * c_yy_grad;
                covariance_3d_grad[3] = t01 * t01 * c_xx_grad
                    + t01 * t11 * c_xy_grad
                    + t11 * t11 * c_yy_grad;
                covariance_3d_grad[5] = t02 * t02 * c_xx_grad
                    + t02 * t12 * c_xy_grad
                    + t12 * t12 * c_yy_grad;
                covariance_3d_grad[1] = 2.0 * t00 * t01 * c_xx_grad
                    + (t00 * t11 + t01 * t10) * c_xy_grad
                    + 2.0 * t10 * t11 * c_yy_grad;
                covariance_3d_grad[2] = 2.0 * t00 * t02 * c_xx_grad
                    + (t00 * t12 + t02 * t10) * c_xy_grad
                    + 2.0 * t10 * t12 * c_yy_grad;
                covariance_3d_grad[4] = 2.0 * t02 * t01 * c_xx_grad
                    + (t01 * t12 + t02 * t11) * c_xy_grad
                    + 2.0 * t11 * t12 * c_yy_grad;

                // Back through T = W * J to the camera-space position

                let tv0 = t_mat.x_axis.dot(vrk.x_axis);
                let tv1 = t_mat.x_axis.dot(vrk.y_axis);
                let tv2 = t_mat.x_axis.dot(vrk.z_axis);
                let uv0 = t_mat.y_axis.dot(vrk.x_axis);
                let uv1 = t_mat.y_axis.dot(vrk.y_axis);
                let uv2 = t_mat.y_axis.dot(vrk.z_axis);
                let t_row_0_grad = Vec3::new(
                    2.0 * tv0 * c_xx_grad + uv0 * c_xy_grad,
                    2.0 * tv1 * c_xx_grad + uv1 * c_xy_grad,
                    2.0 * tv2 * c_xx_grad + uv2 * c_xy_grad,
                );
                let t_row_1_grad = Vec3::new(
                    2.0 * uv0 * c_yy_grad + tv0 * c_xy_grad,
                    2.0 * uv1 * c_yy_grad + tv1 * c_xy_grad,
                    2.0 * uv2 * c_yy_grad + tv2 * c_xy_grad,
                );

                let j00_grad = w.x_axis.dot(t_row_0_grad);
                let j02_grad = w.z_axis.dot(t_row_0_grad);
                let j11_grad = w.y_axis.dot(t_row_1_grad);
                let j12_grad = w.z_axis.dot(t_row_1_grad);

                let t_z_inverse = 1.0 / t.z;
                let t_z_inverse_2 = t_z_inverse * t_z_inverse;
                let t_z_inverse_3 = t_z_inverse_2 * t_z_inverse;
                let mut t_grad = Vec3::new(
                    x_grad_mul
                        * -focal_length_x
                        * t_z_inverse_2
                        * j02_grad,
                    y_grad_mul
                        * -focal_length_y
                        * t_z_inverse_2
                        * j12_grad,
                    -focal_length_x * t_z_inverse_2 * j00_grad
                        - focal_length_y * t_z_inverse_2 * j11_grad
                        + 2.0
                            * focal_length_x
                            * t.x
                            * t_z_inverse_3
                            * j02_grad
                        + 2.0
                            * focal_length_y
                            * t.y
                            * t_z_inverse_3
                            * j12_grad,
                );
                // The inverse-depth loss term enters through the camera z
                t_grad.z +=
                    -t_z_inverse_2 * inputs.inverse_depths_grad[index];

                let position_3d_grad_value =
                    view_rotation.transpose() * t_grad;
                position_3d_grad
                    .copy_from_slice(&position_3d_grad_value.to_array());
            },
        );

    Outputs {
        covariances_3d_grad,
        opacities_3d_grad,
        positions_3d_grad,
    }
}
