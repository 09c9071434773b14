pub use super::*;

/// Gradients of one point's view-dependent color evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointOutputs {
    /// `[3]`
    pub color_dc_grad: Vec3,
    /// `[15, 3]`
    pub colors_sh_grad: [[f32; 3]; 15],
    /// `[3]`
    ///
    /// The view direction depends on the point's position, so the color
    /// gradient flows back into it. Additive for the caller.
    pub position_3d_grad: Vec3,
}

/// Evaluating the view-dependent color from spherical harmonics, backward.
///
/// Channels clamped to non-negative by the forward evaluation receive zero
/// gradient through `is_color_rgb_3d_not_clamped`.
pub fn point(
    color_rgb_3d_grad: Vec3,
    colors_sh: &[[f32; 3]],
    degree_max: u32,
    is_color_rgb_3d_not_clamped: [f32; 3],
    position_3d: Vec3,
    view_position: Vec3,
) -> PointOutputs {
    let direction_raw = position_3d - view_position;
    let direction = direction_raw / direction_raw.length();
    let (x, y, z) = (direction.x, direction.y, direction.z);

    let color_grad =
        color_rgb_3d_grad * Vec3::from_array(is_color_rgb_3d_not_clamped);
    let sh = |index: usize| Vec3::from_array(colors_sh[index]);

    let mut outputs = PointOutputs {
        color_dc_grad: SH_COEF.0[0] * color_grad,
        ..Default::default()
    };

    // Per-channel partial derivatives of the color against the direction
    let mut color_x_grad = Vec3::ZERO;
    let mut color_y_grad = Vec3::ZERO;
    let mut color_z_grad = Vec3::ZERO;

    if degree_max > 0 {
        outputs.colors_sh_grad[0] = (SH_COEF.1[0] * y * color_grad).to_array();
        outputs.colors_sh_grad[1] = (SH_COEF.1[1] * z * color_grad).to_array();
        outputs.colors_sh_grad[2] = (SH_COEF.1[2] * x * color_grad).to_array();

        color_x_grad = SH_COEF.1[2] * sh(2);
        color_y_grad = SH_COEF.1[0] * sh(0);
        color_z_grad = SH_COEF.1[1] * sh(1);

        if degree_max > 1 {
            let (xx, yy, zz) = (x * x, y * y, z * z);
            let (xy, yz, xz) = (x * y, y * z, x * z);

            outputs.colors_sh_grad[3] =
                (SH_COEF.2[0] * xy * color_grad).to_array();
            outputs.colors_sh_grad[4] =
                (SH_COEF.2[1] * yz * color_grad).to_array();
            outputs.colors_sh_grad[5] =
                (SH_COEF.2[2] * (2.0 * zz - xx - yy) * color_grad).to_array();
            outputs.colors_sh_grad[6] =
                (SH_COEF.2[3] * xz * color_grad).to_array();
            outputs.colors_sh_grad[7] =
                (SH_COEF.2[4] * (xx - yy) * color_grad).to_array();

            color_x_grad += SH_COEF.2[0] * y * sh(3)
                + SH_COEF.2[2] * 2.0 * -x * sh(5)
                + SH_COEF.2[3] * z * sh(6)
                + SH_COEF.2[4] * 2.0 * x * sh(7);
            color_y_grad += SH_COEF.2[0] * x * sh(3)
                + SH_COEF.2[1] * z * sh(4)
                + SH_COEF.2[2] * 2.0 * -y * sh(5)
                + SH_COEF.2[4] * 2.0 * -y * sh(7);
            color_z_grad += SH_COEF.2[1] * y * sh(4)
                + SH_COEF.2[2] * 4.0 * z * sh(5)
                + SH_COEF.2[3] * x * sh(6);

            if degree_max > 2 {
                outputs.colors_sh_grad[8] = (SH_COEF.3[0]
                    * y
                    * (3.0 * xx - yy)
                    * color_grad)
                    .to_array();
                outputs.colors_sh_grad[9] =
                    (SH_COEF.3[1] * xy * z * color_grad).to_array();
                outputs.colors_sh_grad[10] = (SH_COEF.3[2]
                    * y
                    * (4.0 * zz - xx - yy)
                    * color_grad)
                    .to_array();
                outputs.colors_sh_grad[11] = (SH_COEF.3[3]
                    * z
                    * (2.0 * zz - 3.0 * xx - 3.0 * yy)
                    * color_grad)
                    .to_array();
                outputs.colors_sh_grad[12] = (SH_COEF.3[4]
                    * x
                    * (4.0 * zz - xx - yy)
                    * color_grad)
                    .to_array();
                outputs.colors_sh_grad[13] =
                    (SH_COEF.3[5] * z * (xx - yy) * color_grad).to_array();
                outputs.colors_sh_grad[14] = (SH_COEF.3[6]
                    * x
                    * (xx - 3.0 * yy)
                    * color_grad)
                    .to_array();

                color_x_grad += SH_COEF.3[0] * sh(8) * 3.0 * 2.0 * xy
                    + SH_COEF.3[1] * sh(9) * yz
                    + SH_COEF.3[2] * sh(10) * -2.0 * xy
                    + SH_COEF.3[3] * sh(11) * -3.0 * 2.0 * xz
                    + SH_COEF.3[4] * sh(12) * (-3.0 * xx + 4.0 * zz - yy)
                    + SH_COEF.3[5] * sh(13) * 2.0 * xz
                    + SH_COEF.3[6] * sh(14) * 3.0 * (xx - yy);
                color_y_grad += SH_COEF.3[0] * sh(8) * 3.0 * (xx - yy)
                    + SH_COEF.3[1] * sh(9) * xz
                    + SH_COEF.3[2] * sh(10) * (-3.0 * yy + 4.0 * zz - xx)
                    + SH_COEF.3[3] * sh(11) * -3.0 * 2.0 * yz
                    + SH_COEF.3[4] * sh(12) * -2.0 * xy
                    + SH_COEF.3[5] * sh(13) * -2.0 * yz
                    + SH_COEF.3[6] * sh(14) * -3.0 * 2.0 * xy;
                color_z_grad += SH_COEF.3[1] * sh(9) * xy
                    + SH_COEF.3[2] * sh(10) * 4.0 * 2.0 * yz
                    + SH_COEF.3[3] * sh(11) * 3.0 * (2.0 * zz - xx - yy)
                    + SH_COEF.3[4] * sh(12) * 4.0 * 2.0 * xz
                    + SH_COEF.3[5] * sh(13) * (xx - yy);
            }
        }
    }

    let direction_grad = Vec3::new(
        color_x_grad.dot(color_grad),
        color_y_grad.dot(color_grad),
        color_z_grad.dot(color_grad),
    );
    outputs.position_3d_grad =
        normalize_backward(direction_raw, direction_grad);

    outputs
}

/// Backward of `v / |v|` (the unit-vector gradient identity).
fn normalize_backward(
    v: Vec3,
    v_grad: Vec3,
) -> Vec3 {
    let sum_2 = v.length_squared();
    let inverse_sum_3_2 = 1.0 / (sum_2 * sum_2 * sum_2).sqrt();
    Vec3::new(
        (sum_2 - v.x * v.x) * v_grad.x
            - v.y * v.x * v_grad.y
            - v.z * v.x * v_grad.z,
        -v.x * v.y * v_grad.x + (sum_2 - v.y * v.y) * v_grad.y
            - v.z * v.y * v_grad.z,
        -v.x * v.z * v_grad.x - v.y * v.z * v_grad.y
            + (sum_2 - v.z * v.z) * v_grad.z,
    ) * inverse_sum_3_2
}
