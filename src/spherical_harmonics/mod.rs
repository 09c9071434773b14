pub use crate::preset::spherical_harmonics::{SH_COUNT_MAX, SH_DEGREE_MAX};

use glam::Vec3;
use std::{f32::consts::PI, sync::LazyLock};

/// The real coefficients of orthonormalized spherical harmonics from degree 0 to 3
///
/// `([f32; 1], [f32; 3], [f32; 5], [f32; 7])`
#[allow(clippy::type_complexity)]
pub static SH_COEF: LazyLock<([f32; 1], [f32; 3], [f32; 5], [f32; 7])> =
    LazyLock::new(|| {
        (
            [(1.0 / 4.0 / PI).sqrt()],
            [
                -(3.0 / 4.0 / PI).sqrt(),
                (3.0 / 4.0 / PI).sqrt(),
                -(3.0 / 4.0 / PI).sqrt(),
            ],
            [
                (15.0 / 4.0 / PI).sqrt(),
                -(15.0 / 4.0 / PI).sqrt(),
                (5.0 / 16.0 / PI).sqrt(),
                -(15.0 / 4.0 / PI).sqrt(),
                (15.0 / 16.0 / PI).sqrt(),
            ],
            [
                -(35.0 / 32.0 / PI).sqrt(),
                (105.0 / 4.0 / PI).sqrt(),
                -(21.0 / 32.0 / PI).sqrt(),
                (7.0 / 16.0 / PI).sqrt(),
                -(21.0 / 32.0 / PI).sqrt(),
                (105.0 / 16.0 / PI).sqrt(),
                -(35.0 / 32.0 / PI).sqrt(),
            ],
        )
    });

/// Evaluating the view-dependent color from spherical harmonics.
///
/// ## Arguments
///
/// * `color_dc` - The direct-color coefficient triple.
/// * `colors_sh` - `[15, 3]`. Coefficient triples for degrees 1 to 3.
/// * `degree_max` - `(0 ~ 3)`
/// * `direction` - The unit view direction.
///
/// ## Returns
///
/// The clamped RGB color and a per-channel mask which is `0.0` where the
/// unclamped color was negative. The backward pass applies the mask to the
/// upstream color gradient.
pub fn evaluate(
    color_dc: Vec3,
    colors_sh: &[[f32; 3]],
    degree_max: u32,
    direction: Vec3,
) -> (Vec3, [f32; 3]) {
    let sh = |index: usize| Vec3::from_array(colors_sh[index]);
    let (x, y, z) = (direction.x, direction.y, direction.z);

    let mut color = SH_COEF.0[0] * color_dc;
    if degree_max > 0 {
        color += SH_COEF.1[0] * y * sh(0)
            + SH_COEF.1[1] * z * sh(1)
            + SH_COEF.1[2] * x * sh(2);
    }
    if degree_max > 1 {
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, yz, xz) = (x * y, y * z, x * z);
        color += SH_COEF.2[0] * xy * sh(3)
            + SH_COEF.2[1] * yz * sh(4)
            + SH_COEF.2[2] * (2.0 * zz - xx - yy) * sh(5)
            + SH_COEF.2[3] * xz * sh(6)
            + SH_COEF.2[4] * (xx - yy) * sh(7);
        if degree_max > 2 {
            color += SH_COEF.3[0] * y * (3.0 * xx - yy) * sh(8)
                + SH_COEF.3[1] * xy * z * sh(9)
                + SH_COEF.3[2] * y * (4.0 * zz - xx - yy) * sh(10)
                + SH_COEF.3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy) * sh(11)
                + SH_COEF.3[4] * x * (4.0 * zz - xx - yy) * sh(12)
                + SH_COEF.3[5] * z * (xx - yy) * sh(13)
                + SH_COEF.3[6] * x * (xx - 3.0 * yy) * sh(14);
        }
    }
    color += 0.5;

    let is_not_clamped =
        color.to_array().map(|c| if c >= 0.0 { 1.0 } else { 0.0 });

    (color.max(Vec3::ZERO), is_not_clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_degree_0_is_direct_color_only() {
        let color_dc = Vec3::new(0.3, -0.1, 0.8);
        let (color, is_not_clamped) =
            evaluate(color_dc, &[[0.0; 3]; 15], 0, Vec3::Z);

        let expected = SH_COEF.0[0] * color_dc + 0.5;
        assert!((color - expected).abs().max_element() < 1e-7);
        assert_eq!(is_not_clamped, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn evaluate_clamps_negative_channels() {
        let color_dc = Vec3::new(-9.0, 0.0, 0.0);
        let (color, is_not_clamped) =
            evaluate(color_dc, &[[0.0; 3]; 15], 3, Vec3::X);

        assert_eq!(color.x, 0.0);
        assert_eq!(is_not_clamped[0], 0.0);
        assert_eq!(is_not_clamped[1], 1.0);
        assert_eq!(is_not_clamped[2], 1.0);
    }
}
