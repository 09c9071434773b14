//! Finite-difference checks of the spherical harmonics backward against the
//! forward evaluation, for degrees 0 to 3.

use super::reference::compare;
use crate::render::gaussian_3d::kernel::spherical_harmonics_backward;
use crate::spherical_harmonics::SH_COEF;
use glam::{DVec3, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, UnitSphere};

/// The forward evaluation in `f64`, on the kernel's own coefficients, without
/// the non-negativity clamp.
fn evaluate_f64(
    color_dc: DVec3,
    colors_sh: &[[f64; 3]; 15],
    degree_max: u32,
    position_3d: DVec3,
    view_position: DVec3,
) -> DVec3 {
    let direction = (position_3d - view_position).normalize();
    let sh = |index: usize| DVec3::from_array(colors_sh[index]);
    let (x, y, z) = (direction.x, direction.y, direction.z);

    let mut color = SH_COEF.0[0] as f64 * color_dc;
    if degree_max > 0 {
        color += SH_COEF.1[0] as f64 * y * sh(0)
            + SH_COEF.1[1] as f64 * z * sh(1)
            + SH_COEF.1[2] as f64 * x * sh(2);
    }
    if degree_max > 1 {
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, yz, xz) = (x * y, y * z, x * z);
        color += SH_COEF.2[0] as f64 * xy * sh(3)
            + SH_COEF.2[1] as f64 * yz * sh(4)
            + SH_COEF.2[2] as f64 * (2.0 * zz - xx - yy) * sh(5)
            + SH_COEF.2[3] as f64 * xz * sh(6)
            + SH_COEF.2[4] as f64 * (xx - yy) * sh(7);
        if degree_max > 2 {
            color += SH_COEF.3[0] as f64 * y * (3.0 * xx - yy) * sh(8)
                + SH_COEF.3[1] as f64 * xy * z * sh(9)
                + SH_COEF.3[2] as f64 * y * (4.0 * zz - xx - yy) * sh(10)
                + SH_COEF.3[3] as f64
                    * z
                    * (2.0 * zz - 3.0 * xx - 3.0 * yy)
                    * sh(11)
                + SH_COEF.3[4] as f64 * x * (4.0 * zz - xx - yy) * sh(12)
                + SH_COEF.3[5] as f64 * z * (xx - yy) * sh(13)
                + SH_COEF.3[6] as f64 * x * (xx - 3.0 * yy) * sh(14);
        }
    }
    color + 0.5
}

#[test]
fn sh_gradients_match_finite_differences_for_all_degrees() {
    let mut rng = StdRng::seed_from_u64(3);

    for degree_max in 0..=3_u32 {
        let color_dc = DVec3::new(1.2, 0.9, 1.5);
        let mut colors_sh = [[0.0_f64; 3]; 15];
        for coefficient in colors_sh.iter_mut() {
            for channel in coefficient.iter_mut() {
                *channel = rng.gen_range(-0.4..0.4);
            }
        }
        let view_position = DVec3::new(0.05, 0.1, -0.2);
        let direction: [f64; 3] = UnitSphere.sample(&mut rng);
        let position_3d =
            view_position + 1.7 * DVec3::from_array(direction);
        let color_grad = DVec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );

        let colors_sh_f32 =
            colors_sh.map(|coefficient| coefficient.map(|c| c as f32));
        let outputs = spherical_harmonics_backward::point(
            Vec3::from_array(color_grad.to_array().map(|g| g as f32)),
            &colors_sh_f32,
            degree_max,
            [1.0; 3],
            Vec3::from_array(position_3d.to_array().map(|p| p as f32)),
            Vec3::from_array(view_position.to_array().map(|p| p as f32)),
        );

        let loss = |color_dc: DVec3,
                    colors_sh: &[[f64; 3]; 15],
                    position_3d: DVec3| {
            evaluate_f64(
                color_dc,
                colors_sh,
                degree_max,
                position_3d,
                view_position,
            )
            .dot(color_grad)
        };
        let step = 1.0e-5;

        // Direct-color coefficient
        let mut color_dc_grad = [0.0_f32; 3];
        for channel in 0..3 {
            let mut offset = DVec3::ZERO;
            offset[channel] = step;
            color_dc_grad[channel] = ((loss(
                color_dc + offset,
                &colors_sh,
                position_3d,
            ) - loss(
                color_dc - offset,
                &colors_sh,
                position_3d,
            )) / (2.0 * step)) as f32;
        }
        compare(
            "color_dc_grad",
            &outputs.color_dc_grad.to_array(),
            &color_dc_grad,
            1.0e-4,
            1.0e-3,
        );

        // Spherical harmonics coefficients, inactive degrees included
        let mut colors_sh_grad = [0.0_f32; 45];
        for coefficient in 0..15 {
            for channel in 0..3 {
                let mut plus = colors_sh;
                plus[coefficient][channel] += step;
                let mut minus = colors_sh;
                minus[coefficient][channel] -= step;
                colors_sh_grad[coefficient * 3 + channel] =
                    ((loss(color_dc, &plus, position_3d)
                        - loss(color_dc, &minus, position_3d))
                        / (2.0 * step)) as f32;
            }
        }
        let outputs_sh_grad: Vec<f32> = outputs
            .colors_sh_grad
            .iter()
            .flatten()
            .copied()
            .collect();
        compare(
            "colors_sh_grad",
            &outputs_sh_grad,
            &colors_sh_grad,
            1.0e-4,
            1.0e-3,
        );

        // Position, through the view-direction normalization
        let mut position_3d_grad = [0.0_f32; 3];
        for axis in 0..3 {
            let mut offset = DVec3::ZERO;
            offset[axis] = step;
            position_3d_grad[axis] = ((loss(
                color_dc,
                &colors_sh,
                position_3d + offset,
            ) - loss(
                color_dc,
                &colors_sh,
                position_3d - offset,
            )) / (2.0 * step)) as f32;
        }
        compare(
            "position_3d_grad",
            &outputs.position_3d_grad.to_array(),
            &position_3d_grad,
            1.0e-4,
            1.0e-3,
        );
    }
}

#[test]
fn clamped_channels_receive_zero_gradient() {
    let colors_sh = [[0.2_f32; 3]; 15];
    let outputs = spherical_harmonics_backward::point(
        Vec3::new(0.9, -0.7, 0.4),
        &colors_sh,
        3,
        [0.0, 1.0, 1.0],
        Vec3::new(0.4, -0.2, 1.0),
        Vec3::ZERO,
    );

    assert_eq!(outputs.color_dc_grad.x, 0.0);
    for coefficient in 0..15 {
        assert_eq!(outputs.colors_sh_grad[coefficient][0], 0.0);
    }
    assert_ne!(outputs.color_dc_grad.y, 0.0);
    assert_ne!(outputs.position_3d_grad, Vec3::ZERO);
}
