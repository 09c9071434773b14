pub use super::*;

/// Gradients of one point's scale-rotation covariance construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointOutputs {
    /// `[4] <- (r, x, y, z)`
    ///
    /// With respect to the unnormalized quaternion; not projected onto the
    /// unit-quaternion tangent space.
    pub rotation_grad: [f32; 4],
    /// `[3]`
    pub scaling_grad: Vec3,
}

/// Building the 3D covariance from scaling and rotation, backward.
pub fn point(
    covariance_3d_grad: &[f32; 6],
    rotation: [f32; 4],
    scale_modifier: f32,
    scaling: [f32; 3],
) -> PointOutputs {
    // Recomputing the intermediates of the covariance construction
    let [r, x, y, z] = rotation;
    let r_mat = Mat3::from_cols(
        Vec3::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - r * z),
            2.0 * (x * z + r * y),
        ),
        Vec3::new(
            2.0 * (x * y + r * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - r * x),
        ),
        Vec3::new(
            2.0 * (x * z - r * y),
            2.0 * (y * z + r * x),
            1.0 - 2.0 * (x * x + y * y),
        ),
    );
    let s = scale_modifier * Vec3::from_array(scaling);
    let m = Mat3::from_diagonal(s) * r_mat;

    // The six stored entries to full matrix form. Off-diagonal entries
    // appear once in storage but twice in the quadratic form, hence the
    // half weights.
    let sigma_grad = Mat3::from_cols(
        Vec3::new(
            covariance_3d_grad[0],
            0.5 * covariance_3d_grad[1],
            0.5 * covariance_3d_grad[2],
        ),
        Vec3::new(
            0.5 * covariance_3d_grad[1],
            covariance_3d_grad[3],
            0.5 * covariance_3d_grad[4],
        ),
        Vec3::new(
            0.5 * covariance_3d_grad[2],
            0.5 * covariance_3d_grad[4],
            covariance_3d_grad[5],
        ),
    );

    // Σ = Mᵗ M
    let m_grad = (m * sigma_grad) * 2.0;

    let r_mat_t = r_mat.transpose();
    let mut m_grad_t = m_grad.transpose();

    let scaling_grad = Vec3::new(
        r_mat_t.x_axis.dot(m_grad_t.x_axis),
        r_mat_t.y_axis.dot(m_grad_t.y_axis),
        r_mat_t.z_axis.dot(m_grad_t.z_axis),
    );

    m_grad_t.x_axis *= s.x;
    m_grad_t.y_axis *= s.y;
    m_grad_t.z_axis *= s.z;

    // Analytic Jacobian of the quaternion-to-rotation map
    let rotation_grad = [
        2.0 * z * (m_grad_t.x_axis.y - m_grad_t.y_axis.x)
            + 2.0 * y * (m_grad_t.z_axis.x - m_grad_t.x_axis.z)
            + 2.0 * x * (m_grad_t.y_axis.z - m_grad_t.z_axis.y),
        2.0 * y * (m_grad_t.y_axis.x + m_grad_t.x_axis.y)
            + 2.0 * z * (m_grad_t.z_axis.x + m_grad_t.x_axis.z)
            + 2.0 * r * (m_grad_t.y_axis.z - m_grad_t.z_axis.y)
            - 4.0 * x * (m_grad_t.z_axis.z + m_grad_t.y_axis.y),
        2.0 * x * (m_grad_t.y_axis.x + m_grad_t.x_axis.y)
            + 2.0 * r * (m_grad_t.z_axis.x - m_grad_t.x_axis.z)
            + 2.0 * z * (m_grad_t.y_axis.z + m_grad_t.z_axis.y)
            - 4.0 * y * (m_grad_t.z_axis.z + m_grad_t.x_axis.x),
        2.0 * r * (m_grad_t.y_axis.x - m_grad_t.x_axis.y)
            + 2.0 * x * (m_grad_t.z_axis.x + m_grad_t.x_axis.z)
            + 2.0 * y * (m_grad_t.y_axis.z + m_grad_t.z_axis.y)
            - 4.0 * z * (m_grad_t.y_axis.y + m_grad_t.x_axis.x),
    ];

    PointOutputs {
        rotation_grad,
        scaling_grad,
    }
}
