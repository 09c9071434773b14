/// `α_max`
pub const ALPHA_MAX: f32 = 0.99;
/// `α_min <- 1 / 255`
///
/// The forward pass skips contributions below this alpha. The backward pass
/// recomputes alpha and applies the same cutoff.
pub const ALPHA_MIN: f32 = 1.0 / 255.0;
/// `B_s`
///
/// The count of consecutive points in one bucket, matched to one lane group.
pub const BUCKET_SIZE: u32 = 32;
pub const PIXEL_COUNT_MAX: u32 = TILE_PIXEL_COUNT * TILE_COUNT_MAX;
pub const TILE_COUNT_MAX: u32 = 1 << 16;
/// `T_x * T_y`
pub const TILE_PIXEL_COUNT: u32 = TILE_SIZE_X * TILE_SIZE_Y;
/// `T_x`
pub const TILE_SIZE_X: u32 = 16;
/// `T_y`
pub const TILE_SIZE_Y: u32 = 16;
/// The forward pass stops compositing a pixel once its transmittance falls
/// below this value.
pub const TRANSMITTANCE_MIN: f32 = 1.0e-4;
