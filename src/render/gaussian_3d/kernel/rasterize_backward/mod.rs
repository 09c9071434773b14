pub use super::*;
pub use bytemuck::{Pod, Zeroable};

use bytemuck::cast_slice;
use rayon::prelude::*;

/// `B_s`
pub const LANE_COUNT: usize = BUCKET_SIZE as usize;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Arguments {
    /// `B`
    pub bucket_count: u32,
    /// `[3]`
    pub colors_background: [f32; 3],
    /// `I_x`
    pub image_size_x: u32,
    /// `I_y`
    pub image_size_y: u32,
    /// `P`
    pub point_count: u32,
    /// `I_x / T_x`
    pub tile_count_x: u32,
    /// `I_y / T_y`
    pub tile_count_y: u32,
}

#[derive(Clone, Debug)]
pub struct Inputs<'a> {
    /// `[B, T_x * T_y, 3]`
    pub bucket_colors_rgb_2d: &'a [f32],
    /// `[B, T_x * T_y]`
    pub bucket_inverse_depths_2d: &'a [f32],
    /// `[B]`
    pub bucket_tile_indices: &'a [u32],
    /// `[B, T_x * T_y]`
    pub bucket_transmittances: &'a [f32],
    /// `[I_y, I_x, 3]`
    pub colors_rgb_2d: &'a [f32],
    /// `[I_y, I_x, 3]`
    pub colors_rgb_2d_grad: &'a [f32],
    /// `[P, 3]`
    pub colors_rgb_3d: &'a [f32],
    /// `[P, 3]`
    pub conics: &'a [f32],
    /// `[P]`
    pub depths: &'a [f32],
    /// `[I_y, I_x]`
    pub inverse_depths_2d: &'a [f32],
    /// `[I_y, I_x]`
    pub inverse_depths_2d_grad: &'a [f32],
    /// `[P]`
    pub opacities_3d_rendered: &'a [f32],
    /// `[T]`
    pub point_indices: &'a [u32],
    /// `[I_y, I_x]`
    pub point_rendered_counts: &'a [u32],
    /// `[I_y / T_y * I_x / T_x]`
    pub point_rendered_counts_max: &'a [u32],
    /// `[P, 2]`
    pub positions_2d: &'a [f32],
    /// `[I_y / T_y * I_x / T_x]`
    pub tile_bucket_offsets: &'a [u32],
    /// `[I_y / T_y * I_x / T_x, 2]`
    pub tile_point_ranges: &'a [u32],
    /// `[I_y, I_x]`
    pub transmittances: &'a [f32],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[P, 3]`
    pub colors_rgb_3d_grad: Vec<f32>,
    /// `[P, 3]`
    pub conics_grad: Vec<f32>,
    /// `[P]`
    pub inverse_depths_grad: Vec<f32>,
    /// `[P]`
    pub opacities_3d_grad: Vec<f32>,
    /// `[P, 2]`
    pub positions_2d_grad: Vec<f32>,
    /// `[P, 2]`
    pub positions_2d_grad_abs: Vec<f32>,
}

/// Running compositing state for one pixel, reconstructed from the bucket's
/// checkpoint and carried from lane to lane.
///
/// `colors_rgb` and `inverse_depth` hold the accumulation so far minus the
/// pixel's final composited output, so a bucket never needs state from
/// buckets beyond itself.
#[derive(Clone, Copy, Debug, Default)]
struct PixelState {
    colors_rgb: [f32; 3],
    inverse_depth: f32,
    transmittance: f32,
}

/// Rasterizing the points to the image, backward.
///
/// One lane group of [`LANE_COUNT`] lanes per bucket; lane `k` owns the
/// bucket's point `k` for the whole traversal. An outer loop of
/// `T_x * T_y + B_s - 1` steps drains the tile's pixels through the lanes in
/// diagonal-wavefront order, shifting each pixel's running state one lane
/// forward per step.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // Specifying the parameters

    let bucket_count = arguments.bucket_count as usize;
    let image_size_x = arguments.image_size_x as usize;
    let image_size_y = arguments.image_size_y as usize;
    let pixel_count_in_tile = TILE_PIXEL_COUNT as usize;
    let point_count = arguments.point_count as usize;
    let tile_count_x = arguments.tile_count_x as usize;
    let tile_size_x = TILE_SIZE_X as usize;

    // [B, T_x * T_y, 3]
    let bucket_colors_rgb_2d: &[[f32; 3]] =
        cast_slice(inputs.bucket_colors_rgb_2d);
    // [I_y, I_x, 3]
    let colors_rgb_2d: &[[f32; 3]] = cast_slice(inputs.colors_rgb_2d);
    // [I_y, I_x, 3]
    let colors_rgb_2d_grad: &[[f32; 3]] = cast_slice(inputs.colors_rgb_2d_grad);
    // [P, 3]
    let colors_rgb_3d: &[[f32; 3]] = cast_slice(inputs.colors_rgb_3d);
    // [P, 3]
    let conics: &[[f32; 3]] = cast_slice(inputs.conics);
    // [P, 2]
    let positions_2d: &[[f32; 2]] = cast_slice(inputs.positions_2d);
    // [I_y / T_y * I_x / T_x, 2]
    let tile_point_ranges: &[[u32; 2]] = cast_slice(inputs.tile_point_ranges);

    let colors_rgb_3d_grad = GradientBuffer::zeros(point_count * 3);
    let conics_grad = GradientBuffer::zeros(point_count * 3);
    let inverse_depths_grad = GradientBuffer::zeros(point_count);
    let opacities_3d_grad = GradientBuffer::zeros(point_count);
    let positions_2d_grad = GradientBuffer::zeros(point_count * 2);
    let positions_2d_grad_abs = GradientBuffer::zeros(point_count * 2);

    // Launching one lane group per bucket

    (0..bucket_count).into_par_iter().for_each(|bucket_index| {
        let tile_index = inputs.bucket_tile_indices[bucket_index] as usize;
        let bucket_local =
            bucket_index - inputs.tile_bucket_offsets[tile_index] as usize;
        // Index of the bucket's first point within the tile's sorted range
        let bucket_first = bucket_local * LANE_COUNT;

        // No pixel of this tile has a contributor at or beyond this bucket
        if bucket_first as u32 >= inputs.point_rendered_counts_max[tile_index]
        {
            return;
        }

        let range = tile_point_ranges[tile_index];
        let pixel_min_x = tile_index % tile_count_x * tile_size_x;
        let pixel_min_y =
            tile_index / tile_count_x * TILE_SIZE_Y as usize;

        // Fetching the lane-owned point data once

        let mut lane_colors_rgb = [[0.0_f32; 3]; LANE_COUNT];
        let mut lane_conics = [[0.0_f32; 3]; LANE_COUNT];
        let mut active_lane_count = 0;
        let mut lane_inverse_depths = [0.0_f32; LANE_COUNT];
        let mut lane_opacities = [0.0_f32; LANE_COUNT];
        let mut lane_points = [0_usize; LANE_COUNT];
        let mut lane_positions_2d = [[0.0_f32; 2]; LANE_COUNT];
        for lane in 0..LANE_COUNT {
            let range_index = range[0] as usize + bucket_first + lane;
            if range_index >= range[1] as usize {
                break;
            }
            let point = inputs.point_indices[range_index] as usize;
            lane_colors_rgb[lane] = colors_rgb_3d[point];
            lane_conics[lane] = conics[point];
            lane_inverse_depths[lane] = 1.0 / inputs.depths[point];
            lane_opacities[lane] = inputs.opacities_3d_rendered[point];
            lane_points[lane] = point;
            lane_positions_2d[lane] = positions_2d[point];
            active_lane_count = lane + 1;
        }

        // Per-lane gradient registers, flushed once after the outer loop

        let mut colors_rgb_3d_acc = [[0.0_f32; 3]; LANE_COUNT];
        let mut conics_acc = [[0.0_f32; 3]; LANE_COUNT];
        let mut inverse_depths_acc = [0.0_f32; LANE_COUNT];
        let mut opacities_acc = [0.0_f32; LANE_COUNT];
        let mut positions_2d_abs_acc = [[0.0_f32; 2]; LANE_COUNT];
        let mut positions_2d_acc = [[0.0_f32; 2]; LANE_COUNT];

        let mut states = [PixelState::default(); LANE_COUNT];

        for step in 0..pixel_count_in_tile + LANE_COUNT - 1 {
            // Shift by one: lane k inherits the state lane k - 1 advanced
            // for the same pixel one step earlier.
            for lane in (1..LANE_COUNT).rev() {
                states[lane] = states[lane - 1];
            }

            // Pixel `step` enters the pipeline at lane 0 with the state
            // reconstructed from this bucket's own checkpoint.
            if step < pixel_count_in_tile {
                let pixel_x = pixel_min_x + step % tile_size_x;
                let pixel_y = pixel_min_y + step / tile_size_x;
                states[0] = if pixel_x < image_size_x && pixel_y < image_size_y
                {
                    let checkpoint =
                        bucket_index * pixel_count_in_tile + step;
                    let pixel = pixel_y * image_size_x + pixel_x;
                    let mut state = PixelState {
                        colors_rgb: bucket_colors_rgb_2d[checkpoint],
                        inverse_depth: inputs.bucket_inverse_depths_2d
                            [checkpoint],
                        transmittance: inputs.bucket_transmittances
                            [checkpoint],
                    };
                    for channel in 0..3 {
                        state.colors_rgb[channel] -=
                            colors_rgb_2d[pixel][channel];
                    }
                    state.inverse_depth -= inputs.inverse_depths_2d[pixel];
                    state
                } else {
                    PixelState::default()
                };
            }

            for lane in 0..active_lane_count {
                let Some(pixel_in_tile) = step.checked_sub(lane) else {
                    break;
                };
                if pixel_in_tile >= pixel_count_in_tile {
                    continue;
                }
                let pixel_x = pixel_min_x + pixel_in_tile % tile_size_x;
                let pixel_y = pixel_min_y + pixel_in_tile / tile_size_x;
                if pixel_x >= image_size_x || pixel_y >= image_size_y {
                    continue;
                }
                let pixel = pixel_y * image_size_x + pixel_x;

                // This point never contributed to this pixel
                let contribution = (bucket_first + lane) as u32;
                let rendered_count = inputs.point_rendered_counts[pixel];
                if contribution >= rendered_count {
                    continue;
                }

                // Recompute the footprint exactly as the forward pass did
                let conic = lane_conics[lane];
                let d_x = lane_positions_2d[lane][0] - pixel_x as f32;
                let d_y = lane_positions_2d[lane][1] - pixel_y as f32;
                let power = -0.5
                    * (conic[0] * d_x * d_x + conic[2] * d_y * d_y)
                    - conic[1] * d_x * d_y;
                if power > 0.0 {
                    continue;
                }
                let footprint = power.exp();
                let alpha = (lane_opacities[lane] * footprint).min(ALPHA_MAX);
                if alpha < ALPHA_MIN {
                    continue;
                }

                let state = &mut states[lane];
                let transmittance = state.transmittance;
                let weight = alpha * transmittance;
                let one_minus_alpha = 1.0 - alpha;

                let color_rgb = lane_colors_rgb[lane];
                let color_rgb_2d_grad = colors_rgb_2d_grad[pixel];
                let inverse_depth_2d_grad =
                    inputs.inverse_depths_2d_grad[pixel];

                // The color already composited behind this point equals the
                // negative running accumulation, scaled by 1 / (1 - α).
                let mut alpha_grad = 0.0;
                for channel in 0..3 {
                    state.colors_rgb[channel] +=
                        color_rgb[channel] * weight;
                    colors_rgb_3d_acc[lane][channel] +=
                        weight * color_rgb_2d_grad[channel];
                    alpha_grad += (color_rgb[channel] * transmittance
                        + state.colors_rgb[channel] / one_minus_alpha)
                        * color_rgb_2d_grad[channel];
                }
                let inverse_depth = lane_inverse_depths[lane];
                state.inverse_depth += inverse_depth * weight;
                inverse_depths_acc[lane] += weight * inverse_depth_2d_grad;
                alpha_grad += (inverse_depth * transmittance
                    + state.inverse_depth / one_minus_alpha)
                    * inverse_depth_2d_grad;

                // The pixel's last contributor also gates how much
                // background the final transmittance lets through.
                if contribution + 1 == rendered_count {
                    let mut background_grad = 0.0;
                    for channel in 0..3 {
                        background_grad += arguments.colors_background
                            [channel]
                            * color_rgb_2d_grad[channel];
                    }
                    alpha_grad += -inputs.transmittances[pixel]
                        / one_minus_alpha
                        * background_grad;
                }

                state.transmittance = transmittance * one_minus_alpha;

                let footprint_grad = lane_opacities[lane] * alpha_grad;
                opacities_acc[lane] += footprint * alpha_grad;

                let fd_x = footprint * d_x;
                let fd_y = footprint * d_y;
                let d_x_grad =
                    (-fd_x * conic[0] - fd_y * conic[1]) * footprint_grad;
                let d_y_grad =
                    (-fd_y * conic[2] - fd_x * conic[1]) * footprint_grad;

                // Mean gradients are expressed in normalized device
                // coordinates.
                let position_2d_grad_x =
                    d_x_grad * 0.5 * arguments.image_size_x as f32;
                let position_2d_grad_y =
                    d_y_grad * 0.5 * arguments.image_size_y as f32;
                positions_2d_acc[lane][0] += position_2d_grad_x;
                positions_2d_acc[lane][1] += position_2d_grad_y;
                positions_2d_abs_acc[lane][0] += position_2d_grad_x.abs();
                positions_2d_abs_acc[lane][1] += position_2d_grad_y.abs();

                conics_acc[lane][0] += -0.5 * fd_x * d_x * footprint_grad;
                conics_acc[lane][1] += -0.5 * fd_x * d_y * footprint_grad;
                conics_acc[lane][2] += -0.5 * fd_y * d_y * footprint_grad;
            }
        }

        // Flushing the lane registers

        for lane in 0..active_lane_count {
            let point = lane_points[lane];
            for channel in 0..3 {
                colors_rgb_3d_grad.add(
                    point * 3 + channel,
                    colors_rgb_3d_acc[lane][channel],
                );
                conics_grad
                    .add(point * 3 + channel, conics_acc[lane][channel]);
            }
            inverse_depths_grad.add(point, inverse_depths_acc[lane]);
            opacities_3d_grad.add(point, opacities_acc[lane]);
            for axis in 0..2 {
                positions_2d_grad
                    .add(point * 2 + axis, positions_2d_acc[lane][axis]);
                positions_2d_grad_abs.add(
                    point * 2 + axis,
                    positions_2d_abs_acc[lane][axis],
                );
            }
        }
    });

    Outputs {
        colors_rgb_3d_grad: colors_rgb_3d_grad.into_vec(),
        conics_grad: conics_grad.into_vec(),
        inverse_depths_grad: inverse_depths_grad.into_vec(),
        opacities_3d_grad: opacities_3d_grad.into_vec(),
        positions_2d_grad: positions_2d_grad.into_vec(),
        positions_2d_grad_abs: positions_2d_grad_abs.into_vec(),
    }
}
