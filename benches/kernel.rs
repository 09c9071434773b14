use divan::Bencher;
use splatgrad::preset::render::{BUCKET_SIZE, TILE_PIXEL_COUNT};
use splatgrad::render::gaussian_3d::kernel::{
    covariance_backward, rasterize_backward,
};

fn main() {
    divan::main();
}

#[divan::bench(sample_count = 20, sample_size = 1)]
fn bench_covariance_backward(bencher: Bencher) {
    bencher
        .with_inputs(data::covariance_case)
        .bench_local_refs(|case| {
            covariance_backward::main(case.0, case.1.inputs())
        });
}

#[divan::bench(sample_count = 20, sample_size = 1)]
fn bench_rasterize_backward(bencher: Bencher) {
    bencher
        .with_inputs(data::rasterize_case)
        .bench_local_refs(|case| {
            rasterize_backward::main(case.0, case.1.inputs())
        });
}

mod data {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    // P
    const POINT_COUNT: usize = 1 << 16;
    const TILE_COUNT_X: u32 = 4;
    const TILE_COUNT_Y: u32 = 4;
    const POINTS_PER_TILE: usize = 1 << 6;

    pub struct CovarianceBuffers {
        pub conics_grad: Vec<f32>,
        pub covariances_3d: Vec<f32>,
        pub inverse_depths_grad: Vec<f32>,
        pub opacities_3d: Vec<f32>,
        pub opacities_3d_grad: Vec<f32>,
        pub positions_3d: Vec<f32>,
        pub radii: Vec<i32>,
    }

    impl CovarianceBuffers {
        pub fn inputs(&self) -> covariance_backward::Inputs {
            covariance_backward::Inputs {
                conics_grad: &self.conics_grad,
                covariances_3d: &self.covariances_3d,
                inverse_depths_grad: &self.inverse_depths_grad,
                opacities_3d: &self.opacities_3d,
                opacities_3d_grad: &self.opacities_3d_grad,
                positions_3d: &self.positions_3d,
                radii: &self.radii,
            }
        }
    }

    pub fn covariance_case(
    ) -> (covariance_backward::Arguments, CovarianceBuffers) {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffers = CovarianceBuffers {
            conics_grad: Vec::new(),
            covariances_3d: Vec::new(),
            inverse_depths_grad: Vec::new(),
            opacities_3d: Vec::new(),
            opacities_3d_grad: Vec::new(),
            positions_3d: Vec::new(),
            radii: vec![1; POINT_COUNT],
        };
        for _ in 0..POINT_COUNT {
            let scale = [
                rng.gen_range(0.5_f32..1.5),
                rng.gen_range(0.5..1.5),
                rng.gen_range(0.5..1.5),
            ];
            buffers.covariances_3d.extend([
                scale[0] * scale[0],
                0.1,
                -0.1,
                scale[1] * scale[1],
                0.1,
                scale[2] * scale[2],
            ]);
            buffers.conics_grad.extend([
                rng.gen_range(-1.0_f32..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ]);
            buffers.inverse_depths_grad.push(rng.gen_range(-0.5..0.5));
            buffers.opacities_3d.push(rng.gen_range(0.1..0.9));
            buffers.opacities_3d_grad.push(rng.gen_range(-1.0..1.0));
            buffers.positions_3d.extend([
                rng.gen_range(-1.0_f32..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(4.0..8.0),
            ]);
        }
        (
            covariance_backward::Arguments {
                antialiasing: 1,
                focal_length_x: 32.0,
                focal_length_y: 32.0,
                point_count: POINT_COUNT as u32,
                view_bound_x: 1.3,
                view_bound_y: 1.3,
                _padding_1: [0; 2],
                view_transform: glam::Mat4::IDENTITY.to_cols_array_2d(),
            },
            buffers,
        )
    }

    pub struct RasterizeBuffers {
        pub bucket_colors_rgb_2d: Vec<f32>,
        pub bucket_inverse_depths_2d: Vec<f32>,
        pub bucket_tile_indices: Vec<u32>,
        pub bucket_transmittances: Vec<f32>,
        pub colors_rgb_2d: Vec<f32>,
        pub colors_rgb_2d_grad: Vec<f32>,
        pub colors_rgb_3d: Vec<f32>,
        pub conics: Vec<f32>,
        pub depths: Vec<f32>,
        pub inverse_depths_2d: Vec<f32>,
        pub inverse_depths_2d_grad: Vec<f32>,
        pub opacities_3d_rendered: Vec<f32>,
        pub point_indices: Vec<u32>,
        pub point_rendered_counts: Vec<u32>,
        pub point_rendered_counts_max: Vec<u32>,
        pub positions_2d: Vec<f32>,
        pub tile_bucket_offsets: Vec<u32>,
        pub tile_point_ranges: Vec<u32>,
        pub transmittances: Vec<f32>,
    }

    impl RasterizeBuffers {
        pub fn inputs(&self) -> rasterize_backward::Inputs {
            rasterize_backward::Inputs {
                bucket_colors_rgb_2d: &self.bucket_colors_rgb_2d,
                bucket_inverse_depths_2d: &self.bucket_inverse_depths_2d,
                bucket_tile_indices: &self.bucket_tile_indices,
                bucket_transmittances: &self.bucket_transmittances,
                colors_rgb_2d: &self.colors_rgb_2d,
                colors_rgb_2d_grad: &self.colors_rgb_2d_grad,
                colors_rgb_3d: &self.colors_rgb_3d,
                conics: &self.conics,
                depths: &self.depths,
                inverse_depths_2d: &self.inverse_depths_2d,
                inverse_depths_2d_grad: &self.inverse_depths_2d_grad,
                opacities_3d_rendered: &self.opacities_3d_rendered,
                point_indices: &self.point_indices,
                point_rendered_counts: &self.point_rendered_counts,
                point_rendered_counts_max: &self.point_rendered_counts_max,
                positions_2d: &self.positions_2d,
                tile_bucket_offsets: &self.tile_bucket_offsets,
                tile_point_ranges: &self.tile_point_ranges,
                transmittances: &self.transmittances,
            }
        }
    }

    /// A saturated scene: every point is listed in every tile and every
    /// pixel counts the full range as contributors.
    pub fn rasterize_case(
    ) -> (rasterize_backward::Arguments, RasterizeBuffers) {
        let mut rng = StdRng::seed_from_u64(0);
        let image_size_x = TILE_COUNT_X * 16;
        let image_size_y = TILE_COUNT_Y * 16;
        let pixel_count = (image_size_x * image_size_y) as usize;
        let tile_count = (TILE_COUNT_X * TILE_COUNT_Y) as usize;
        let buckets_per_tile =
            POINTS_PER_TILE.div_ceil(BUCKET_SIZE as usize);
        let bucket_count = tile_count * buckets_per_tile;
        let bucket_pixel_count =
            bucket_count * TILE_PIXEL_COUNT as usize;
        let point_count = POINTS_PER_TILE;

        let mut buffers = RasterizeBuffers {
            bucket_colors_rgb_2d: vec![0.0; bucket_pixel_count * 3],
            bucket_inverse_depths_2d: vec![0.0; bucket_pixel_count],
            bucket_tile_indices: (0..tile_count as u32)
                .flat_map(|tile| {
                    std::iter::repeat(tile).take(buckets_per_tile)
                })
                .collect(),
            bucket_transmittances: vec![1.0; bucket_pixel_count],
            colors_rgb_2d: vec![0.5; pixel_count * 3],
            colors_rgb_2d_grad: (0..pixel_count * 3)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect(),
            colors_rgb_3d: Vec::new(),
            conics: Vec::new(),
            depths: Vec::new(),
            inverse_depths_2d: vec![0.2; pixel_count],
            inverse_depths_2d_grad: (0..pixel_count)
                .map(|_| rng.gen_range(-0.5..0.5))
                .collect(),
            opacities_3d_rendered: Vec::new(),
            point_indices: (0..tile_count)
                .flat_map(|_| 0..point_count as u32)
                .collect(),
            point_rendered_counts: vec![
                point_count as u32;
                pixel_count
            ],
            point_rendered_counts_max: vec![
                point_count as u32;
                tile_count
            ],
            positions_2d: Vec::new(),
            tile_bucket_offsets: (0..tile_count as u32)
                .map(|tile| tile * buckets_per_tile as u32)
                .collect(),
            tile_point_ranges: (0..tile_count as u32)
                .flat_map(|tile| {
                    [
                        tile * point_count as u32,
                        (tile + 1) * point_count as u32,
                    ]
                })
                .collect(),
            transmittances: vec![0.1; pixel_count],
        };
        for _ in 0..point_count {
            let sigma = rng.gen_range(3.0_f32..8.0);
            buffers.colors_rgb_3d.extend([
                rng.gen_range(0.0_f32..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            ]);
            buffers
                .conics
                .extend([1.0 / (sigma * sigma), 0.0, 1.0 / (sigma * sigma)]);
            buffers.depths.push(rng.gen_range(1.0_f32..10.0));
            buffers
                .opacities_3d_rendered
                .push(rng.gen_range(0.1..0.6));
            buffers.positions_2d.extend([
                rng.gen_range(0.0..image_size_x as f32),
                rng.gen_range(0.0..image_size_y as f32),
            ]);
        }

        (
            rasterize_backward::Arguments {
                bucket_count: bucket_count as u32,
                colors_background: [0.1, 0.2, 0.3],
                image_size_x,
                image_size_y,
                point_count: point_count as u32,
                tile_count_x: TILE_COUNT_X,
                tile_count_y: TILE_COUNT_Y,
            },
            buffers,
        )
    }
}
