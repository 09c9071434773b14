pub mod gaussian_3d;
