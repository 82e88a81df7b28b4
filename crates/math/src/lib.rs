pub mod vec;
pub mod mat;
pub mod quat;
