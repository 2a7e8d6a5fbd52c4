pub mod align;
pub mod cluster;
