pub mod align;
pub mod cli;
pub mod cluster;
pub mod commands;
pub mod utils;
