#![allow(async_fn_in_trait)]
pub mod asset_info;
pub mod attrs;
pub mod catalog;
pub mod commands;
pub mod depth_grid;
pub mod error;
pub mod footprint;
pub mod inputs;
pub mod location;
pub mod logging;
pub mod params;
pub mod ras_hdf;
pub mod s3;
pub mod s3_operations;
pub mod settings;
pub mod stac_items;
