//! # MzGis Workflows
//!
//! Geomorphological and seismic microzonation workflows for MzGis.
//!
//! ## Available Workflows
//!
//! - **geology**: Geological unit polygons and contacts from points and lines
//! - **hydrology**: Stream network extraction from a terrain model
//! - **microzonation**: Slope-based morphological zoning
//! - **lateral_spreading**: Lateral spreading susceptibility and respect zones
//! - **zones**: Zone classification rules shared by the zoning workflows

pub mod geology;
pub mod hydrology;
pub mod lateral_spreading;
pub mod microzonation;
pub mod zones;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::geology::{geology, Geology, GeologyOutputs, GeologyParams, SpatialPredicate};
    pub use crate::hydrology::{
        hydrology, HydroParams, Hydrology, HydrologyOutputs, HydrologyParams,
    };
    pub use crate::lateral_spreading::{
        lateral_spreading, LateralSpreading, LateralSpreadingOutputs, LateralSpreadingParams,
    };
    pub use crate::microzonation::{
        microzonation, Microzonation, MicrozonationOutputs, MicrozonationParams,
    };
    pub use crate::zones::{
        classify, classify_features, Interval, ZoneCategory, ZoneRule, LATERAL_SPREADING_RULES,
    };
    pub use mzgis_core::prelude::*;
}
