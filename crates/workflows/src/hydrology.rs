//! Stream network extraction from a digital terrain model.
//!
//! Fills sinks in the DTM, derives the stream raster with the watershed
//! analysis, vectorizes it and smooths the resulting lines. Optional
//! watershed by-products (drainage direction, half basins, topographic
//! convergence index) are surfaced when the host produces them.

use mzgis_core::{
    Error, Feedback, LayerHandle, MultiStepFeedback, Outcome, OutputTarget, ParamMap, Pipeline,
    ProcessingRegistry, Result,
};

const TOTAL_STEPS: usize = 4;
/// Memory budget handed to the watershed analysis, in MB.
const GRASS_MEMORY: i64 = 300;
/// Convergence factor for multiple flow direction.
const GRASS_CONVERGENCE: i64 = 5;

/// Hydrological tuning parameters with the usual defaults.
#[derive(Debug, Clone)]
pub struct HydroParams {
    /// Minimum slope imposed while filling sinks, in degrees
    pub min_slope: f64,
    /// Minimum exterior watershed basin size, in cells
    pub min_basin_size: i64,
    /// Smoothing iterations
    pub iterations: i64,
    /// Maximum node angle to smooth, in degrees
    pub max_angle: i64,
    /// Smoothing offset fraction
    pub offset: f64,
}

impl Default for HydroParams {
    fn default() -> Self {
        Self {
            min_slope: 0.1,
            min_basin_size: 100,
            iterations: 1,
            max_angle: 180,
            offset: 0.25,
        }
    }
}

impl HydroParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_slope >= 0.01 && self.min_slope <= 90.0) {
            return Err(Error::InvalidParameter {
                name: "min_slope",
                reason: format!("must be between 0.01 and 90 degrees (got {})", self.min_slope),
            });
        }
        if self.min_basin_size < 1 {
            return Err(Error::InvalidParameter {
                name: "min_basin_size",
                reason: format!("must be at least 1 cell (got {})", self.min_basin_size),
            });
        }
        if !(1..=10).contains(&self.iterations) {
            return Err(Error::InvalidParameter {
                name: "iterations",
                reason: format!("must be between 1 and 10 (got {})", self.iterations),
            });
        }
        if !(0..=360).contains(&self.max_angle) {
            return Err(Error::InvalidParameter {
                name: "max_angle",
                reason: format!("must be between 0 and 360 degrees (got {})", self.max_angle),
            });
        }
        if !(self.offset >= 0.01 && self.offset <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "offset",
                reason: format!("must be between 0.01 and 1.0 (got {})", self.offset),
            });
        }
        Ok(())
    }
}

/// Parameters for the stream network workflow.
#[derive(Debug, Clone)]
pub struct HydrologyParams {
    pub dtm: LayerHandle,
    pub hydro: HydroParams,
    pub filled_dtm_output: OutputTarget,
    pub streams_raster_output: OutputTarget,
    pub drainage_output: OutputTarget,
    pub half_basins_output: OutputTarget,
    pub tci_output: OutputTarget,
    pub raw_streams_output: OutputTarget,
    pub smoothed_output: OutputTarget,
}

/// Layers produced by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrologyOutputs {
    /// Sink-filled DTM
    pub filled_dtm: LayerHandle,
    /// Vectorized stream network before smoothing
    pub raw_streams: LayerHandle,
    /// Smoothed stream network
    pub smoothed: LayerHandle,
    pub streams_raster: Option<LayerHandle>,
    pub drainage: Option<LayerHandle>,
    pub half_basins: Option<LayerHandle>,
    pub tci: Option<LayerHandle>,
}

/// Hydrological stream network pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct Hydrology;

impl Pipeline for Hydrology {
    type Params = HydrologyParams;
    type Outputs = HydrologyOutputs;

    fn id(&self) -> &'static str {
        "hydrological_analysis_stream_network"
    }

    fn description(&self) -> &'static str {
        "Extract and smooth a stream network from a digital terrain model"
    }

    fn run(
        &self,
        registry: &dyn ProcessingRegistry,
        params: Self::Params,
        feedback: &Feedback,
    ) -> Result<Outcome<Self::Outputs>> {
        hydrology(registry, params, feedback)
    }
}

/// Run the stream network workflow against a host registry.
pub fn hydrology(
    registry: &dyn ProcessingRegistry,
    params: HydrologyParams,
    feedback: &Feedback,
) -> Result<Outcome<HydrologyOutputs>> {
    params.hydro.validate()?;

    let fb = MultiStepFeedback::new(TOTAL_STEPS, feedback);
    fb.push_info(&format!(
        "Starting hydrological analysis (min basin size: {} cells)",
        params.hydro.min_basin_size
    ));

    fb.push_info("Filling sinks in the terrain model");
    let fill_params = ParamMap::new()
        .with("BAND", 1_i64)
        .with("INPUT", params.dtm.clone())
        .with("MIN_SLOPE", params.hydro.min_slope)
        .with("OUTPUT", params.filled_dtm_output.clone());
    let filled_dtm = registry
        .run("native:fillsinkswangliu", &fill_params, &fb)?
        .require("native:fillsinkswangliu", "OUTPUT_FILLED_DEM")?;
    fb.set_current_step(1);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Running watershed analysis");
    let watershed_params = ParamMap::new()
        .with("-4", false)
        .with("-a", false)
        .with("-b", false)
        .with("-m", false)
        .with("-s", false)
        .with("convergence", GRASS_CONVERGENCE)
        .with("elevation", filled_dtm.clone())
        .with("memory", GRASS_MEMORY)
        .with("threshold", params.hydro.min_basin_size)
        .with("stream", params.streams_raster_output.clone())
        .with("drainage", params.drainage_output.clone())
        .with("half_basin", params.half_basins_output.clone())
        .with("tci", params.tci_output.clone());
    let watershed = registry.run("grass:r.watershed", &watershed_params, &fb)?;
    let Some(streams_raster) = watershed.get("stream").cloned() else {
        return Err(Error::EmptyResult(
            "no stream network generated; try reducing the minimum basin size".to_string(),
        ));
    };
    let drainage = watershed.get("drainage").cloned();
    let half_basins = watershed.get("half_basin").cloned();
    let tci = watershed.get("tci").cloned();
    fb.set_current_step(2);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Vectorizing the stream raster");
    let vectorize_params = ParamMap::new()
        .with("input", streams_raster.clone())
        .with("column", "value")
        .with("type", 0_i64)
        .with("output", params.raw_streams_output.clone());
    let raw_streams = registry
        .run("grass:r.to.vect", &vectorize_params, &fb)?
        .require("grass:r.to.vect", "output")?;
    fb.set_current_step(3);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Smoothing the stream network");
    let smooth_params = ParamMap::new()
        .with("INPUT", raw_streams.clone())
        .with("ITERATIONS", params.hydro.iterations)
        .with("MAX_ANGLE", params.hydro.max_angle)
        .with("OFFSET", params.hydro.offset)
        .with("OUTPUT", params.smoothed_output.clone());
    let smoothed = registry
        .run("native:smoothgeometry", &smooth_params, &fb)?
        .require("native:smoothgeometry", "OUTPUT")?;
    fb.set_current_step(4);

    fb.push_info("Hydrological analysis completed");
    Ok(Outcome::Completed(HydrologyOutputs {
        filled_dtm,
        raw_streams,
        smoothed,
        streams_raster: Some(streams_raster),
        drainage,
        half_basins,
        tci,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(HydroParams::default().validate().is_ok());
    }

    #[test]
    fn test_min_slope_bounds() {
        let mut p = HydroParams::default();
        p.min_slope = 0.009;
        assert!(p.validate().is_err());
        p.min_slope = 90.0;
        assert!(p.validate().is_ok());
        p.min_slope = 90.1;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_basin_size_bounds() {
        let mut p = HydroParams::default();
        p.min_basin_size = 0;
        assert!(p.validate().is_err());
        p.min_basin_size = 1;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_smoothing_bounds() {
        let mut p = HydroParams::default();
        p.iterations = 11;
        assert!(p.validate().is_err());
        p.iterations = 10;
        assert!(p.validate().is_ok());

        p.max_angle = 361;
        assert!(p.validate().is_err());
        p.max_angle = 0;
        assert!(p.validate().is_ok());

        p.offset = 1.5;
        assert!(p.validate().is_err());
        p.offset = 0.01;
        assert!(p.validate().is_ok());
    }
}
