//! Seismic microzonation morphological analysis.
//!
//! Identifies areas susceptible to topographic amplification or slope
//! instability: clip the DTM with the geological zones, compute slope in
//! degrees, threshold it, vectorize, keep the cells above the threshold and
//! join the original zone attributes back on by location.

use mzgis_core::{
    Error, Feedback, LayerHandle, MultiStepFeedback, Outcome, OutputTarget, ParamMap, ParamValue,
    Pipeline, ProcessingRegistry, Result,
};

pub const DEFAULT_SLOPE_THRESHOLD: i64 = 15;
pub const MIN_SLOPE_THRESHOLD: i64 = 0;
pub const MAX_SLOPE_THRESHOLD: i64 = 90;

const TOTAL_STEPS: usize = 6;

/// Spatial predicates used when joining the zone attributes back:
/// intersects, contains, equals, overlaps, within, crosses.
const JOIN_PREDICATES: [i64; 6] = [0, 1, 2, 4, 5, 6];

/// Parameters for the microzonation slope analysis.
#[derive(Debug, Clone)]
pub struct MicrozonationParams {
    /// Digital terrain model raster
    pub dtm: LayerHandle,
    /// Geological / seismic zone polygons defining the study area
    pub zones_layer: LayerHandle,
    /// Critical slope angle in degrees (0-90)
    pub slope_threshold: i64,
    pub slope_output: OutputTarget,
    pub zones_output: OutputTarget,
}

impl MicrozonationParams {
    fn validate(&self) -> Result<()> {
        if !(MIN_SLOPE_THRESHOLD..=MAX_SLOPE_THRESHOLD).contains(&self.slope_threshold) {
            return Err(Error::InvalidParameter {
                name: "slope_threshold",
                reason: format!(
                    "must be between {MIN_SLOPE_THRESHOLD} and {MAX_SLOPE_THRESHOLD} degrees (got {})",
                    self.slope_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Layers produced by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct MicrozonationOutputs {
    /// Slope raster in degrees
    pub slope: LayerHandle,
    /// High-slope polygons with the original zone attributes
    pub zones: LayerHandle,
}

/// Seismic microzonation morphological analysis pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct Microzonation;

impl Pipeline for Microzonation {
    type Params = MicrozonationParams;
    type Outputs = MicrozonationOutputs;

    fn id(&self) -> &'static str {
        "seismic_microzonation_morphology"
    }

    fn description(&self) -> &'static str {
        "Identify zones with slopes exceeding a critical threshold within seismic zones"
    }

    fn run(
        &self,
        registry: &dyn ProcessingRegistry,
        params: Self::Params,
        feedback: &Feedback,
    ) -> Result<Outcome<Self::Outputs>> {
        microzonation(registry, params, feedback)
    }
}

/// Run the microzonation slope analysis against a host registry.
pub fn microzonation(
    registry: &dyn ProcessingRegistry,
    params: MicrozonationParams,
    feedback: &Feedback,
) -> Result<Outcome<MicrozonationOutputs>> {
    params.validate()?;

    let fb = MultiStepFeedback::new(TOTAL_STEPS, feedback);

    fb.push_info("Clipping DTM with geological zones");
    let clip_params = ParamMap::new()
        .with("ALPHA_BAND", false)
        .with("CROP_TO_CUTLINE", true)
        .with("DATA_TYPE", 0i64)
        .with("EXTRA", "")
        .with("INPUT", params.dtm.clone())
        .with("KEEP_RESOLUTION", false)
        .with("MASK", params.zones_layer.clone())
        .with("MULTITHREADING", false)
        .with("NODATA", ParamValue::Null)
        .with("OPTIONS", "")
        .with("SET_RESOLUTION", false)
        .with("SOURCE_CRS", "ProjectCrs")
        .with("TARGET_CRS", "ProjectCrs")
        .with("TARGET_EXTENT", params.zones_layer.clone())
        .with("X_RESOLUTION", ParamValue::Null)
        .with("Y_RESOLUTION", ParamValue::Null)
        .with("OUTPUT", OutputTarget::Temporary);
    let clipped = registry
        .run("gdal:cliprasterbymasklayer", &clip_params, &fb)?
        .require("gdal:cliprasterbymasklayer", "OUTPUT")?;
    fb.set_current_step(1);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Calculating slope map in degrees");
    let slope_params = ParamMap::new()
        .with("AS_PERCENT", false)
        .with("BAND", 1i64)
        .with("COMPUTE_EDGES", false)
        .with("EXTRA", "")
        .with("INPUT", clipped)
        .with("OPTIONS", "")
        .with("SCALE", 1i64)
        .with("ZEVENBERGEN", false)
        .with("OUTPUT", params.slope_output.clone());
    let slope = registry
        .run("gdal:slope", &slope_params, &fb)?
        .require("gdal:slope", "OUTPUT")?;
    fb.set_current_step(2);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info(&format!(
        "Identifying slopes >= {} degrees",
        params.slope_threshold
    ));
    let threshold_params = ParamMap::new()
        .with("CELL_SIZE", ParamValue::Null)
        .with("CRS", "ProjectCrs")
        .with("EXPRESSION", format!("\"A@1\" >= {}", params.slope_threshold))
        .with("EXTENT", ParamValue::Null)
        .with("LAYERS", slope.clone())
        .with("OUTPUT", OutputTarget::Temporary);
    let thresholded = registry
        .run("native:modelerrastercalc", &threshold_params, &fb)?
        .require("native:modelerrastercalc", "OUTPUT")?;
    fb.set_current_step(3);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Converting to vector polygons");
    let polygonize_params = ParamMap::new()
        .with("BAND", 1i64)
        .with("EIGHT_CONNECTEDNESS", false)
        .with("EXTRA", "")
        .with("FIELD", "DN")
        .with("INPUT", thresholded)
        .with("OUTPUT", OutputTarget::Temporary);
    let polygons = registry
        .run("gdal:polygonize", &polygonize_params, &fb)?
        .require("gdal:polygonize", "OUTPUT")?;
    fb.set_current_step(4);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Extracting high slope areas");
    let extract_params = ParamMap::new()
        .with("FIELD", "DN")
        .with("INPUT", polygons)
        .with("OPERATOR", 0i64)
        .with("VALUE", "1")
        .with("OUTPUT", OutputTarget::Temporary);
    let extracted = registry
        .run("native:extractbyattribute", &extract_params, &fb)?
        .require("native:extractbyattribute", "OUTPUT")?;
    fb.set_current_step(5);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Joining with seismic zones attributes");
    let join_params = ParamMap::new()
        .with("DISCARD_NONMATCHING", false)
        .with("INPUT", extracted)
        .with("JOIN", params.zones_layer.clone())
        .with("JOIN_FIELDS", vec![String::new()])
        .with("METHOD", 0i64)
        .with("PREDICATE", JOIN_PREDICATES.to_vec())
        .with("PREFIX", "")
        .with("OUTPUT", params.zones_output.clone());
    let zones = registry
        .run("native:joinattributesbylocation", &join_params, &fb)?
        .require("native:joinattributesbylocation", "OUTPUT")?;
    fb.set_current_step(6);

    fb.push_info("Processing completed");
    Ok(Outcome::Completed(MicrozonationOutputs { slope, zones }))
}
