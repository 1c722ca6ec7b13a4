//! Lateral spreading susceptibility zoning.
//!
//! Classifies terrain into Z0/SZ/RZ susceptibility zones from a liquefaction
//! index layer and a terrain model: clip the DTM, derive slope percent,
//! polygonize it, intersect with the index layer, then extract, dissolve and
//! attribute one layer per zone rule before merging into the final sink.
//! All geometry and raster work is delegated to the host registry; this
//! module contributes sequencing, parameter marshalling and the rule table.

use mzgis_core::{
    Error, Feedback, FieldSpec, LayerHandle, MultiStepFeedback, Outcome, OutputTarget, ParamMap,
    ParamValue, Pipeline, ProcessingRegistry, Result,
};

use crate::zones::{validate_rules, ZoneRule, LATERAL_SPREADING_RULES};

/// Field holding the polygonized slope class.
pub const FIELD_DN: &str = "DN";
/// Standardized name the liquefaction index field is renamed to.
pub const FIELD_INDEX: &str = "INDEX";
pub const FIELD_FID: &str = "fid";
pub const FIELD_CODE: &str = "code";
pub const FIELD_FORMULA: &str = "formula";

/// Host field type codes used in the final schema.
const TYPE_INTEGER: i64 = 4;
const TYPE_DOUBLE: i64 = 6;
const TYPE_TEXT: i64 = 10;
/// Field calculator type codes.
const CALC_TYPE_DOUBLE: i64 = 0;
const CALC_TYPE_TEXT: i64 = 2;

/// Fixed stages before the per-zone loop.
const STEP_ZONES_START: usize = 6;
/// Extract, dissolve, add code, refactor, add formula.
const STEPS_PER_ZONE: usize = 5;

/// Parameters for the lateral spreading workflow.
#[derive(Debug, Clone)]
pub struct LateralSpreadingParams {
    /// Digital terrain model raster
    pub dtm: LayerHandle,
    /// Polygon layer carrying the liquefaction index
    pub il_layer: LayerHandle,
    /// Numeric field holding the liquefaction index
    pub il_field: String,
    /// Apply predefined styles to the outputs
    pub apply_styles: bool,
    pub slope_output: OutputTarget,
    pub zones_output: OutputTarget,
}

impl LateralSpreadingParams {
    fn validate(&self) -> Result<()> {
        if self.il_field.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "il_field",
                reason: "liquefaction index field must be specified".to_string(),
            });
        }
        Ok(())
    }
}

/// Layers produced by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct LateralSpreadingOutputs {
    /// Slope raster in percent
    pub slope: LayerHandle,
    /// Merged Z0/SZ/RZ zone polygons with `{fid, code, formula}`
    pub zones: LayerHandle,
}

/// Lateral spreading analysis pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct LateralSpreading;

impl Pipeline for LateralSpreading {
    type Params = LateralSpreadingParams;
    type Outputs = LateralSpreadingOutputs;

    fn id(&self) -> &'static str {
        "lateral_spreading_analysis"
    }

    fn description(&self) -> &'static str {
        "Classify terrain susceptibility to lateral spreading from liquefaction index and slope"
    }

    fn run(
        &self,
        registry: &dyn ProcessingRegistry,
        params: Self::Params,
        feedback: &Feedback,
    ) -> Result<Outcome<Self::Outputs>> {
        lateral_spreading(registry, params, feedback)
    }
}

/// Run the lateral spreading workflow against a host registry.
pub fn lateral_spreading(
    registry: &dyn ProcessingRegistry,
    params: LateralSpreadingParams,
    feedback: &Feedback,
) -> Result<Outcome<LateralSpreadingOutputs>> {
    params.validate()?;
    validate_rules(&LATERAL_SPREADING_RULES)?;

    // merge, final refactor, zone styling, finalize
    let total_steps = STEP_ZONES_START + LATERAL_SPREADING_RULES.len() * STEPS_PER_ZONE + 4;
    let fb = MultiStepFeedback::new(total_steps, feedback);
    let mut step = 0;

    fb.push_info("Clipping DTM to analysis area");
    let clipped = clip_raster(registry, &params.dtm, &params.il_layer, &fb)?;
    step += 1;
    fb.set_current_step(step);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Calculating slope percentage");
    let slope = calculate_slope(registry, &clipped, &params.slope_output, &fb)?;
    step += 1;
    fb.set_current_step(step);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    if params.apply_styles {
        fb.push_info("Applying style to slope layer");
        apply_style(registry, &slope, "slope.qml", &fb);
    }
    step += 1;
    fb.set_current_step(step);

    fb.push_info("Converting slope raster to polygons");
    let slope_polygons = polygonize_raster(registry, &slope, &fb)?;
    step += 1;
    fb.set_current_step(step);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Intersecting slope with liquefaction index layer");
    let intersected = intersect_layers(registry, &slope_polygons, &params.il_layer, &fb)?;
    step += 1;
    fb.set_current_step(step);

    fb.push_info("Preparing data for zone classification");
    let prepared = rename_il_field(registry, &intersected, &params.il_field, &fb)?;
    step += 1;
    fb.set_current_step(step);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    let mut zone_layers = Vec::new();
    for (nth, rule) in LATERAL_SPREADING_RULES.iter().enumerate() {
        fb.push_info(&format!(
            "Processing zone {}/{}: {} (code: {})",
            nth + 1,
            LATERAL_SPREADING_RULES.len(),
            rule.category.label(),
            rule.code
        ));

        // A delegated failure inside one zone is a warning, not fatal.
        match process_zone(registry, &prepared, rule, &fb) {
            Ok(Some(layer)) => zone_layers.push(layer),
            Ok(None) => fb.push_info(&format!("No features found for zone {}", rule.code)),
            Err(e) => fb.push_warning(&format!("Error processing zone {}: {e}", rule.code)),
        }

        step += STEPS_PER_ZONE;
        fb.set_current_step(step);
        if fb.is_canceled() {
            return Ok(Outcome::Canceled);
        }
    }

    if zone_layers.is_empty() {
        return Err(Error::EmptyResult(
            "no zones were generated; check input data and IL field values".to_string(),
        ));
    }

    fb.push_info(&format!("Merging {} zone layers", zone_layers.len()));
    let merged = merge_zones(registry, zone_layers, &fb)?;
    step += 1;
    fb.set_current_step(step);

    fb.push_info("Finalizing output fields");
    let zones = reorganize_final_fields(registry, &merged, &params.zones_output, &fb)?;
    step += 1;
    fb.set_current_step(step);

    if params.apply_styles {
        fb.push_info("Applying style to zones layer");
        apply_style(registry, &zones, "lateral_spreading.qml", &fb);
    }
    step += 1;
    fb.set_current_step(step);

    fb.push_info("Lateral spreading analysis completed");
    Ok(Outcome::Completed(LateralSpreadingOutputs { slope, zones }))
}

fn clip_raster(
    registry: &dyn ProcessingRegistry,
    raster: &LayerHandle,
    mask: &LayerHandle,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with("ALPHA_BAND", false)
        .with("CROP_TO_CUTLINE", true)
        .with("DATA_TYPE", 0i64)
        .with("INPUT", raster.clone())
        .with("KEEP_RESOLUTION", false)
        .with("MASK", mask.clone())
        .with("MULTITHREADING", false)
        .with("NODATA", ParamValue::Null)
        .with("SOURCE_CRS", "ProjectCrs")
        .with("TARGET_CRS", "ProjectCrs")
        .with("TARGET_EXTENT", mask.clone())
        .with("OUTPUT", OutputTarget::Temporary);
    registry
        .run("gdal:cliprasterbymasklayer", &params, fb)?
        .require("gdal:cliprasterbymasklayer", "OUTPUT")
}

fn calculate_slope(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    output: &OutputTarget,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with("AS_PERCENT", true)
        .with("BAND", 1i64)
        .with("COMPUTE_EDGES", false)
        .with("INPUT", input.clone())
        .with("SCALE", 1i64)
        .with("ZEVENBERGEN", false)
        .with("OUTPUT", output.clone());
    registry
        .run("gdal:slope", &params, fb)?
        .require("gdal:slope", "OUTPUT")
}

fn polygonize_raster(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with("BAND", 1i64)
        .with("EIGHT_CONNECTEDNESS", false)
        .with("FIELD", FIELD_DN)
        .with("INPUT", input.clone())
        .with("OUTPUT", OutputTarget::Temporary);
    registry
        .run("gdal:polygonize", &params, fb)?
        .require("gdal:polygonize", "OUTPUT")
}

fn intersect_layers(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    overlay: &LayerHandle,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with("GRID_SIZE", ParamValue::Null)
        .with("INPUT", input.clone())
        .with("INPUT_FIELDS", vec![String::new()])
        .with("OVERLAY", overlay.clone())
        .with("OVERLAY_FIELDS", vec![String::new()])
        .with("OVERLAY_FIELDS_PREFIX", "")
        .with("OUTPUT", OutputTarget::Temporary);
    registry
        .run("native:intersection", &params, fb)?
        .require("native:intersection", "OUTPUT")
}

fn rename_il_field(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    il_field: &str,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with("FIELD", il_field)
        .with("INPUT", input.clone())
        .with("NEW_NAME", FIELD_INDEX)
        .with("OUTPUT", OutputTarget::Temporary);
    registry
        .run("native:renametablefield", &params, fb)?
        .require("native:renametablefield", "OUTPUT")
}

/// Extract, dissolve and attribute a single zone. `Ok(None)` means the
/// extraction matched no features, which skips the zone.
fn process_zone(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    rule: &ZoneRule,
    fb: &Feedback,
) -> Result<Option<LayerHandle>> {
    let extract_params = ParamMap::new()
        .with("EXPRESSION", rule.expression(FIELD_INDEX, FIELD_DN))
        .with("INPUT", input.clone())
        .with("OUTPUT", OutputTarget::Temporary);
    let extracted = registry.run("native:extractbyexpression", &extract_params, fb)?;
    let Some(extracted) = extracted.get("OUTPUT").cloned() else {
        return Ok(None);
    };

    let dissolve_params = ParamMap::new()
        .with("FIELD", vec![String::new()])
        .with("INPUT", extracted)
        .with("SEPARATE_DISJOINT", true)
        .with("OUTPUT", OutputTarget::Temporary);
    let dissolved = registry
        .run("native:dissolve", &dissolve_params, fb)?
        .require("native:dissolve", "OUTPUT")?;

    let code_params = ParamMap::new()
        .with("FIELD_LENGTH", 0i64)
        .with("FIELD_NAME", FIELD_CODE)
        .with("FIELD_PRECISION", 0i64)
        .with("FIELD_TYPE", CALC_TYPE_DOUBLE)
        .with("FORMULA", rule.code.to_string())
        .with("INPUT", dissolved)
        .with("OUTPUT", OutputTarget::Temporary);
    let coded = registry
        .run("native:fieldcalculator", &code_params, fb)?
        .require("native:fieldcalculator", "OUTPUT")?;

    let refactor_params = ParamMap::new()
        .with(
            "FIELDS_MAPPING",
            vec![
                FieldSpec::new(format!("\"{FIELD_FID}\""), FIELD_FID, TYPE_INTEGER),
                FieldSpec::new(format!("\"{FIELD_CODE}\""), FIELD_CODE, TYPE_DOUBLE),
            ],
        )
        .with("INPUT", coded)
        .with("OUTPUT", OutputTarget::Temporary);
    let refactored = registry
        .run("native:refactorfields", &refactor_params, fb)?
        .require("native:refactorfields", "OUTPUT")?;

    let formula_params = ParamMap::new()
        .with("FIELD_LENGTH", 255i64)
        .with("FIELD_NAME", FIELD_FORMULA)
        .with("FIELD_PRECISION", 0i64)
        .with("FIELD_TYPE", CALC_TYPE_TEXT)
        .with("FORMULA", format!("'{}'", rule.formula))
        .with("INPUT", refactored)
        .with("OUTPUT", OutputTarget::Temporary);
    let with_formula = registry
        .run("native:fieldcalculator", &formula_params, fb)?
        .require("native:fieldcalculator", "OUTPUT")?;

    Ok(Some(with_formula))
}

fn merge_zones(
    registry: &dyn ProcessingRegistry,
    mut layers: Vec<LayerHandle>,
    fb: &Feedback,
) -> Result<LayerHandle> {
    if layers.len() == 1 {
        // Only one zone produced features, nothing to merge.
        return Ok(layers.remove(0));
    }
    let params = ParamMap::new()
        .with("CRS", "ProjectCrs")
        .with("LAYERS", layers)
        .with("OUTPUT", OutputTarget::Temporary);
    registry
        .run("native:mergevectorlayers", &params, fb)?
        .require("native:mergevectorlayers", "OUTPUT")
}

fn reorganize_final_fields(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    output: &OutputTarget,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with(
            "FIELDS_MAPPING",
            vec![
                FieldSpec::new(format!("\"{FIELD_FID}\""), FIELD_FID, TYPE_INTEGER),
                FieldSpec::new(format!("\"{FIELD_CODE}\""), FIELD_CODE, TYPE_DOUBLE),
                FieldSpec::new(format!("\"{FIELD_FORMULA}\""), FIELD_FORMULA, TYPE_TEXT)
                    .with_length(255),
            ],
        )
        .with("INPUT", input.clone())
        .with("OUTPUT", output.clone());
    registry
        .run("native:refactorfields", &params, fb)?
        .require("native:refactorfields", "OUTPUT")
}

/// Styling is presentation only; a failure is reported and ignored.
fn apply_style(registry: &dyn ProcessingRegistry, layer: &LayerHandle, style: &str, fb: &Feedback) {
    let params = ParamMap::new()
        .with("INPUT", layer.clone())
        .with("STYLE", style);
    if let Err(e) = registry.run("native:setlayerstyle", &params, fb) {
        fb.push_warning(&format!("Could not apply style {style}: {e}"));
    }
}
