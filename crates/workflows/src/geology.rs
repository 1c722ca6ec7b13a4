//! Geological map generation from points and lines.
//!
//! Builds geological unit polygons and contact lines from a point layer
//! carrying geological attributes and a line layer drawing the unit
//! boundaries: clean duplicates, polygonize the line network, transfer
//! attributes from points to polygons by spatial predicate, then derive
//! dissolved single-part contact lines from the polygon boundaries.

use mzgis_core::{
    Error, Feedback, LayerHandle, MultiStepFeedback, Outcome, OutputTarget, ParamMap, Pipeline,
    ProcessingRegistry, Result,
};

pub const DEFAULT_TOLERANCE: f64 = 0.000001;

const TOTAL_STEPS: usize = 10;
/// Create separate features for each match.
const JOIN_METHOD_ONE_TO_MANY: i64 = 0;

/// Spatial predicate for transferring point attributes to polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialPredicate {
    #[default]
    Intersects,
    Contains,
    Within,
    Overlaps,
}

impl SpatialPredicate {
    /// Host predicate code.
    pub fn code(&self) -> i64 {
        match self {
            Self::Intersects => 0,
            Self::Contains => 1,
            Self::Within => 2,
            Self::Overlaps => 3,
        }
    }
}

/// Parameters for the geological mapping workflow.
#[derive(Debug, Clone)]
pub struct GeologyParams {
    /// Point layer with geological attributes, one point per unit
    pub points: LayerHandle,
    /// Field containing the primary geological classification
    pub attribute_field: String,
    /// Line layer drawing the geological contacts
    pub lines: LayerHandle,
    /// Distance threshold for duplicate vertex removal, in map units
    pub tolerance: f64,
    pub predicate: SpatialPredicate,
    pub clean_points_output: OutputTarget,
    pub polygons_output: OutputTarget,
    pub segments_output: OutputTarget,
    pub geological_polygons_output: OutputTarget,
    pub contacts_output: OutputTarget,
}

impl GeologyParams {
    fn validate(&self) -> Result<()> {
        if self.attribute_field.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "attribute_field",
                reason: "geological attribute field must be specified".to_string(),
            });
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "tolerance",
                reason: format!("must be greater than or equal to 0 (got {})", self.tolerance),
            });
        }
        Ok(())
    }
}

/// Layers produced by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeologyOutputs {
    /// Points after duplicate removal (intermediate)
    pub clean_points: LayerHandle,
    /// Polygons before attribute joining (intermediate)
    pub polygons: LayerHandle,
    /// Individual contact segments (intermediate)
    pub segments: LayerHandle,
    /// Unit polygons with geological attributes
    pub geological_polygons: LayerHandle,
    /// Dissolved single-part contact lines with attributes
    pub contacts: LayerHandle,
}

/// Geology from points and lines pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct Geology;

impl Pipeline for Geology {
    type Params = GeologyParams;
    type Outputs = GeologyOutputs;

    fn id(&self) -> &'static str {
        "geology_from_points_and_lines"
    }

    fn description(&self) -> &'static str {
        "Generate geological unit polygons and contact lines from point and line data"
    }

    fn run(
        &self,
        registry: &dyn ProcessingRegistry,
        params: Self::Params,
        feedback: &Feedback,
    ) -> Result<Outcome<Self::Outputs>> {
        geology(registry, params, feedback)
    }
}

/// Run the geological mapping workflow against a host registry.
pub fn geology(
    registry: &dyn ProcessingRegistry,
    params: GeologyParams,
    feedback: &Feedback,
) -> Result<Outcome<GeologyOutputs>> {
    params.validate()?;

    let fb = MultiStepFeedback::new(TOTAL_STEPS, feedback);
    fb.push_info(&format!(
        "Starting geological mapping (attribute field: {}, tolerance: {})",
        params.attribute_field, params.tolerance
    ));

    fb.push_info("Cleaning duplicate point geometries");
    let clean_points = delete_duplicates(registry, &params.points, &params.clean_points_output, &fb)?;
    fb.set_current_step(1);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Creating polygons from line network");
    let polygonize_params = ParamMap::new()
        .with("INPUT", params.lines.clone())
        .with("KEEP_FIELDS", true)
        .with("OUTPUT", OutputTarget::Temporary);
    let polygonized = registry.run("native:polygonize", &polygonize_params, &fb)?;
    let Some(polygonized) = polygonized.get("OUTPUT").cloned() else {
        return Err(Error::OperationFailed {
            operation: "native:polygonize".to_string(),
            message: "polygonization produced no polygons; ensure lines form closed rings without gaps"
                .to_string(),
        });
    };
    fb.set_current_step(2);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Cleaning duplicate polygon geometries");
    let polygons = delete_duplicates(registry, &polygonized, &params.polygons_output, &fb)?;
    fb.set_current_step(3);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Joining geological attributes to polygons");
    let join_params = ParamMap::new()
        .with("DISCARD_NONMATCHING", true)
        .with("INPUT", polygons.clone())
        .with("JOIN", clean_points.clone())
        .with("JOIN_FIELDS", vec![params.attribute_field.clone()])
        .with("METHOD", JOIN_METHOD_ONE_TO_MANY)
        .with("PREDICATE", vec![params.predicate.code()])
        .with("PREFIX", "")
        .with("OUTPUT", params.geological_polygons_output.clone());
    let geological_polygons = registry
        .run("native:joinattributesbylocation", &join_params, &fb)?
        .require("native:joinattributesbylocation", "OUTPUT")?;
    fb.set_current_step(4);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Converting polygons to boundary lines");
    let to_lines_params = ParamMap::new()
        .with("INPUT", geological_polygons.clone())
        .with("OUTPUT", OutputTarget::Temporary);
    let boundary_lines = registry
        .run("native:polygonstolines", &to_lines_params, &fb)?
        .require("native:polygonstolines", "OUTPUT")?;
    fb.set_current_step(5);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info(&format!(
        "Removing duplicate vertices (tolerance: {})",
        params.tolerance
    ));
    let vertices_params = ParamMap::new()
        .with("INPUT", boundary_lines)
        .with("TOLERANCE", params.tolerance)
        .with("USE_Z_VALUE", false)
        .with("OUTPUT", OutputTarget::Temporary);
    let cleaned_lines = registry
        .run("native:removeduplicatevertices", &vertices_params, &fb)?
        .require("native:removeduplicatevertices", "OUTPUT")?;
    fb.set_current_step(6);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Exploding lines into segments");
    let explode_params = ParamMap::new()
        .with("INPUT", cleaned_lines)
        .with("OUTPUT", OutputTarget::Temporary);
    let exploded = registry
        .run("native:explodelines", &explode_params, &fb)?
        .require("native:explodelines", "OUTPUT")?;
    fb.set_current_step(7);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Cleaning duplicate line segments");
    let segments = delete_duplicates(registry, &exploded, &params.segments_output, &fb)?;
    fb.set_current_step(8);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Dissolving lines by geological attribute");
    let dissolve_params = ParamMap::new()
        .with("FIELD", vec![params.attribute_field.clone()])
        .with("INPUT", segments.clone())
        .with("SEPARATE_DISJOINT", false)
        .with("OUTPUT", OutputTarget::Temporary);
    let dissolved = registry
        .run("native:dissolve", &dissolve_params, &fb)?
        .require("native:dissolve", "OUTPUT")?;
    fb.set_current_step(9);
    if fb.is_canceled() {
        return Ok(Outcome::Canceled);
    }

    fb.push_info("Converting to single-part features");
    let singlepart_params = ParamMap::new()
        .with("INPUT", dissolved)
        .with("OUTPUT", params.contacts_output.clone());
    let contacts = registry
        .run("native:multiparttosingleparts", &singlepart_params, &fb)?
        .require("native:multiparttosingleparts", "OUTPUT")?;
    fb.set_current_step(10);

    fb.push_info("Geological mapping completed");
    Ok(Outcome::Completed(GeologyOutputs {
        clean_points,
        polygons,
        segments,
        geological_polygons,
        contacts,
    }))
}

fn delete_duplicates(
    registry: &dyn ProcessingRegistry,
    input: &LayerHandle,
    output: &OutputTarget,
    fb: &Feedback,
) -> Result<LayerHandle> {
    let params = ParamMap::new()
        .with("INPUT", input.clone())
        .with("OUTPUT", output.clone());
    registry
        .run("native:deleteduplicategeometries", &params, fb)?
        .require("native:deleteduplicategeometries", "OUTPUT")
}
