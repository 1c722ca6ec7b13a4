//! # MzGIS Core
//!
//! Core types for the MzGIS geological mapping and seismic-microzonation
//! toolbox.
//!
//! This crate provides:
//! - `ProcessingRegistry`: the delegated-operation capability interface
//! - `ParamMap` / `ParamValue` / `Outputs`: parameter marshalling types
//! - `Feedback` / `MultiStepFeedback`: progress and cooperative cancellation
//! - `Feature` / `FeatureCollection`: a minimal vector feature model
//! - The `Pipeline` trait implemented by the workflow algorithms

pub mod error;
pub mod feedback;
pub mod registry;
pub mod vector;

pub use error::{Error, Result};
pub use feedback::{Feedback, MultiStepFeedback, Outcome};
pub use registry::{
    FieldSpec, LayerHandle, OutputTarget, Outputs, ParamMap, ParamValue, ProcessingRegistry,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::feedback::{Feedback, MultiStepFeedback, Outcome};
    pub use crate::registry::{
        FieldSpec, LayerHandle, OutputTarget, Outputs, ParamMap, ParamValue, ProcessingRegistry,
    };
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
    pub use crate::Pipeline;
}

/// Core trait for workflow pipelines.
///
/// A pipeline is a fixed sequence of delegated operations: it validates its
/// typed parameters, issues each operation through the injected registry,
/// checks the cancellation flag between stages, and returns the handles of
/// the layers the host wrote. Pipelines hold no state of their own.
pub trait Pipeline {
    /// Typed input parameters for the pipeline
    type Params;
    /// Output layer handles produced by a completed run
    type Outputs;

    /// Returns the internal pipeline identifier
    fn id(&self) -> &'static str;

    /// Returns a description of what the pipeline does
    fn description(&self) -> &'static str;

    /// Execute the pipeline against a host registry
    fn run(
        &self,
        registry: &dyn ProcessingRegistry,
        params: Self::Params,
        feedback: &Feedback,
    ) -> Result<Outcome<Self::Outputs>>;
}
