//! Delegated-operation capability interface.
//!
//! All geometry and raster work (polygonize, dissolve, slope, watershed
//! routing, smoothing, ...) is supplied by a host algorithm registry and
//! invoked by name with a mapping of named parameters. This module defines
//! that narrow boundary: layer handles, tagged parameter values, the output
//! map and the [`ProcessingRegistry`] trait pipelines are written against.
//! Injecting a stub registry makes every pipeline testable without a host.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feedback::Feedback;

/// Opaque identifier for a layer or raster owned by the host.
///
/// Pipelines never look inside a handle; they only thread it from one
/// delegated operation to the next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerHandle(String);

impl LayerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination for an operation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Host-managed scratch destination.
    Temporary,
    /// Named destination (file path or sink identifier) managed by the host.
    Named(String),
}

impl OutputTarget {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary => f.write_str("TEMPORARY_OUTPUT"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// One entry of a `FIELDS_MAPPING` parameter.
///
/// `type_code` uses the host's field type codes (4 = integer, 6 = double,
/// 10 = text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub expression: String,
    pub name: String,
    pub type_code: i64,
    pub length: i64,
    pub precision: i64,
}

impl FieldSpec {
    pub fn new(expression: impl Into<String>, name: impl Into<String>, type_code: i64) -> Self {
        Self {
            expression: expression.into(),
            name: name.into(),
            type_code,
            length: 0,
            precision: 0,
        }
    }

    pub fn with_length(mut self, length: i64) -> Self {
        self.length = length;
        self
    }
}

/// Tagged value for a delegated-operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Layer(LayerHandle),
    Layers(Vec<LayerHandle>),
    Float(f64),
    Int(i64),
    IntList(Vec<i64>),
    Bool(bool),
    Text(String),
    TextList(Vec<String>),
    Fields(Vec<FieldSpec>),
    Destination(OutputTarget),
    Null,
}

impl ParamValue {
    pub fn as_layer(&self) -> Option<&LayerHandle> {
        match self {
            Self::Layer(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<LayerHandle> for ParamValue {
    fn from(v: LayerHandle) -> Self {
        Self::Layer(v)
    }
}

impl From<Vec<LayerHandle>> for ParamValue {
    fn from(v: Vec<LayerHandle>) -> Self {
        Self::Layers(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntList(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

impl From<Vec<FieldSpec>> for ParamValue {
    fn from(v: Vec<FieldSpec>) -> Self {
        Self::Fields(v)
    }
}

impl From<OutputTarget> for ParamValue {
    fn from(v: OutputTarget) -> Self {
        Self::Destination(v)
    }
}

/// Name to value mapping passed to a delegated operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chaining setter for building a parameter map in place.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Named layer handles returned by a delegated operation.
///
/// An operation that legitimately produced nothing (e.g. an extraction that
/// matched no features) simply omits the key; callers for which "empty" is a
/// first-class outcome use [`Outputs::get`], everyone else uses
/// [`Outputs::require`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs(BTreeMap<String, LayerHandle>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, handle: LayerHandle) {
        self.0.insert(key.into(), handle);
    }

    pub fn get(&self, key: &str) -> Option<&LayerHandle> {
        self.0.get(key)
    }

    /// Returns the handle under `key` or a [`Error::MissingOutput`] naming
    /// the operation that should have produced it.
    pub fn require(&self, operation: &str, key: &'static str) -> Result<LayerHandle> {
        self.0.get(key).cloned().ok_or_else(|| Error::MissingOutput {
            operation: operation.to_string(),
            key,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Host algorithm registry: run a named operation with a parameter mapping.
///
/// Implementations execute synchronously, report progress and honor
/// cancellation through the shared feedback object, and return
/// [`Error::OperationFailed`] when the operation cannot produce output.
pub trait ProcessingRegistry {
    fn run(&self, operation: &str, params: &ParamMap, feedback: &Feedback) -> Result<Outputs>;
}
