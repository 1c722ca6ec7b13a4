//! Lateral-spreading zone classification.
//!
//! The only host-independent logic in the toolbox: an ordered table of
//! threshold rules over (liquefaction index, slope percent) pairs. Each rule
//! carries two half-open-below intervals; a feature matches a rule when both
//! memberships hold. The classifier returns every matching rule in table
//! order, so an overlapping table legitimately yields several output records
//! over the same geometry. The shipped table is mutually exclusive by
//! construction, but the classifier does not assume it.

use serde::{Deserialize, Serialize};

use mzgis_core::vector::{AttributeValue, Feature, FeatureCollection};
use mzgis_core::{Error, Feedback, Result};

/// Severity class of a lateral-spreading zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneCategory {
    /// Low susceptibility zones (Z0)
    LowSusceptibility,
    /// Susceptibility zones (SZ)
    Susceptibility,
    /// Respect zones (RZ)
    Respect,
}

impl ZoneCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LowSusceptibility => "Z0",
            Self::Susceptibility => "SZ",
            Self::Respect => "RZ",
        }
    }
}

/// Half-open-below interval `(min, max]`. An absent bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Interval {
    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Membership test. NaN and infinities fail the comparisons and
    /// therefore never belong to a bounded interval.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.min {
            Some(lo) => value > lo,
            None => true,
        };
        let below = match self.max {
            Some(hi) => value <= hi,
            None => true,
        };
        above && below
    }

    /// A rule interval must constrain its variable on at least one side.
    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// SQL-style range condition over `field`, for delegated extraction.
    fn condition(&self, field: &str) -> String {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => {
                format!("(\"{field}\" > {lo} AND \"{field}\" <= {hi})")
            }
            (Some(lo), None) => format!("\"{field}\" > {lo}"),
            (None, Some(hi)) => format!("\"{field}\" <= {hi}"),
            (None, None) => String::new(),
        }
    }

    /// Human-readable rendering, e.g. `0 < IL ≤ 2` or `Slope% > 15`.
    fn describe(&self, name: &str) -> String {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => format!("{lo} < {name} ≤ {hi}"),
            (Some(lo), None) => format!("{name} > {lo}"),
            (None, Some(hi)) => format!("{name} ≤ {hi}"),
            (None, None) => name.to_string(),
        }
    }
}

/// One row of the zone classification table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneRule {
    /// Unique numeric zone code
    pub code: u32,
    pub category: ZoneCategory,
    /// Liquefaction index range
    pub index: Interval,
    /// Slope percentage range
    pub slope: Interval,
    /// Shipped formula text, written to the `formula` output attribute
    pub formula: &'static str,
}

impl ZoneRule {
    /// Conjunctive membership test over both ranges.
    pub fn matches(&self, index: f64, slope: f64) -> bool {
        self.index.contains(index) && self.slope.contains(slope)
    }

    /// Extraction expression for the delegated expression engine, e.g.
    /// `("INDEX" > 0 AND "INDEX" <= 2) AND "DN" > 15`.
    pub fn expression(&self, index_field: &str, slope_field: &str) -> String {
        let mut conditions = Vec::new();
        if self.index.is_bounded() {
            conditions.push(self.index.condition(index_field));
        }
        if self.slope.is_bounded() {
            conditions.push(self.slope.condition(slope_field));
        }
        if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        }
    }

    /// Human-readable description of the rule criteria, for audit output.
    pub fn description(&self) -> String {
        format!(
            "{}: {} and {}",
            self.category.label(),
            self.index.describe("IL"),
            self.slope.describe("Slope%")
        )
    }
}

/// Canonical zone table for the lateral-spreading workflow.
///
/// Codes 101-104 are respect zones, 201-203 susceptibility zones, 300 the
/// low-susceptibility zone. The ranges partition the (IL, slope) domain for
/// IL > 0 and slope > 2; values outside match nothing and are dropped.
pub const LATERAL_SPREADING_RULES: [ZoneRule; 8] = [
    ZoneRule {
        code: 101,
        category: ZoneCategory::Respect,
        index: Interval::new(Some(0.0), Some(2.0)),
        slope: Interval::new(Some(15.0), None),
        formula: "RZ=(0<IL≤2) and (slope>15)",
    },
    ZoneRule {
        code: 102,
        category: ZoneCategory::Respect,
        index: Interval::new(Some(2.0), Some(5.0)),
        slope: Interval::new(Some(5.0), None),
        formula: "RZ=(2<IL≤5) and (slope>5)",
    },
    ZoneRule {
        code: 103,
        category: ZoneCategory::Respect,
        index: Interval::new(Some(5.0), Some(15.0)),
        slope: Interval::new(Some(5.0), None),
        formula: "RZ=(5<IL≤15) and (slope>5)",
    },
    ZoneRule {
        code: 104,
        category: ZoneCategory::Respect,
        index: Interval::new(Some(15.0), None),
        slope: Interval::new(Some(2.0), None),
        formula: "RZ=(IL>15) and (slope>2)",
    },
    ZoneRule {
        code: 201,
        category: ZoneCategory::Susceptibility,
        index: Interval::new(Some(0.0), Some(2.0)),
        slope: Interval::new(Some(5.0), Some(15.0)),
        formula: "SZ=(0<IL≤2) and (5<slope≤15)",
    },
    ZoneRule {
        code: 202,
        category: ZoneCategory::Susceptibility,
        index: Interval::new(Some(2.0), Some(5.0)),
        slope: Interval::new(Some(2.0), Some(5.0)),
        formula: "SZ=(2<IL≤5) and (2<slope≤5)",
    },
    ZoneRule {
        code: 203,
        category: ZoneCategory::Susceptibility,
        index: Interval::new(Some(5.0), Some(15.0)),
        slope: Interval::new(Some(2.0), Some(5.0)),
        formula: "SZ=(5<IL≤15) and (2<slope≤5)",
    },
    ZoneRule {
        code: 300,
        category: ZoneCategory::LowSusceptibility,
        index: Interval::new(Some(0.0), Some(2.0)),
        slope: Interval::new(Some(2.0), Some(5.0)),
        formula: "Z0=(0<IL≤2) and (2<slope≤5)",
    },
];

/// Validate a rule table: unique codes, every interval bounded on at least
/// one side. Pipelines run this before using a table.
pub fn validate_rules(rules: &[ZoneRule]) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for rule in rules {
        if !rule.index.is_bounded() {
            return Err(Error::InvalidRule(format!(
                "rule {} does not constrain the liquefaction index",
                rule.code
            )));
        }
        if !rule.slope.is_bounded() {
            return Err(Error::InvalidRule(format!(
                "rule {} does not constrain the slope",
                rule.code
            )));
        }
        if !seen.insert(rule.code) {
            return Err(Error::InvalidRule(format!("duplicate zone code {}", rule.code)));
        }
    }
    Ok(())
}

/// Classify an (index, slope) pair against a rule table.
///
/// Returns every matching rule in table order. No match is a legitimate,
/// silently-droppable outcome; non-finite inputs match nothing. The function
/// is pure: same inputs and table always yield the same result.
pub fn classify<'r>(index: f64, slope: f64, rules: &'r [ZoneRule]) -> Vec<&'r ZoneRule> {
    rules.iter().filter(|rule| rule.matches(index, slope)).collect()
}

/// Classify a feature collection already annotated with index and slope
/// attributes, without going through the host expression engine.
///
/// Output features carry exactly `{fid, code, formula}`. A feature with a
/// missing or non-numeric attribute is reported through the feedback object
/// and skipped (non-fatal); a feature matching no rule is dropped silently.
pub fn classify_features(
    input: &FeatureCollection,
    index_field: &str,
    slope_field: &str,
    rules: &[ZoneRule],
    feedback: &Feedback,
) -> FeatureCollection {
    let mut out = FeatureCollection::new();
    let mut fid: i64 = 1;

    for (position, feature) in input.iter().enumerate() {
        let index = feature.numeric_property(index_field);
        let slope = feature.numeric_property(slope_field);
        let (Some(index), Some(slope)) = (index, slope) else {
            feedback.push_warning(&format!(
                "feature {position}: missing or non-numeric '{index_field}' or '{slope_field}' value, skipped"
            ));
            continue;
        };

        for rule in classify(index, slope, rules) {
            let mut classified = match &feature.geometry {
                Some(geometry) => Feature::new(geometry.clone()),
                None => Feature::empty(),
            };
            classified.id = Some(fid);
            classified.set_property("code", AttributeValue::Int(rule.code as i64));
            classified.set_property("formula", AttributeValue::String(rule.formula.to_string()));
            out.push(classified);
            fid += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Geometry};

    fn codes(matches: &[&ZoneRule]) -> Vec<u32> {
        matches.iter().map(|r| r.code).collect()
    }

    #[test]
    fn test_shipped_table_is_valid() {
        validate_rules(&LATERAL_SPREADING_RULES).unwrap();
    }

    #[test]
    fn test_shipped_table_is_mutually_exclusive() {
        // Sample a fine grid over the plausible domain; no point may match
        // more than one rule.
        let mut v = 0.0;
        let mut samples = Vec::new();
        while v <= 100.0 {
            samples.push(v);
            v += 0.25;
        }
        for &index in &samples {
            for &slope in &samples {
                let matches = classify(index, slope, &LATERAL_SPREADING_RULES);
                assert!(
                    matches.len() <= 1,
                    "({index}, {slope}) matched {:?}",
                    codes(&matches)
                );
            }
        }
    }

    #[test]
    fn test_boundary_slope_belongs_to_upper_bound() {
        // slope = 15 is included by rule 201's (5, 15] and excluded by rule
        // 101's slope > 15.
        assert_eq!(codes(&classify(1.5, 15.0, &LATERAL_SPREADING_RULES)), vec![201]);
        assert_eq!(codes(&classify(1.5, 15.0001, &LATERAL_SPREADING_RULES)), vec![101]);
    }

    #[test]
    fn test_low_susceptibility_match() {
        let matches = classify(1.0, 3.0, &LATERAL_SPREADING_RULES);
        assert_eq!(codes(&matches), vec![300]);
        assert_eq!(matches[0].category, ZoneCategory::LowSusceptibility);
    }

    #[test]
    fn test_high_index_respect_match() {
        let matches = classify(20.0, 3.0, &LATERAL_SPREADING_RULES);
        assert_eq!(codes(&matches), vec![104]);
        assert_eq!(matches[0].category, ZoneCategory::Respect);
    }

    #[test]
    fn test_zero_index_matches_nothing() {
        // Every rule requires index strictly greater than its lower bound.
        assert!(classify(0.0, 3.0, &LATERAL_SPREADING_RULES).is_empty());
    }

    #[test]
    fn test_unbounded_ranges_accept_large_values() {
        // Absent upper bound means unbounded, not zero.
        assert_eq!(codes(&classify(1.5, 1e9, &LATERAL_SPREADING_RULES)), vec![101]);
        assert_eq!(codes(&classify(1e9, 3.0, &LATERAL_SPREADING_RULES)), vec![104]);
    }

    #[test]
    fn test_non_finite_inputs_match_nothing() {
        assert!(classify(f64::NAN, 10.0, &LATERAL_SPREADING_RULES).is_empty());
        assert!(classify(1.0, f64::NAN, &LATERAL_SPREADING_RULES).is_empty());
        assert!(classify(f64::INFINITY, f64::INFINITY, &LATERAL_SPREADING_RULES).is_empty());
        assert!(classify(1.0, f64::NEG_INFINITY, &LATERAL_SPREADING_RULES).is_empty());
    }

    #[test]
    fn test_classify_is_referentially_transparent() {
        let first = codes(&classify(3.0, 4.0, &LATERAL_SPREADING_RULES));
        for _ in 0..10 {
            assert_eq!(codes(&classify(3.0, 4.0, &LATERAL_SPREADING_RULES)), first);
        }
        assert_eq!(first, vec![202]);
    }

    #[test]
    fn test_overlapping_table_yields_every_match_in_order() {
        let overlapping = [
            ZoneRule {
                code: 1,
                category: ZoneCategory::Susceptibility,
                index: Interval::new(Some(0.0), Some(10.0)),
                slope: Interval::new(Some(0.0), None),
                formula: "a",
            },
            ZoneRule {
                code: 2,
                category: ZoneCategory::Respect,
                index: Interval::new(Some(5.0), None),
                slope: Interval::new(Some(0.0), None),
                formula: "b",
            },
        ];
        assert_eq!(codes(&classify(7.0, 1.0, &overlapping)), vec![1, 2]);
    }

    #[test]
    fn test_validate_rejects_duplicate_codes() {
        let rules = [
            LATERAL_SPREADING_RULES[0].clone(),
            LATERAL_SPREADING_RULES[0].clone(),
        ];
        let err = validate_rules(&rules).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_unconstrained_interval() {
        let rules = [ZoneRule {
            code: 9,
            category: ZoneCategory::Respect,
            index: Interval::new(None, None),
            slope: Interval::new(Some(2.0), None),
            formula: "x",
        }];
        assert!(validate_rules(&rules).is_err());
    }

    #[test]
    fn test_extraction_expression() {
        assert_eq!(
            LATERAL_SPREADING_RULES[0].expression("INDEX", "DN"),
            "(\"INDEX\" > 0 AND \"INDEX\" <= 2) AND \"DN\" > 15"
        );
        assert_eq!(
            LATERAL_SPREADING_RULES[3].expression("INDEX", "DN"),
            "\"INDEX\" > 15 AND \"DN\" > 2"
        );
    }

    #[test]
    fn test_rule_description() {
        assert_eq!(
            LATERAL_SPREADING_RULES[0].description(),
            "RZ: 0 < IL ≤ 2 and Slope% > 15"
        );
        assert_eq!(
            LATERAL_SPREADING_RULES[7].description(),
            "Z0: 0 < IL ≤ 2 and 2 < Slope% ≤ 5"
        );
    }

    fn square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ])
    }

    fn annotated(il: AttributeValue, dn: AttributeValue) -> Feature {
        let mut feature = Feature::new(square());
        feature.set_property("INDEX", il);
        feature.set_property("DN", dn);
        feature
    }

    #[test]
    fn test_classify_features_attaches_fid_code_formula() {
        let mut input = FeatureCollection::new();
        input.push(annotated(AttributeValue::Float(1.0), AttributeValue::Float(3.0)));
        input.push(annotated(AttributeValue::Float(20.0), AttributeValue::Int(3)));

        let out = classify_features(
            &input,
            "INDEX",
            "DN",
            &LATERAL_SPREADING_RULES,
            &Feedback::new(),
        );

        assert_eq!(out.len(), 2);
        assert_eq!(out.features[0].id, Some(1));
        assert_eq!(
            out.features[0].get_property("code"),
            Some(&AttributeValue::Int(300))
        );
        assert_eq!(out.features[1].id, Some(2));
        assert_eq!(
            out.features[1].get_property("code"),
            Some(&AttributeValue::Int(104))
        );
        assert_eq!(
            out.features[1].get_property("formula"),
            Some(&AttributeValue::String("RZ=(IL>15) and (slope>2)".into()))
        );
        // Only fid/code/formula on the output schema.
        assert_eq!(out.features[0].properties.len(), 2);
        assert!(out.features[0].geometry.is_some());
    }

    #[test]
    fn test_classify_features_skips_invalid_and_unmatched() {
        let mut input = FeatureCollection::new();
        // Non-numeric index: reported and skipped.
        input.push(annotated(
            AttributeValue::String("n/a".into()),
            AttributeValue::Float(3.0),
        ));
        // No rule matches index 0: dropped silently.
        input.push(annotated(AttributeValue::Float(0.0), AttributeValue::Float(3.0)));
        // Valid match.
        input.push(annotated(AttributeValue::Float(1.0), AttributeValue::Float(3.0)));

        let out = classify_features(
            &input,
            "INDEX",
            "DN",
            &LATERAL_SPREADING_RULES,
            &Feedback::new(),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out.features[0].id, Some(1));
    }
}
