//! Table-driven stage rules.
//!
//! Rules are tried in table order and the first whose class precondition and
//! geometric test both hold decides the stage. A test that needs a descriptor
//! whose geometry is undefined does not hold. When nothing matches the result is
//! `Stage::StageNotDetected`, so classification never fails.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::Stage;
use crate::aggregate::ClassView;
use crate::detect::ObjectClass::{self, Oocyte, Pipette, PolarBody, Spermatozoon};
use crate::geometry::GeometricDescriptor;

/// Oocyte circularity below which a touching pipette counts as inserted.
pub const DEFAULT_CIRCULARITY_THRESHOLD: f64 = 0.85;

/// Maximum `|dx / dy|` between polar body and oocyte centroids for a
/// positioned oocyte (polar body roughly above or below the centre).
pub const POLAR_BODY_ALIGNMENT_LIMIT: f64 = 0.5;

/// Tunable parameters of the rule table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageRules {
    pub circularity_threshold: f64,
}

impl Default for StageRules {
    fn default() -> Self {
        Self {
            circularity_threshold: DEFAULT_CIRCULARITY_THRESHOLD,
        }
    }
}

impl StageRules {
    pub fn new(circularity_threshold: f64) -> Result<Self> {
        let rules = Self {
            circularity_threshold,
        };
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.circularity_threshold;
        if !t.is_finite() || t <= 0.0 || t > 2.0 {
            return Err(anyhow!(
                "circularity threshold must be in (0, 2], got {}",
                t
            ));
        }
        Ok(())
    }
}

enum Multiplicity {
    /// Any number of instances per class.
    Any,
    /// Exactly one instance of every class.
    Single,
    /// More than one instance of the given class.
    Several(ObjectClass),
}

struct Rule {
    name: &'static str,
    classes: &'static [ObjectClass],
    multiplicity: Multiplicity,
    test: fn(&ClassView, &StageRules) -> bool,
    stage: Stage,
}

impl Rule {
    fn precondition(&self, view: &ClassView) -> bool {
        if !view.has_exactly(self.classes) {
            return false;
        }
        match self.multiplicity {
            Multiplicity::Any => true,
            Multiplicity::Single => view.all_single(),
            Multiplicity::Several(class) => view.count(class) > 1,
        }
    }
}

static RULES: [Rule; 8] = [
    Rule {
        name: "sperm-selection",
        classes: &[Spermatozoon],
        multiplicity: Multiplicity::Several(Spermatozoon),
        test: always,
        stage: Stage::SpermSelection,
    },
    Rule {
        name: "sperm-collection",
        classes: &[Spermatozoon, Pipette],
        multiplicity: Multiplicity::Any,
        test: sperm_inside_pipette,
        stage: Stage::SpermCollection,
    },
    Rule {
        name: "sperm-immobilization",
        classes: &[Spermatozoon, Pipette],
        multiplicity: Multiplicity::Any,
        test: always,
        stage: Stage::SpermImmobilization,
    },
    Rule {
        name: "organelle-flow",
        classes: &[Oocyte, Spermatozoon, Pipette],
        multiplicity: Multiplicity::Single,
        test: organelle_flow,
        stage: Stage::OrganelleFlow,
    },
    Rule {
        name: "sperm-injection",
        classes: &[Oocyte, Spermatozoon, Pipette],
        multiplicity: Multiplicity::Single,
        test: sperm_injection,
        stage: Stage::SpermInjection,
    },
    Rule {
        name: "pipette-removal",
        classes: &[Oocyte, Spermatozoon, Pipette],
        multiplicity: Multiplicity::Single,
        test: pipette_removal,
        stage: Stage::PipetteRemoval,
    },
    Rule {
        name: "oocyte-positioning",
        classes: &[Oocyte, PolarBody],
        multiplicity: Multiplicity::Single,
        test: polar_body_aligned,
        stage: Stage::OocytePositioning,
    },
    Rule {
        name: "pipette-insertion",
        classes: &[Oocyte, Pipette],
        multiplicity: Multiplicity::Single,
        test: pipette_insertion,
        stage: Stage::PipetteInsertion,
    },
];

/// Assign a stage to a frame summary.
pub fn classify_view(view: &ClassView, rules: &StageRules) -> Stage {
    classify_view_traced(view, rules).0
}

/// Like `classify_view`, also naming the rule that fired.
pub fn classify_view_traced(view: &ClassView, rules: &StageRules) -> (Stage, Option<&'static str>) {
    RULES
        .iter()
        .find(|rule| rule.precondition(view) && (rule.test)(view, rules))
        .map_or((Stage::StageNotDetected, None), |rule| {
            (rule.stage, Some(rule.name))
        })
}

fn always(_: &ClassView, _: &StageRules) -> bool {
    true
}

fn sperm_inside_pipette(view: &ClassView, _: &StageRules) -> bool {
    geometry(view, &[Spermatozoon, Pipette], |d| {
        d[1].bbox.strictly_contains(&d[0].bbox)
    })
}

fn organelle_flow(view: &ClassView, _: &StageRules) -> bool {
    geometry(view, &[Oocyte, Spermatozoon, Pipette], |d| {
        let (oocyte, sperm, pipette) = (d[0], d[1], d[2]);
        f64::from(pipette.bbox.x1) < oocyte.centroid.x
            && pipette.bbox.strictly_contains(&sperm.bbox)
    })
}

fn sperm_injection(view: &ClassView, _: &StageRules) -> bool {
    geometry(view, &[Oocyte, Spermatozoon, Pipette], |d| {
        let (oocyte, sperm, pipette) = (d[0], d[1], d[2]);
        sperm.bbox.x1 < pipette.bbox.x1
            && pipette.bbox.x1 < oocyte.bbox.x2
            && sperm.bbox.y1 > oocyte.bbox.y1
    })
}

fn pipette_removal(view: &ClassView, _: &StageRules) -> bool {
    geometry(view, &[Oocyte, Spermatozoon, Pipette], |d| {
        let (oocyte, sperm, pipette) = (d[0], d[1], d[2]);
        oocyte.bbox.strictly_contains(&sperm.bbox) && pipette.bbox.x1 > oocyte.bbox.x2
    })
}

fn polar_body_aligned(view: &ClassView, _: &StageRules) -> bool {
    geometry(view, &[Oocyte, PolarBody], |d| {
        let (oocyte, polar) = (d[0], d[1]);
        let dy = polar.centroid.y - oocyte.centroid.y;
        if dy == 0.0 {
            return false;
        }
        let dx = polar.centroid.x - oocyte.centroid.x;
        (dx / dy).abs() < POLAR_BODY_ALIGNMENT_LIMIT
    })
}

fn pipette_insertion(view: &ClassView, rules: &StageRules) -> bool {
    geometry(view, &[Oocyte, Pipette], |d| {
        let (oocyte, pipette) = (d[0], d[1]);
        pipette.bbox.x1 <= oocyte.bbox.x2 && oocyte.circularity_ratio < rules.circularity_threshold
    })
}

/// Run `test` over the representatives of `classes`, in that order.
/// Any missing or undefined descriptor makes the test fail.
fn geometry(
    view: &ClassView,
    classes: &[ObjectClass],
    test: impl FnOnce(&[&GeometricDescriptor]) -> bool,
) -> bool {
    let descriptors: Option<Vec<&GeometricDescriptor>> =
        classes.iter().map(|&class| view.descriptor(class)).collect();
    descriptors.is_some_and(|d| test(&d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Centroid, UndefinedGeometry};
    use std::f64::consts::PI;

    const AREA: f64 = 100.0;

    fn desc(bbox: (u32, u32, u32, u32), centroid: (f64, f64)) -> GeometricDescriptor {
        desc_with_circularity(bbox, centroid, 0.95)
    }

    fn desc_with_circularity(
        bbox: (u32, u32, u32, u32),
        centroid: (f64, f64),
        circularity: f64,
    ) -> GeometricDescriptor {
        let perimeter = 2.0 * (PI * AREA).sqrt() / circularity;
        GeometricDescriptor::new(
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
            Centroid {
                x: centroid.0,
                y: centroid.1,
            },
            AREA,
            perimeter,
        )
        .unwrap()
    }

    fn boxed(bbox: (u32, u32, u32, u32)) -> GeometricDescriptor {
        let cx = f64::from(bbox.0 + bbox.2) / 2.0;
        let cy = f64::from(bbox.1 + bbox.3) / 2.0;
        desc(bbox, (cx, cy))
    }

    fn view(entries: &[(ObjectClass, usize, Result<GeometricDescriptor, UndefinedGeometry>)]) -> ClassView {
        let mut view = ClassView::new();
        for (class, count, representative) in entries {
            view.insert(*class, *count, *representative);
        }
        view
    }

    fn classify(v: &ClassView) -> Stage {
        classify_view(v, &StageRules::default())
    }

    #[test]
    fn default_threshold_is_pinned() {
        assert_eq!(DEFAULT_CIRCULARITY_THRESHOLD, 0.85);
        assert_eq!(StageRules::default().circularity_threshold, 0.85);
    }

    #[test]
    fn several_sperm_alone_is_selection() {
        let v = view(&[(Spermatozoon, 3, Ok(boxed((1, 1, 4, 4))))]);
        assert_eq!(classify_view_traced(&v, &StageRules::default()), (Stage::SpermSelection, Some("sperm-selection")));

        let single = view(&[(Spermatozoon, 1, Ok(boxed((1, 1, 4, 4))))]);
        assert_eq!(classify(&single), Stage::StageNotDetected);
    }

    #[test]
    fn selection_needs_no_geometry() {
        let v = view(&[(Spermatozoon, 2, Err(UndefinedGeometry::ZeroArea))]);
        assert_eq!(classify(&v), Stage::SpermSelection);
    }

    #[test]
    fn sperm_inside_pipette_is_collection() {
        let v = view(&[
            (Spermatozoon, 1, Ok(boxed((10, 10, 20, 20)))),
            (Pipette, 1, Ok(boxed((0, 0, 30, 30)))),
        ]);
        assert_eq!(classify(&v), Stage::SpermCollection);
    }

    #[test]
    fn sperm_outside_pipette_is_immobilization() {
        let v = view(&[
            (Spermatozoon, 1, Ok(boxed((5, 5, 35, 35)))),
            (Pipette, 1, Ok(boxed((0, 0, 30, 30)))),
        ]);
        assert_eq!(classify(&v), Stage::SpermImmobilization);
    }

    #[test]
    fn sperm_pipette_rules_ignore_multiplicity() {
        let v = view(&[
            (Spermatozoon, 2, Ok(boxed((10, 10, 20, 20)))),
            (Pipette, 1, Ok(boxed((0, 0, 30, 30)))),
        ]);
        assert_eq!(classify(&v), Stage::SpermCollection);
    }

    #[test]
    fn undefined_sperm_falls_through_to_immobilization() {
        let v = view(&[
            (Spermatozoon, 1, Err(UndefinedGeometry::ZeroArea)),
            (Pipette, 1, Ok(boxed((0, 0, 30, 30)))),
        ]);
        assert_eq!(classify(&v), Stage::SpermImmobilization);
    }

    #[test]
    fn aligned_polar_body_is_positioning() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((50, 50, 150, 150), (100.0, 100.0)))),
            (PolarBody, 1, Ok(desc((105, 135, 115, 145), (110.0, 140.0)))),
        ]);
        assert_eq!(classify(&v), Stage::OocytePositioning);
    }

    #[test]
    fn sideways_polar_body_is_not_detected() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((50, 50, 150, 150), (100.0, 100.0)))),
            (PolarBody, 1, Ok(desc((145, 135, 155, 145), (150.0, 140.0)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn level_polar_body_is_not_detected() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((50, 50, 150, 150), (100.0, 100.0)))),
            (PolarBody, 1, Ok(desc((95, 95, 105, 105), (100.0, 100.0)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn positioning_requires_single_instances() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((50, 50, 150, 150), (100.0, 100.0)))),
            (PolarBody, 2, Ok(desc((105, 135, 115, 145), (110.0, 140.0)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn pipette_reaching_oocyte_is_organelle_flow() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((100, 100, 200, 200), (150.0, 150.0)))),
            (Spermatozoon, 1, Ok(boxed((130, 145, 160, 155)))),
            (Pipette, 1, Ok(boxed((120, 140, 300, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::OrganelleFlow);
    }

    #[test]
    fn sperm_ahead_of_pipette_is_injection() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((100, 100, 200, 200), (150.0, 150.0)))),
            (Spermatozoon, 1, Ok(boxed((150, 145, 165, 155)))),
            (Pipette, 1, Ok(boxed((170, 140, 300, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::SpermInjection);
    }

    #[test]
    fn withdrawn_pipette_is_removal() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((100, 100, 200, 200), (150.0, 150.0)))),
            (Spermatozoon, 1, Ok(boxed((140, 140, 150, 150)))),
            (Pipette, 1, Ok(boxed((220, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::PipetteRemoval);
    }

    #[test]
    fn three_class_frame_without_match_is_not_detected() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((100, 100, 200, 200), (150.0, 150.0)))),
            (Spermatozoon, 1, Ok(boxed((10, 10, 20, 20)))),
            (Pipette, 1, Ok(boxed((220, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn three_class_rules_require_single_instances() {
        let v = view(&[
            (Oocyte, 1, Ok(desc((100, 100, 200, 200), (150.0, 150.0)))),
            (Spermatozoon, 2, Ok(boxed((140, 140, 150, 150)))),
            (Pipette, 1, Ok(boxed((220, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn undefined_oocyte_blocks_three_class_rules() {
        let v = view(&[
            (Oocyte, 1, Err(UndefinedGeometry::ZeroPerimeter)),
            (Spermatozoon, 1, Ok(boxed((130, 145, 160, 155)))),
            (Pipette, 1, Ok(boxed((120, 140, 300, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn deformed_oocyte_with_pipette_is_insertion() {
        let v = view(&[
            (Oocyte, 1, Ok(desc_with_circularity((100, 100, 200, 200), (150.0, 150.0), 0.70))),
            (Pipette, 1, Ok(boxed((190, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::PipetteInsertion);
    }

    #[test]
    fn round_oocyte_with_pipette_is_not_detected() {
        let v = view(&[
            (Oocyte, 1, Ok(desc_with_circularity((100, 100, 200, 200), (150.0, 150.0), 0.95))),
            (Pipette, 1, Ok(boxed((190, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn distant_pipette_is_not_insertion() {
        let v = view(&[
            (Oocyte, 1, Ok(desc_with_circularity((100, 100, 200, 200), (150.0, 150.0), 0.70))),
            (Pipette, 1, Ok(boxed((201, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::StageNotDetected);
    }

    #[test]
    fn circularity_threshold_is_configurable() {
        let v = view(&[
            (Oocyte, 1, Ok(desc_with_circularity((100, 100, 200, 200), (150.0, 150.0), 0.82))),
            (Pipette, 1, Ok(boxed((200, 140, 400, 160)))),
        ]);
        assert_eq!(classify(&v), Stage::PipetteInsertion);
        let strict = StageRules::new(0.80).unwrap();
        assert_eq!(classify_view(&v, &strict), Stage::StageNotDetected);
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        assert!(StageRules::new(0.0).is_err());
        assert!(StageRules::new(f64::INFINITY).is_err());
        assert!(StageRules::new(2.5).is_err());
        assert!(StageRules::new(0.8).is_ok());
    }

    #[test]
    fn every_class_combination_yields_a_stable_stage() {
        let shapes = [Ok(boxed((10, 10, 20, 20))), Err(UndefinedGeometry::EmptyMask)];
        for subset in 0u8..16 {
            for count in 1..=2 {
                for shape in &shapes {
                    let mut v = ClassView::new();
                    for (bit, class) in ObjectClass::ALL.iter().enumerate() {
                        if subset & (1 << bit) != 0 {
                            v.insert(*class, count, *shape);
                        }
                    }
                    let first = classify(&v);
                    assert!(Stage::ALL.contains(&first));
                    assert_eq!(classify(&v), first);
                }
            }
        }
    }

    #[test]
    fn empty_frame_is_not_detected() {
        assert_eq!(classify(&ClassView::new()), Stage::StageNotDetected);
    }
}
