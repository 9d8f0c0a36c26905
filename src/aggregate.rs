//! Per-frame class summary.
//!
//! Only the first instance of each class (in detection order) is described.
//! Further instances of the same class are counted but not measured; the stage
//! rules rely on counts for multiplicity and on the representative for geometry.

use std::collections::{BTreeMap, BTreeSet};

use crate::detect::{DetectionResult, ObjectClass};
use crate::geometry::{describe, GeometricDescriptor, UndefinedGeometry};

/// One present class: how many instances and the first one's geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassEntry {
    pub count: usize,
    pub representative: Result<GeometricDescriptor, UndefinedGeometry>,
}

/// Present classes of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassView {
    entries: BTreeMap<ObjectClass, ClassEntry>,
}

impl ClassView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `class`. A zero count removes it.
    pub fn insert(
        &mut self,
        class: ObjectClass,
        count: usize,
        representative: Result<GeometricDescriptor, UndefinedGeometry>,
    ) {
        if count == 0 {
            self.entries.remove(&class);
            return;
        }
        self.entries.insert(
            class,
            ClassEntry {
                count,
                representative,
            },
        );
    }

    pub fn get(&self, class: ObjectClass) -> Option<&ClassEntry> {
        self.entries.get(&class)
    }

    pub fn count(&self, class: ObjectClass) -> usize {
        self.entries.get(&class).map_or(0, |e| e.count)
    }

    /// Representative descriptor, if the class is present and its geometry defined.
    pub fn descriptor(&self, class: ObjectClass) -> Option<&GeometricDescriptor> {
        self.entries
            .get(&class)
            .and_then(|e| e.representative.as_ref().ok())
    }

    pub fn distinct_classes(&self) -> BTreeSet<ObjectClass> {
        self.entries.keys().copied().collect()
    }

    /// True when the present classes are exactly `classes`.
    pub fn has_exactly(&self, classes: &[ObjectClass]) -> bool {
        self.entries.len() == classes.len() && classes.iter().all(|c| self.entries.contains_key(c))
    }

    /// True when every present class has a single instance.
    pub fn all_single(&self) -> bool {
        self.entries.values().all(|e| e.count == 1)
    }

    pub fn total_instances(&self) -> usize {
        self.entries.values().map(|e| e.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectClass, &ClassEntry)> {
        self.entries.iter().map(|(class, entry)| (*class, entry))
    }
}

/// Group a frame's instances by class and describe each class's first instance.
pub fn aggregate(detection: &DetectionResult) -> ClassView {
    let mut view = ClassView::new();
    for instance in detection.instances() {
        match view.entries.get_mut(&instance.class) {
            Some(entry) => entry.count += 1,
            None => {
                view.entries.insert(
                    instance.class,
                    ClassEntry {
                        count: 1,
                        representative: describe(&instance.mask),
                    },
                );
            }
        }
    }
    view
}
