//! The flattened item sequence of one test session.
//!
//! A [`Route`] is built once per session by running selection and ordering
//! over every section of every test part. Its order never changes
//! afterwards; navigation only moves a position over it.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use qti_core::{
    AssessmentItemRef, AssessmentSection, AssessmentTest, Expression, ItemSessionControl,
    SectionPart, TestPart, TimeLimits,
};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{NavigationError, SelectionError};
use crate::selection::{expand_section, CategoryFilter};

/// One (item, occurrence) position of the route.
#[derive(Debug, Clone)]
pub struct RouteItem {
    pub item_ref: Arc<AssessmentItemRef>,
    /// 1-based; above 1 only when selection with replacement picked the
    /// item more than once.
    pub occurrence: usize,
    pub test_part: Arc<TestPart>,
    /// Enclosing sections, outermost first.
    pub sections: Vec<Arc<AssessmentSection>>,
    /// Identifiers of `sections`, in the same order.
    pub section_ids: Vec<String>,
}

impl RouteItem {
    pub fn identifier(&self) -> &str {
        &self.item_ref.identifier
    }

    /// `ITEM.k`, unique within the route.
    pub fn key(&self) -> String {
        format!("{}.{}", self.item_ref.identifier, self.occurrence)
    }

    pub fn in_section(&self, section: &str) -> bool {
        self.section_ids.iter().any(|s| s == section)
    }

    /// The nearest item session control: the item reference's own, then
    /// the enclosing sections innermost first, then the test part's.
    pub fn session_control(&self) -> ItemSessionControl {
        self.item_ref
            .item_session_control
            .as_ref()
            .or_else(|| {
                self.sections
                    .iter()
                    .rev()
                    .find_map(|s| s.item_session_control.as_ref())
            })
            .or(self.test_part.item_session_control.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Every pre-condition guarding entry: test part, sections outermost
    /// first, then the item.
    pub fn pre_conditions(&self) -> impl Iterator<Item = &Expression> {
        self.test_part
            .pre_conditions
            .iter()
            .chain(self.sections.iter().flat_map(|s| s.pre_conditions.iter()))
            .chain(self.item_ref.pre_conditions.iter())
    }

    /// Time limits of the test part, sections and item, outermost first,
    /// each with the identifier of its component.
    pub fn time_limits(&self) -> Vec<(&str, &TimeLimits)> {
        let mut limits = Vec::new();
        if let Some(l) = &self.test_part.time_limits {
            limits.push((self.test_part.identifier.as_str(), l));
        }
        for s in &self.sections {
            if let Some(l) = &s.time_limits {
                limits.push((s.identifier.as_str(), l));
            }
        }
        if let Some(l) = &self.item_ref.time_limits {
            limits.push((self.item_ref.identifier.as_str(), l));
        }
        limits
    }
}

/// Serializable shape of one route position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub test_part: String,
    pub sections: Vec<String>,
    pub item: String,
}

#[derive(Debug, Clone, Default)]
pub struct Route {
    items: Vec<RouteItem>,
}

impl Route {
    /// Select and order every section of `test`.
    pub fn build(test: &AssessmentTest, rng: &mut StdRng) -> Result<Route, SelectionError> {
        let mut placed = Vec::new();
        for part in &test.test_parts {
            for section in &part.sections {
                let expanded = expand_section(section, &CategoryFilter::default(), rng)?;
                for (item_ref, sections) in expanded.items {
                    placed.push((item_ref, Arc::clone(part), sections));
                }
            }
        }
        Ok(Route::from_placed(placed))
    }

    fn from_placed(
        placed: Vec<(Arc<AssessmentItemRef>, Arc<TestPart>, Vec<Arc<AssessmentSection>>)>,
    ) -> Route {
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        let items = placed
            .into_iter()
            .map(|(item_ref, test_part, sections)| {
                let occurrence = seen.entry(item_ref.identifier.clone()).or_insert(0);
                *occurrence += 1;
                RouteItem {
                    occurrence: *occurrence,
                    section_ids: sections.iter().map(|s| s.identifier.clone()).collect(),
                    item_ref,
                    test_part,
                    sections,
                }
            })
            .collect();
        Route { items }
    }

    /// Rebuild a route from its serialized shape.
    pub fn from_entries(
        test: &AssessmentTest,
        entries: &[RouteEntry],
    ) -> Result<Route, NavigationError> {
        let mismatch = |message: String| NavigationError::SnapshotMismatch { message };
        let mut placed = Vec::with_capacity(entries.len());
        for entry in entries {
            let part = test
                .test_parts
                .iter()
                .find(|p| p.identifier == entry.test_part)
                .ok_or_else(|| mismatch(format!("no test part '{}'", entry.test_part)))?;

            let mut path: Vec<Arc<AssessmentSection>> = Vec::new();
            for id in &entry.sections {
                let next = match path.last() {
                    None => part.sections.iter().find(|s| &s.identifier == id).cloned(),
                    Some(parent) => parent.children.iter().find_map(|c| match c {
                        SectionPart::Section(s) if &s.identifier == id => Some(Arc::clone(s)),
                        _ => None,
                    }),
                };
                let next = next.ok_or_else(|| mismatch(format!("no section '{}'", id)))?;
                path.push(next);
            }

            let item_ref = path
                .last()
                .and_then(|s| {
                    s.children.iter().find_map(|c| match c {
                        SectionPart::Item(i) if i.identifier == entry.item => Some(Arc::clone(i)),
                        _ => None,
                    })
                })
                .ok_or_else(|| mismatch(format!("no item reference '{}'", entry.item)))?;
            placed.push((item_ref, Arc::clone(part), path));
        }
        Ok(Route::from_placed(placed))
    }

    pub fn entries(&self) -> Vec<RouteEntry> {
        self.items
            .iter()
            .map(|i| RouteEntry {
                test_part: i.test_part.identifier.clone(),
                sections: i.section_ids.clone(),
                item: i.item_ref.identifier.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&RouteItem> {
        self.items.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteItem> {
        self.items.iter()
    }

    /// Positions belonging to the test part at `position`.
    pub fn part_range(&self, position: usize) -> Range<usize> {
        let Some(part) = self.items.get(position).map(|i| &i.test_part.identifier) else {
            return position..position;
        };
        self.run_around(position, |i| &i.test_part.identifier == part)
    }

    /// The contiguous positions around `position` inside `section`.
    pub fn section_range(&self, position: usize, section: &str) -> Option<Range<usize>> {
        if !self.items.get(position)?.in_section(section) {
            return None;
        }
        Some(self.run_around(position, |i| i.in_section(section)))
    }

    fn run_around(&self, position: usize, member: impl Fn(&RouteItem) -> bool) -> Range<usize> {
        let mut start = position;
        while start > 0 && member(&self.items[start - 1]) {
            start -= 1;
        }
        let mut end = position + 1;
        while end < self.items.len() && member(&self.items[end]) {
            end += 1;
        }
        start..end
    }

    /// First position of the test part `identifier`.
    pub fn first_of_part(&self, identifier: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.test_part.identifier == identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::{AssessmentItem, NavigationMode, Selection, SubmissionMode};
    use rand::SeedableRng;

    fn item(id: &str) -> AssessmentItemRef {
        AssessmentItemRef::new(id, Arc::new(AssessmentItem::new(id)))
    }

    fn test() -> AssessmentTest {
        let p1 = TestPart::new("P1", NavigationMode::Linear, SubmissionMode::Individual)
            .with_section(
                AssessmentSection::new("S1")
                    .with_item(item("A"))
                    .with_section(AssessmentSection::new("S1a").with_item(item("B"))),
            );
        let p2 = TestPart::new("P2", NavigationMode::NonLinear, SubmissionMode::Individual)
            .with_section(AssessmentSection::new("S2").with_item(item("C")));
        AssessmentTest::new("T").with_part(p1).with_part(p2)
    }

    #[test]
    fn routes_flatten_parts_and_sections() {
        let mut rng = StdRng::seed_from_u64(1);
        let route = Route::build(&test(), &mut rng).unwrap();
        let ids: Vec<_> = route.iter().map(RouteItem::identifier).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(route.get(1).unwrap().section_ids, vec!["S1", "S1a"]);
        assert_eq!(route.part_range(0), 0..2);
        assert_eq!(route.part_range(2), 2..3);
        assert_eq!(route.section_range(1, "S1a"), Some(1..2));
        assert_eq!(route.first_of_part("P2"), Some(2));
    }

    #[test]
    fn replacement_numbers_occurrences() {
        let section = AssessmentSection::new("S")
            .with_item(item("A"))
            .with_selection(Selection::new(3).with_replacement());
        let test = AssessmentTest::new("T").with_part(
            TestPart::new("P", NavigationMode::Linear, SubmissionMode::Individual)
                .with_section(section),
        );
        let mut rng = StdRng::seed_from_u64(1);
        let route = Route::build(&test, &mut rng).unwrap();
        let keys: Vec<_> = route.iter().map(RouteItem::key).collect();
        assert_eq!(keys, vec!["A.1", "A.2", "A.3"]);
    }

    #[test]
    fn entries_rebuild_the_same_route() {
        let test = test();
        let mut rng = StdRng::seed_from_u64(1);
        let route = Route::build(&test, &mut rng).unwrap();
        let rebuilt = Route::from_entries(&test, &route.entries()).unwrap();
        assert_eq!(rebuilt.entries(), route.entries());

        let bad = vec![RouteEntry {
            test_part: "P1".to_string(),
            sections: vec!["S9".to_string()],
            item: "A".to_string(),
        }];
        assert!(matches!(
            Route::from_entries(&test, &bad),
            Err(NavigationError::SnapshotMismatch { .. })
        ));
    }

    #[test]
    fn session_control_is_inherited() {
        let control = ItemSessionControl {
            max_attempts: 3,
            ..ItemSessionControl::default()
        };
        let part = TestPart::new("P", NavigationMode::Linear, SubmissionMode::Individual)
            .with_session_control(control)
            .with_section(AssessmentSection::new("S").with_item(item("A")));
        let test = AssessmentTest::new("T").with_part(part);
        let mut rng = StdRng::seed_from_u64(1);
        let route = Route::build(&test, &mut rng).unwrap();
        assert_eq!(route.get(0).unwrap().session_control().max_attempts, 3);
    }
}
