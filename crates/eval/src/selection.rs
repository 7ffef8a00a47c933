//! Selection and ordering of section children.
//!
//! A section's children are first turned into [`SelectableRoute`]s, each
//! already selected and ordered inside. The section then picks among them
//! and orders the picks. Category filters are applied before counting.

use std::sync::Arc;

use qti_core::{AssessmentItemRef, AssessmentSection, Selection};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::SelectionError;

/// A child of a section, expanded into the item references it contributes.
#[derive(Debug, Clone)]
pub struct SelectableRoute {
    pub identifier: String,
    pub required: bool,
    pub fixed: bool,
    /// Item references with their enclosing sections below the parent,
    /// outermost first.
    pub items: Vec<(Arc<AssessmentItemRef>, Vec<Arc<AssessmentSection>>)>,
}

impl SelectableRoute {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Include and exclude categories inherited from enclosing selections.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl CategoryFilter {
    /// This filter narrowed by a section's selection.
    pub fn narrowed(&self, selection: Option<&Selection>) -> CategoryFilter {
        let mut next = self.clone();
        if let Some(s) = selection {
            next.include.extend(s.include_categories.iter().cloned());
            next.exclude.extend(s.exclude_categories.iter().cloned());
        }
        next
    }

    pub fn admits(&self, item_ref: &AssessmentItemRef) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|c| item_ref.has_category(c));
        included && !self.exclude.iter().any(|c| item_ref.has_category(c))
    }
}

/// Pick children according to `selection`. Returns indexes into
/// `children`, in declaration order; with replacement an index may repeat.
///
/// Required children are always picked, fixed ones are preferred next in
/// declaration order and the remaining slots are drawn at random.
pub fn select(
    section: &str,
    children: &[SelectableRoute],
    selection: Option<&Selection>,
    rng: &mut StdRng,
) -> Result<Vec<usize>, SelectionError> {
    let Some(selection) = selection else {
        return Ok((0..children.len()).collect());
    };
    let requested = selection.select;
    let available = children.len();
    let required: Vec<usize> = (0..available).filter(|i| children[*i].required).collect();
    if required.len() > requested {
        return Err(SelectionError::TooManyRequired {
            section: section.to_string(),
            required: required.len(),
            requested,
        });
    }
    if (!selection.with_replacement && requested > available)
        || (selection.with_replacement && available == 0 && requested > 0)
    {
        return Err(SelectionError::NotEnoughChildren {
            section: section.to_string(),
            requested,
            available,
        });
    }

    let mut picked = required;
    let fixed = (0..available).filter(|i| children[*i].fixed && !children[*i].required);
    for i in fixed {
        if picked.len() == requested {
            break;
        }
        picked.push(i);
    }

    if selection.with_replacement {
        while picked.len() < requested {
            picked.push(rng.gen_range(0..available));
        }
    } else {
        let mut rest: Vec<usize> = (0..available).filter(|i| !picked.contains(i)).collect();
        rest.shuffle(rng);
        let missing = requested - picked.len();
        picked.extend(rest.into_iter().take(missing));
    }
    picked.sort_unstable();
    Ok(picked)
}

/// Shuffle `routes` in place; fixed routes keep their positions.
pub fn shuffle(routes: &mut [SelectableRoute], rng: &mut StdRng) {
    let free: Vec<usize> = (0..routes.len()).filter(|i| !routes[*i].fixed).collect();
    let mut movable: Vec<SelectableRoute> = free.iter().map(|i| routes[*i].clone()).collect();
    movable.shuffle(rng);
    for (slot, route) in free.into_iter().zip(movable) {
        routes[slot] = route;
    }
}

/// Select and order the children of `section`, giving the flattened item
/// references it contributes to the route. An empty result means every
/// child was filtered out.
pub fn expand_section(
    section: &Arc<AssessmentSection>,
    filter: &CategoryFilter,
    rng: &mut StdRng,
) -> Result<SelectableRoute, SelectionError> {
    let filter = filter.narrowed(section.selection.as_ref());
    let mut children = Vec::with_capacity(section.children.len());
    for child in &section.children {
        let route = match child {
            qti_core::SectionPart::Item(item_ref) => SelectableRoute {
                identifier: item_ref.identifier.clone(),
                required: item_ref.required,
                fixed: item_ref.fixed,
                items: if filter.admits(item_ref) {
                    vec![(Arc::clone(item_ref), Vec::new())]
                } else {
                    Vec::new()
                },
            },
            qti_core::SectionPart::Section(sub) => expand_section(sub, &filter, rng)?,
        };
        if !route.is_empty() {
            children.push(route);
        }
    }

    let picks = select(&section.identifier, &children, section.selection.as_ref(), rng)?;
    let mut chosen: Vec<SelectableRoute> = picks.into_iter().map(|i| children[i].clone()).collect();
    if section.ordering.as_ref().is_some_and(|o| o.shuffle) {
        shuffle(&mut chosen, rng);
    }

    let items = chosen
        .into_iter()
        .flat_map(|route| route.items)
        .map(|(item_ref, mut path)| {
            path.insert(0, Arc::clone(section));
            (item_ref, path)
        })
        .collect();
    Ok(SelectableRoute {
        identifier: section.identifier.clone(),
        required: section.required,
        fixed: section.fixed,
        items,
    })
}
