//! Dependency resolver - turns a set of descriptors into a load order.
//!
//! Pure: it reads descriptors and returns either an order or the reason no
//! order exists. Ties between modules that become eligible at the same step are
//! broken by ascending id, so the same input always yields the same order.

use std::collections::{BTreeMap, BTreeSet};

use crate::application::errors::ResolutionError;
use crate::domain::entities::ModuleDescriptor;

/// Compute a load order where every module comes after all its present dependencies
pub fn resolve<'a, I>(descriptors: I) -> Result<Vec<String>, ResolutionError>
where
    I: IntoIterator<Item = &'a ModuleDescriptor>,
{
    let mut by_id: BTreeMap<&str, &ModuleDescriptor> = BTreeMap::new();
    for descriptor in descriptors {
        if by_id.insert(descriptor.id.as_str(), descriptor).is_some() {
            return Err(ResolutionError::DuplicateModule(descriptor.id.clone()));
        }
    }

    let edges = build_graph(&by_id)?;

    // Kahn's algorithm; `remaining` counts unresolved dependencies per module
    let mut remaining: BTreeMap<&str, usize> = edges
        .iter()
        .map(|(id, deps)| (*id, deps.len()))
        .collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (id, deps) in &edges {
        for dep in deps {
            dependents.entry(*dep).or_default().push(*id);
        }
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(edges.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() < edges.len() {
        let ordered: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        return Err(ResolutionError::DependencyCycle(find_cycle(&edges, &ordered)));
    }

    Ok(order)
}

/// Edges from each module to the dependencies present in the set, after
/// checking presence and version constraints. Modules and dependencies are
/// visited in id order so the first reported error is stable.
fn build_graph<'a>(
    by_id: &BTreeMap<&'a str, &'a ModuleDescriptor>,
) -> Result<BTreeMap<&'a str, BTreeSet<&'a str>>, ResolutionError> {
    let mut edges = BTreeMap::new();

    for (id, descriptor) in by_id {
        let mut deps = BTreeSet::new();
        for dep in &descriptor.dependencies {
            let Some(target) = by_id.get(dep.id.as_str()) else {
                if dep.optional {
                    continue;
                }
                return Err(ResolutionError::MissingDependency {
                    module: id.to_string(),
                    dependency: dep.id.clone(),
                });
            };

            if !dep.version.matches(target.version) {
                return Err(ResolutionError::IncompatibleVersion {
                    module: id.to_string(),
                    dependency: dep.id.clone(),
                    required: dep.version.to_string(),
                    found: target.version,
                });
            }
            deps.insert(target.id.as_str());
        }
        edges.insert(*id, deps);
    }

    Ok(edges)
}

/// Find one concrete cycle among the modules Kahn's algorithm could not order.
///
/// Every unordered module has at least one unordered dependency, so walking
/// those edges must revisit a module; the revisited stretch is the cycle.
fn find_cycle(edges: &BTreeMap<&str, BTreeSet<&str>>, ordered: &BTreeSet<&str>) -> Vec<String> {
    let Some(start) = edges.keys().find(|id| !ordered.contains(*id)) else {
        return Vec::new();
    };

    let mut path: Vec<&str> = Vec::new();
    let mut current = *start;
    loop {
        if let Some(pos) = path.iter().position(|id| *id == current) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|id| id.to_string()).collect();
            // Rotate so the cycle starts at its smallest id
            if let Some(min) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)).map(|(i, _)| i) {
                cycle.rotate_left(min);
            }
            return cycle;
        }
        path.push(current);

        let next = edges
            .get(current)
            .and_then(|deps| deps.iter().find(|dep| !ordered.contains(*dep)));
        match next {
            Some(dep) => current = *dep,
            None => return path.iter().map(|id| id.to_string()).collect(),
        }
    }
}
