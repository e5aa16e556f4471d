//! Turns per-particle bound labels into membership lists.

use std::collections::BTreeMap;

/// Groups particle indices by their bound-group label.
///
/// Unlabelled particles are left out. Member lists are in ascending index
/// order and the map iterates in ascending label order.
///
/// # Examples
///
/// ```
/// use cloudphinder::extractor::bound_groups;
///
/// let groups = bound_groups(&[Some(3), None, Some(0), Some(3)]);
///
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[&0], vec![2]);
/// assert_eq!(groups[&3], vec![0, 3]);
/// ```
pub fn bound_groups(labels: &[Option<usize>]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        if let Some(g) = label {
            groups.entry(*g).or_default().push(i);
        }
    }
    groups
}

/// Re-keys member lists into another index space, e.g. from a dense subset
/// back to the caller's original particle indices.
pub fn remap(groups: &BTreeMap<usize, Vec<usize>>, origin: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    groups
        .iter()
        .map(|(&g, members)| {
            let mut mapped: Vec<usize> = members.iter().map(|&i| origin[i]).collect();
            mapped.sort_unstable();
            (origin[g], mapped)
        })
        .collect()
}
