use std::collections::BTreeMap;

use crate::extractor::{bound_groups, remap};

#[test]
fn test_no_labels() {
    assert!(bound_groups(&[]).is_empty());
    assert!(bound_groups(&[None, None]).is_empty());
}

#[test]
fn test_groups_by_label() {
    let groups = bound_groups(&[Some(4), Some(1), None, Some(4), Some(1), Some(4)]);

    assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 4]);
    assert_eq!(groups[&1], vec![1, 4]);
    assert_eq!(groups[&4], vec![0, 3, 5]);
}

#[test]
fn test_remap_to_original_indices() {
    let mut groups = BTreeMap::new();
    groups.insert(0, vec![0, 2]);
    groups.insert(1, vec![1]);
    let origin = [7, 3, 5];

    let mapped = remap(&groups, &origin);

    assert_eq!(mapped[&7], vec![5, 7]);
    assert_eq!(mapped[&3], vec![3]);
}
