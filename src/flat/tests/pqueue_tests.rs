use crate::flat::pqueue::{Neighbor, TopK};

#[test]
fn test_keeps_k_smallest() {
    let mut top = TopK::new(2);
    for (ordinal, distance) in [(0, 5.0), (1, 1.0), (2, 3.0), (3, 0.5)] {
        top.push(Neighbor { distance, ordinal });
    }

    assert_eq!(top.len(), 2);
    assert_eq!(top.into_sorted(), vec![(3, 0.5), (1, 1.0)]);
}

#[test]
fn test_ties_prefer_lower_ordinal() {
    let mut top = TopK::new(2);
    for ordinal in [4, 2, 7, 0] {
        top.push(Neighbor { distance: 1.0, ordinal });
    }

    assert_eq!(top.into_sorted(), vec![(0, 1.0), (2, 1.0)]);
}

#[test]
fn test_zero_capacity() {
    let mut top = TopK::new(0);
    top.push(Neighbor { distance: 0.0, ordinal: 0 });
    assert!(top.is_empty());
}

#[test]
fn test_nan_sorts_last() {
    let mut top = TopK::new(3);
    top.push(Neighbor { distance: f32::NAN, ordinal: 0 });
    top.push(Neighbor { distance: 2.0, ordinal: 1 });
    top.push(Neighbor { distance: 1.0, ordinal: 2 });

    let sorted = top.into_sorted();
    assert_eq!(sorted[0].0, 2);
    assert_eq!(sorted[1].0, 1);
    assert_eq!(sorted[2].0, 0);
}
