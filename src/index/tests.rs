use super::*;

fn sample_index() -> VectorIndex {
    VectorIndex::build(vec![
        vec![0.0, 0.0],
        vec![3.0, 4.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
    ])
    .expect("index should build")
}

#[test]
fn build_rejects_zero_vectors() {
    let result = VectorIndex::build(Vec::new());
    assert!(matches!(result, Err(RetrievalError::Index(_))));
}

#[test]
fn build_rejects_zero_dimension() {
    let result = VectorIndex::build(vec![Vec::new()]);
    assert!(matches!(result, Err(RetrievalError::Index(_))));
}

#[test]
fn build_rejects_mixed_dimensions() {
    let result = VectorIndex::build(vec![vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0]]);
    assert!(matches!(
        result,
        Err(RetrievalError::DimensionMismatch {
            position: 2,
            expected: 2,
            found: 1
        })
    ));
}

#[test]
fn accessors() {
    let index = sample_index();
    assert_eq!(index.len(), 4);
    assert_eq!(index.dimension(), 2);
    assert!(!index.is_empty());
    assert_eq!(index.vector(1), Some(&[3.0, 4.0][..]));
    assert_eq!(index.vector(4), None);
    assert_eq!(index.as_flat().len(), 8);
}

#[test]
fn nearest_first() {
    let index = sample_index();
    let neighbors = index.search(&[0.0, 0.0], 4).expect("search should succeed");

    let positions: Vec<usize> = neighbors.iter().map(|n| n.position).collect();
    assert_eq!(positions, vec![0, 2, 3, 1]);

    let distances: Vec<f32> = neighbors.iter().map(|n| n.distance).collect();
    assert_eq!(distances, vec![0.0, 1.0, 1.0, 25.0]);
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn ties_keep_insertion_order() {
    let index = VectorIndex::build(vec![vec![1.0], vec![-1.0], vec![1.0], vec![-1.0]])
        .expect("index should build");

    let neighbors = index.search(&[0.0], 4).expect("search should succeed");
    let positions: Vec<usize> = neighbors.iter().map(|n| n.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
}

#[test]
fn k_limits_results() {
    let index = sample_index();
    let neighbors = index.search(&[3.0, 4.0], 2).expect("search should succeed");

    assert_eq!(neighbors.len(), 2);
    assert_eq!(neighbors[0], Neighbor { position: 1, distance: 0.0 });
}

#[test]
fn k_larger_than_index_returns_all() {
    let index = sample_index();
    let neighbors = index.search(&[0.0, 0.0], 100).expect("search should succeed");
    assert_eq!(neighbors.len(), 4);
}

#[test]
fn k_zero_returns_nothing() {
    let index = sample_index();
    let neighbors = index.search(&[0.0, 0.0], 0).expect("search should succeed");
    assert!(neighbors.is_empty());
}

#[test]
fn query_dimension_must_match() {
    let index = sample_index();
    assert!(matches!(
        index.search(&[0.0, 0.0, 0.0], 1),
        Err(RetrievalError::InvalidQuery(_))
    ));
}

#[test]
fn from_flat_checks_invariants() {
    assert!(VectorIndex::from_flat(0, vec![1.0]).is_err());
    assert!(VectorIndex::from_flat(2, Vec::new()).is_err());
    assert!(VectorIndex::from_flat(2, vec![1.0, 2.0, 3.0]).is_err());

    let index = sample_index();
    let rebuilt = VectorIndex::from_flat(index.dimension(), index.as_flat().to_vec())
        .expect("flat data should rebuild");
    assert_eq!(rebuilt, index);
}

#[test]
fn squared_distance() {
    assert_eq!(squared_l2(&[1.0, 2.0, 3.0], &[4.0, 6.0, 3.0]), 25.0);
    assert_eq!(squared_l2(&[0.5], &[0.5]), 0.0);
}
