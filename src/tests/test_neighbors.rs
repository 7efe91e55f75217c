use std::sync::Arc;

use crate::core::CorrelationMatrix;
use crate::error::CorrError;
use crate::neighbors::{
    nearest_neighbors, positively_correlated, ranked_entities, NeighborCache, NeighborMode,
};

fn three_entities() -> CorrelationMatrix {
    let mut m = CorrelationMatrix::new(3).unwrap();
    m.set(0, 1, 0.8).unwrap();
    m.set(0, 2, -0.2).unwrap();
    m.set(1, 2, 0.5).unwrap();
    m.set_diagonal(1.0);
    m
}

#[test]
fn test_three_entity_scenario() {
    crate::init();
    let m = three_entities();
    assert_eq!(positively_correlated(&m, 0).unwrap(), vec![1]);
    assert_eq!(nearest_neighbors(&m, 0, 2).unwrap(), vec![1, 2]);
    assert_eq!(nearest_neighbors(&m, 0, 1).unwrap(), vec![1]);

    assert_eq!(positively_correlated(&m, 1).unwrap(), vec![0, 2]);
    assert_eq!(positively_correlated(&m, 2).unwrap(), vec![1]);
    assert_eq!(ranked_entities(&m, 2).unwrap(), vec![1, 0]);
}

#[test]
fn test_query_entity_never_included() {
    let m = three_entities();
    for e in 0..3 {
        assert!(!positively_correlated(&m, e).unwrap().contains(&e));
        assert!(!nearest_neighbors(&m, e, 10).unwrap().contains(&e));
    }
}

#[test]
fn test_k_larger_than_population() {
    let m = three_entities();
    assert_eq!(nearest_neighbors(&m, 1, 50).unwrap(), vec![0, 2]);

    let single = CorrelationMatrix::new(1).unwrap();
    assert!(nearest_neighbors(&single, 0, 3).unwrap().is_empty());
}

#[test]
fn test_zero_k_rejected() {
    let m = three_entities();
    assert!(matches!(
        nearest_neighbors(&m, 0, 0),
        Err(CorrError::Argument(_))
    ));
    assert!(NeighborCache::new().nearest_neighbors(&m, 0, 0).is_err());
}

#[test]
fn test_unknown_entity_rejected() {
    let m = three_entities();
    assert!(matches!(
        positively_correlated(&m, 3),
        Err(CorrError::IndexOutOfRange { .. })
    ));
    assert!(nearest_neighbors(&m, 7, 1).is_err());
}

#[test]
fn test_ties_break_by_ascending_id() {
    let mut m = CorrelationMatrix::new(5).unwrap();
    m.set(2, 4, 0.5).unwrap();
    m.set(2, 0, 0.5).unwrap();
    m.set(2, 3, 0.5).unwrap();
    m.set(2, 1, 0.9).unwrap();
    assert_eq!(positively_correlated(&m, 2).unwrap(), vec![1, 0, 3, 4]);

    // zero and negative fill the tail of the nearest ranking
    let mut m = CorrelationMatrix::new(4).unwrap();
    m.set(0, 3, -0.1).unwrap();
    assert_eq!(nearest_neighbors(&m, 0, 3).unwrap(), vec![1, 2, 3]);
    assert!(positively_correlated(&m, 0).unwrap().is_empty());
}

#[test]
fn test_cache_memoizes_until_invalidated() {
    crate::init();
    let mut m = three_entities();
    let cache = NeighborCache::new();
    assert!(cache.is_empty());

    let first = cache.positively_correlated(&m, 0).unwrap();
    let second = cache.positively_correlated(&m, 0).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cache.contains(0));
    assert_eq!(cache.len(), 1);

    // the cache holds no reference to the store; a write without
    // invalidation leaves the old ranking in place
    m.set(0, 2, 0.9).unwrap();
    assert_eq!(*cache.positively_correlated(&m, 0).unwrap(), vec![1]);

    cache.invalidate(0);
    assert!(!cache.contains(0));
    assert_eq!(*cache.positively_correlated(&m, 0).unwrap(), vec![2, 1]);
}

#[test]
fn test_invalidate_all_clears_both_modes() {
    let m = three_entities();
    let cache = NeighborCache::new();
    cache.candidates(&m, 0, NeighborMode::Positive).unwrap();
    cache.candidates(&m, 1, NeighborMode::Nearest).unwrap();
    assert_eq!(cache.nearest_neighbors(&m, 2, 1).unwrap(), vec![1]);
    assert_eq!(cache.len(), 3);

    cache.invalidate(1);
    assert_eq!(cache.len(), 2);
    cache.invalidate_all();
    assert!(cache.is_empty());
}

#[test]
fn test_cache_matches_uncached_queries() {
    let ratings = crate::tests::test_data::random_matrix(30, 25, 0.3, 21);
    let mut m = CorrelationMatrix::default();
    crate::similarity::Similarity::default()
        .compute_all(&mut m, ratings.by_item())
        .unwrap();

    let cache = NeighborCache::new();
    for e in 0..m.dim() {
        assert_eq!(
            *cache.candidates(&m, e, NeighborMode::Positive).unwrap(),
            positively_correlated(&m, e).unwrap()
        );
        assert_eq!(
            cache.nearest_neighbors(&m, e, 5).unwrap(),
            nearest_neighbors(&m, e, 5).unwrap()
        );
    }
}
