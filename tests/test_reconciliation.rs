//! End-to-end reconciliation scenarios: recovery of inserted sets,
//! subtract-then-decode symmetric differences, cancellation of shared
//! elements, and graceful failure past capacity.

use iblt::Table;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

fn distinct_elements(rng: &mut StdRng, count: usize, width: usize) -> Vec<Vec<u8>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let mut element = vec![0u8; width];
        rng.fill(&mut element[..]);
        if seen.insert(element.clone()) {
            out.push(element);
        }
    }
    out
}

fn as_set(slice: &[Vec<u8>]) -> HashSet<Vec<u8>> {
    slice.iter().cloned().collect()
}

#[test]
fn test_insert_only_recovery() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let elements = distinct_elements(&mut rng, 20, 4);

    let mut table = Table::new_table(80, 4, 1, 4);
    for element in &elements {
        table.insert(element).unwrap();
    }

    let diff = table.decode().unwrap();
    assert_eq!(diff.alpha_len(), 20);
    assert_eq!(diff.beta_len(), 0);
    assert_eq!(as_set(diff.alpha_slice()), as_set(&elements));
}

#[test]
fn test_symmetric_difference_via_subtract() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0002);
    let pool = distinct_elements(&mut rng, 1150, 4);
    let (ours_only, rest) = pool.split_at(350);
    let (theirs_only, shared) = rest.split_at(300);

    let mut ours = Table::new_table(1024, 4, 1, 4);
    let mut theirs = Table::new_table(1024, 4, 1, 4);
    for element in ours_only.iter().chain(shared) {
        ours.insert(element).unwrap();
    }
    for element in theirs_only.iter().chain(shared) {
        theirs.insert(element).unwrap();
    }

    ours.subtract(&theirs).unwrap();
    let diff = ours.decode().unwrap();

    assert_eq!(diff.alpha_len(), 350);
    assert_eq!(diff.beta_len(), 300);
    assert_eq!(as_set(diff.alpha_slice()), as_set(ours_only));
    assert_eq!(as_set(diff.beta_slice()), as_set(theirs_only));
    assert!(diff.cancelled().is_empty());
}

#[test]
fn test_subtract_is_antisymmetric() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0003);
    let pool = distinct_elements(&mut rng, 50, 4);
    let (side_a, side_b) = pool.split_at(20);

    let build = |elements: &[Vec<u8>]| {
        let mut table = Table::new_table(256, 4, 1, 4);
        for element in elements {
            table.insert(element).unwrap();
        }
        table
    };

    let mut forward = build(side_a);
    forward.subtract(&build(side_b)).unwrap();
    let diff = forward.decode().unwrap();
    assert_eq!(as_set(diff.alpha_slice()), as_set(side_a));
    assert_eq!(as_set(diff.beta_slice()), as_set(side_b));

    let mut backward = build(side_b);
    backward.subtract(&build(side_a)).unwrap();
    let diff = backward.decode().unwrap();
    assert_eq!(as_set(diff.alpha_slice()), as_set(side_b));
    assert_eq!(as_set(diff.beta_slice()), as_set(side_a));
}

#[test]
fn test_shared_elements_cancel_through_insert_and_delete() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0004);
    let pool = distinct_elements(&mut rng, 1100, 4);
    let (inserted, rest) = pool.split_at(300);
    let (deleted, shared) = rest.split_at(300);

    let mut table = Table::new_table(1024, 4, 1, 4);
    for element in inserted {
        table.insert(element).unwrap();
    }
    for element in deleted {
        table.delete(element).unwrap();
    }
    for element in shared {
        table.insert(element).unwrap();
        table.delete(element).unwrap();
    }

    let diff = table.decode().unwrap();
    assert_eq!(diff.alpha_len(), 300);
    assert_eq!(diff.beta_len(), 300);
    assert_eq!(as_set(diff.alpha_slice()), as_set(inserted));
    assert_eq!(as_set(diff.beta_slice()), as_set(deleted));
}

#[test]
fn test_capacity_exhaustion_is_reported() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0005);
    let mut table = Table::new_table(80, 4, 1, 4);
    for element in distinct_elements(&mut rng, 10_000, 4) {
        table.insert(&element).unwrap();
    }

    // Far past capacity: decoding must fail cleanly, either refusing to
    // start or stalling with residue, never panicking or fabricating a
    // result.
    assert!(table.decode().is_err());
}

#[test]
fn test_auto_sized_constructor_recovers_inserted_set() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0006);
    let mut table = Table::new(50);
    let elements = distinct_elements(&mut rng, 50, table.data_len());
    for element in &elements {
        table.insert(element).unwrap();
    }

    let diff = table.decode().unwrap();
    assert_eq!(diff.alpha_len(), 50);
    assert_eq!(diff.beta_len(), 0);
    assert_eq!(as_set(diff.alpha_slice()), as_set(&elements));
}

#[test]
fn test_serialized_exchange_roundtrip() {
    // One side serializes, the other deserializes, subtracts its own
    // table, and reads the difference; mirrors how the bytes travel.
    let mut rng = StdRng::seed_from_u64(0x5eed_0007);
    let pool = distinct_elements(&mut rng, 40, 4);
    let (ours_only, rest) = pool.split_at(10);
    let (theirs_only, shared) = rest.split_at(10);

    let mut ours = Table::new_table(256, 4, 1, 4);
    let mut theirs = Table::new_table(256, 4, 1, 4);
    for element in ours_only.iter().chain(shared) {
        ours.insert(element).unwrap();
    }
    for element in theirs_only.iter().chain(shared) {
        theirs.insert(element).unwrap();
    }

    let mut received = Table::deserialize(&ours.serialize()).unwrap();
    received.subtract(&theirs).unwrap();
    let diff = received.decode().unwrap();

    assert_eq!(as_set(diff.alpha_slice()), as_set(ours_only));
    assert_eq!(as_set(diff.beta_slice()), as_set(theirs_only));
}
