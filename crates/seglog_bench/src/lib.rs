//! Shared helpers for seglog benchmarks.

use rand::Rng;

/// Generates random record data of the given size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generates `count` records of `size` random bytes each.
pub fn random_records(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(size)).collect()
}
