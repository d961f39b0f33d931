//! Benchmark utilities.

use rand::Rng;

/// Generate random value data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a batch of random 32-byte keys.
pub fn generate_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(32)).collect()
}

/// Generate key/value pairs with the specified value size.
pub fn generate_entries(count: usize, value_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    generate_keys(count)
        .into_iter()
        .map(|key| (key, random_data(value_size)))
        .collect()
}
