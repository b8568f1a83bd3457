//! Anonymity-set shuffling with a sender/receiver parity constraint.
use curve25519_dalek::ristretto::RistrettoPoint;
use rand::Rng;

use crate::error::ShuffleError;

pub struct ShuffleResult {
    pub shuffled: Vec<RistrettoPoint>,
    pub sender_index: usize,
    pub receiver_index: usize,
}

/// Shuffle `set` (which must contain both `sender` and `receiver`, and
/// whose length must be a power of two), then adjust so that the final
/// sender/receiver indices land on opposite parities.
pub fn shuffle(
    set: &[RistrettoPoint],
    sender: &RistrettoPoint,
    receiver: &RistrettoPoint,
    rng: &mut impl Rng,
) -> Result<ShuffleResult, ShuffleError> {
    if set.len() < 2 {
        return Err(ShuffleError::TooSmall(set.len()));
    }
    if !set.len().is_power_of_two() {
        return Err(ShuffleError::NotPowerOfTwo(set.len()));
    }
    if !set.contains(sender) || !set.contains(receiver) {
        return Err(ShuffleError::EndpointNotInSet);
    }

    let mut shuffled = set.to_vec();
    let n = shuffled.len();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }

    let mut sender_index = shuffled
        .iter()
        .position(|p| p == sender)
        .expect("sender was verified present above");
    let mut receiver_index = shuffled
        .iter()
        .position(|p| p == receiver)
        .expect("receiver was verified present above");

    if sender_index % 2 == receiver_index % 2 {
        let swap_with = if receiver_index % 2 == 0 {
            receiver_index + 1
        } else {
            receiver_index - 1
        };
        shuffled.swap(receiver_index, swap_with);
        if sender_index == swap_with {
            sender_index = receiver_index;
        }
        receiver_index = swap_with;
    }

    Ok(ShuffleResult {
        shuffled,
        sender_index,
        receiver_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::scalar::Scalar;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::group::generator;

    fn set_of(n: usize) -> Vec<RistrettoPoint> {
        (0..n as u64).map(|i| generator() * Scalar::from(i + 1)).collect()
    }

    #[test]
    fn shuffled_output_is_a_permutation_containing_both_endpoints() {
        let set = set_of(8);
        let sender = set[3];
        let receiver = set[7];
        let mut rng = StdRng::seed_from_u64(1);

        let result = shuffle(&set, &sender, &receiver, &mut rng).expect("shuffle");
        assert_eq!(result.shuffled.len(), set.len());
        for p in &set {
            assert!(result.shuffled.contains(p));
        }
        assert_eq!(result.shuffled[result.sender_index], sender);
        assert_eq!(result.shuffled[result.receiver_index], receiver);
    }

    #[test]
    fn sender_and_receiver_always_land_on_opposite_parities() {
        let set = set_of(8);
        let sender = set[3];
        let receiver = set[7];

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = shuffle(&set, &sender, &receiver, &mut rng).expect("shuffle");
            assert_ne!(result.sender_index % 2, result.receiver_index % 2);
        }
    }

    #[test]
    fn rejects_non_power_of_two_sets() {
        let set = set_of(5);
        let mut rng = StdRng::seed_from_u64(0);
        let result = shuffle(&set, &set[0], &set[1], &mut rng);
        assert!(matches!(result, Err(ShuffleError::NotPowerOfTwo(5))));
    }

    #[test]
    fn rejects_endpoints_not_in_the_set() {
        let set = set_of(4);
        let outsider = generator() * Scalar::from(999u64);
        let mut rng = StdRng::seed_from_u64(0);
        let result = shuffle(&set, &outsider, &set[1], &mut rng);
        assert!(matches!(result, Err(ShuffleError::EndpointNotInSet)));
    }
}
