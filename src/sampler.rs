//! Sampler
//!
//! Strategies for splitting the training rows into mini-batches at the start of each epoch.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

// A sampler turns the row indices of a split into the mini-batches of one epoch.
pub trait BatchSampler {
    /// Return the batches for one pass over `n_rows` rows. Every row appears exactly once;
    /// the last batch is smaller when `n_rows` is not a multiple of the batch size.
    fn batches(&mut self, rng: &mut StdRng, n_rows: usize) -> Vec<Vec<usize>>;
}

/// Shuffles the rows every epoch before cutting them into batches.
pub struct RandomBatchSampler {
    batch_size: usize,
}

impl RandomBatchSampler {
    pub fn new(batch_size: usize) -> Self {
        RandomBatchSampler { batch_size }
    }
}

impl BatchSampler for RandomBatchSampler {
    fn batches(&mut self, rng: &mut StdRng, n_rows: usize) -> Vec<Vec<usize>> {
        let mut index: Vec<usize> = (0..n_rows).collect();
        index.shuffle(rng);
        index.chunks(self.batch_size).map(|c| c.to_vec()).collect()
    }
}

/// Keeps the rows in their original order.
pub struct SequentialBatchSampler {
    batch_size: usize,
}

impl SequentialBatchSampler {
    pub fn new(batch_size: usize) -> Self {
        SequentialBatchSampler { batch_size }
    }
}

impl BatchSampler for SequentialBatchSampler {
    fn batches(&mut self, _rng: &mut StdRng, n_rows: usize) -> Vec<Vec<usize>> {
        (0..n_rows)
            .step_by(self.batch_size)
            .map(|start| (start..usize::min(start + self.batch_size, n_rows)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_batch_sampler() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut sampler = RandomBatchSampler::new(4);
        let batches = sampler.batches(&mut rng, 10);

        assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![4, 4, 2]);
        let mut all: Vec<usize> = batches.into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        // Different epochs get a different order.
        let first: Vec<usize> = sampler.batches(&mut rng, 100).into_iter().flatten().collect();
        let second: Vec<usize> = sampler.batches(&mut rng, 100).into_iter().flatten().collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_sequential_batch_sampler() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut sampler = SequentialBatchSampler::new(3);
        let batches = sampler.batches(&mut rng, 7);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(sampler.batches(&mut rng, 0).is_empty());
    }
}
