use std::collections::BTreeSet;

/// A possible pairing of a library row with an area row within one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position of the library row within its run
    pub library: usize,
    /// Position of the area row within its run
    pub area: usize,
    /// Absolute retention time difference
    pub delta: f64,
}

/**
The pairs still eligible for greedy assignment.

Candidates are ordered by increasing delta, and pairs with equal deltas keep
their enumeration order, library rows outer and area rows inner. Taking a
candidate consumes both of its rows, which retires every other candidate
sharing either row.
*/
#[derive(Debug, Clone)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    cursor: usize,
    free_library: BTreeSet<usize>,
    free_area: BTreeSet<usize>,
}

impl CandidatePool {
    /// Enumerate every (library, area) pair whose retention times differ by at
    /// most `threshold`. Pairs whose difference is undefined are never
    /// candidates.
    pub fn new(library_times: &[f64], area_times: &[f64], threshold: f64) -> Self {
        let mut candidates = Vec::new();
        for (library, lib_rt) in library_times.iter().enumerate() {
            for (area, area_rt) in area_times.iter().enumerate() {
                let delta = (lib_rt - area_rt).abs();
                if delta <= threshold {
                    candidates.push(Candidate {
                        library,
                        area,
                        delta,
                    });
                }
            }
        }
        // stable, so ties stay in enumeration order
        candidates.sort_by(|a, b| a.delta.total_cmp(&b.delta));
        Self {
            candidates,
            cursor: 0,
            free_library: (0..library_times.len()).collect(),
            free_area: (0..area_times.len()).collect(),
        }
    }

    fn is_viable(&self, candidate: &Candidate) -> bool {
        self.free_library.contains(&candidate.library) && self.free_area.contains(&candidate.area)
    }

    /// The number of candidates that could still be taken
    pub fn len(&self) -> usize {
        self.candidates[self.cursor..]
            .iter()
            .filter(|c| self.is_viable(c))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Library rows not yet assigned an area
    pub fn unconsumed_library(&self) -> impl Iterator<Item = usize> + '_ {
        self.free_library.iter().copied()
    }

    /// Area rows not yet assigned to a library row
    pub fn unconsumed_area(&self) -> impl Iterator<Item = usize> + '_ {
        self.free_area.iter().copied()
    }

    /// Commit the remaining candidate with the smallest delta
    pub fn take_best(&mut self) -> Option<Candidate> {
        while let Some(candidate) = self.candidates.get(self.cursor).copied() {
            self.cursor += 1;
            if self.is_viable(&candidate) {
                self.free_library.remove(&candidate.library);
                self.free_area.remove(&candidate.area);
                return Some(candidate);
            }
        }
        None
    }
}

impl Iterator for CandidatePool {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.take_best()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_greedy_order() {
        let mut pool = CandidatePool::new(&[1.0, 1.5], &[1.25, 2.0], 1.0);
        assert_eq!(pool.len(), 4);
        let first = pool.take_best().unwrap();
        assert_eq!((first.library, first.area, first.delta), (0, 0, 0.25));
        assert_eq!(pool.len(), 1);
        let second = pool.take_best().unwrap();
        assert_eq!((second.library, second.area, second.delta), (1, 1, 0.5));
        assert!(pool.take_best().is_none());
        assert!(pool.is_empty());
        assert_eq!(pool.unconsumed_library().count(), 0);
    }

    #[test]
    fn test_ties_follow_enumeration() {
        let taken: Vec<(usize, usize)> = CandidatePool::new(&[1.0, 1.0], &[1.5, 0.5], 1.0)
            .map(|c| (c.library, c.area))
            .collect();
        assert_eq!(taken, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_threshold_and_nan() {
        let pool = CandidatePool::new(&[1.0, f64::NAN], &[1.5, 3.0], 0.5);
        let taken: Vec<_> = pool.map(|c| (c.library, c.area)).collect();
        assert_eq!(taken, vec![(0, 0)]);

        let mut pool = CandidatePool::new(&[1.0], &[], 0.1);
        assert!(pool.take_best().is_none());
        assert_eq!(pool.unconsumed_library().collect::<Vec<_>>(), vec![0]);
    }
}
