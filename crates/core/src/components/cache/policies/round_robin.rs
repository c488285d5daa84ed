//! Round-robin replacement: a per-set eviction pointer that only advances
//! when the way it points at is the one just filled, preserving first-in
//! order as a set fills up.

use super::ReplacementPolicy;

pub struct RoundRobinPolicy {
    next_way: Vec<usize>,
    ways: usize,
}

impl RoundRobinPolicy {
    #[must_use]
    pub fn new(sets: usize, ways: usize) -> Self {
        Self { next_way: vec![0; sets], ways: ways.max(1) }
    }
}

impl ReplacementPolicy for RoundRobinPolicy {
    fn update(&mut self, set: usize, way: usize) {
        if self.next_way[set] == way {
            self.next_way[set] = (self.next_way[set] + 1) % self.ways;
        }
    }

    fn get_victim(&mut self, set: usize) -> usize {
        self.next_way[set]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_through_every_way_before_wrapping() {
        let mut rr = RoundRobinPolicy::new(1, 3);
        assert_eq!(rr.get_victim(0), 0);
        rr.update(0, 0);
        assert_eq!(rr.get_victim(0), 1);
        rr.update(0, 1);
        assert_eq!(rr.get_victim(0), 2);
        rr.update(0, 2);
        assert_eq!(rr.get_victim(0), 0);
    }

    #[test]
    fn update_on_a_way_other_than_the_pointer_does_not_advance() {
        let mut rr = RoundRobinPolicy::new(1, 2);
        rr.update(0, 1);
        assert_eq!(rr.get_victim(0), 0);
    }

    #[test]
    fn sets_advance_independently() {
        let mut rr = RoundRobinPolicy::new(2, 2);
        rr.update(0, 0);
        assert_eq!(rr.get_victim(0), 1);
        assert_eq!(rr.get_victim(1), 0);
    }
}
