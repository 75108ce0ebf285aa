//! Episode-structured storage with mid-buffer deletion.
use super::{FixedCapacityRing, TransitionRef};
use crate::{Element, ExperienceWriter, ReplayError};
use anyhow::Result;

/// Boundary record of one stored episode.
///
/// Episodes are contiguous runs of slots; the records partition the
/// occupied range `[0, stored_size)` with no gaps and no overlaps, and
/// at most the last record is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpisodeSpan {
    /// First slot of the episode.
    pub start: usize,
    /// Number of steps stored so far.
    pub len: usize,
    /// `true` while the episode has not been terminated by a done flag.
    pub open: bool,
}

/// Ring storage plus an ordered sequence of episode boundary records.
///
/// Unlike the plain ring, the episode store never wraps: space is
/// reclaimed by deleting episodes, which compacts everything stored
/// after them. The stored size therefore always equals the next write
/// index.
///
/// Episode lifecycle: a store call appends to the currently open
/// episode, creating one if none exists; a set done flag closes the
/// episode at that step and any remaining steps of the same call start
/// a new open episode. Closed episodes are immutable until deleted.
#[derive(Clone, Debug)]
pub struct EpisodicStore<T> {
    ring: FixedCapacityRing<T>,
    episodes: Vec<EpisodeSpan>,
}

impl<T: Element> EpisodicStore<T> {
    /// Creates an episode store over `capacity` slots.
    pub fn new(capacity: usize, obs_dim: usize, act_dim: usize) -> Self {
        Self {
            ring: FixedCapacityRing::new(capacity, obs_dim, act_dim),
            episodes: Vec::new(),
        }
    }

    /// Appends a batch of steps, splitting episodes at set done flags.
    ///
    /// Returns the starting write index.
    ///
    /// # Errors
    ///
    /// Fails with [`ReplayError::LengthMismatch`] for inconsistent
    /// field lengths and [`ReplayError::CapacityViolation`] when the
    /// call would run past the end of the buffer. Nothing is written in
    /// either case; deleting episodes is the way to free space.
    pub fn store(&mut self, batch: &TransitionRef<'_, T>) -> Result<usize, ReplayError> {
        let count = batch.check(self.ring.obs_dim(), self.ring.act_dim())?;
        let start = self.ring.next_index();
        let free = self.ring.capacity() - start;
        if count > free {
            return Err(ReplayError::CapacityViolation {
                requested: count,
                capacity: free,
            });
        }

        self.ring.write_at(start, batch, 0, count);
        self.ring.advance_linear(count);

        for k in 0..count {
            let open_tail = self.episodes.last().map(|e| e.open).unwrap_or(false);
            if !open_tail {
                self.episodes.push(EpisodeSpan {
                    start: start + k,
                    len: 0,
                    open: true,
                });
            }
            let tail = self.episodes.last_mut().unwrap();
            tail.len += 1;
            if batch.done[k] != 0 {
                tail.open = false;
            }
        }

        Ok(start)
    }

    /// Borrows the transitions of the requested episode.
    ///
    /// Returns `None` for an id that is not currently tracked; this is
    /// the "length 0, no data" outcome, not an error.
    pub fn get_episode(&self, id: usize) -> Option<TransitionRef<'_, T>> {
        self.episodes
            .get(id)
            .map(|ep| self.ring.slice(ep.start, ep.len))
    }

    /// The boundary record of the requested episode.
    pub fn episode(&self, id: usize) -> Option<EpisodeSpan> {
        self.episodes.get(id).copied()
    }

    /// Deletes one episode and compacts everything stored after it.
    ///
    /// Later episodes shift down by the deleted length, preserving
    /// their relative order and field values; the stored size and the
    /// next write index decrease by the same amount. The open episode
    /// may be deleted like any other, discarding its partial data.
    ///
    /// Returns the number of steps removed, 0 when `id` is not tracked.
    pub fn delete_episode(&mut self, id: usize) -> usize {
        let ep = match self.episodes.get(id) {
            Some(e) => *e,
            None => return 0,
        };

        let tail_start = ep.start + ep.len;
        let tail_len = self.ring.len() - tail_start;
        if tail_len > 0 {
            self.ring.shift_down(ep.start, tail_start, tail_len);
        }
        self.ring.rewind_to(ep.start + tail_len);

        for e in self.episodes[id + 1..].iter_mut() {
            e.start -= ep.len;
        }
        self.episodes.remove(id);

        ep.len
    }

    /// Number of currently tracked episodes.
    pub fn num_episodes(&self) -> usize {
        self.episodes.len()
    }

    /// Total number of stored steps across all episodes.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` while no steps are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// The next slot a store call will write.
    pub fn next_index(&self) -> usize {
        self.ring.next_index()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Discards all episodes and stored steps.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.episodes.clear();
    }
}

impl<T: Element> ExperienceWriter for EpisodicStore<T> {
    type Elem = T;

    fn push(&mut self, batch: &TransitionRef<'_, T>) -> Result<()> {
        self.store(batch)?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.ring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::TransitionBatch;

    const OBS_DIM: usize = 3;

    /// `count` steps with recognizable payloads: reward of step `k` is
    /// `base + k`, observations carry the same value.
    fn steps(base: f32, count: usize, done_at: Option<usize>) -> TransitionBatch<f32> {
        let mut b = TransitionBatch::with_capacity(count, OBS_DIM, 1);
        for k in 0..count {
            let v = base + k as f32;
            b.obs.extend(std::iter::repeat(v).take(OBS_DIM));
            b.act.push(v * 10.0);
            b.reward.push(v);
            b.next_obs.extend(std::iter::repeat(v + 1.0).take(OBS_DIM));
            b.done.push(if done_at == Some(k) { 1 } else { 0 });
        }
        b
    }

    fn check_invariants(store: &EpisodicStore<f32>) {
        let mut expected_start = 0;
        for (i, ep) in store.episodes.iter().enumerate() {
            assert_eq!(ep.start, expected_start, "episodes must be contiguous");
            assert!(ep.len > 0, "no empty episode records");
            assert!(
                !ep.open || i == store.episodes.len() - 1,
                "only the last episode may be open"
            );
            expected_start += ep.len;
        }
        assert_eq!(expected_start, store.len(), "episodes must cover the store");
        assert_eq!(store.len(), store.next_index());
    }

    #[test]
    fn store_appends_to_the_open_episode() {
        let mut store = EpisodicStore::<f32>::new(40, OBS_DIM, 1);

        // One step, then the remaining three of the same episode.
        store.store(&steps(0.0, 1, None).view()).unwrap();
        assert_eq!(store.num_episodes(), 1);
        assert_eq!(store.episode(0).unwrap(), EpisodeSpan { start: 0, len: 1, open: true });

        store.store(&steps(1.0, 3, Some(2)).view()).unwrap();
        assert_eq!(store.num_episodes(), 1);
        assert_eq!(store.episode(0).unwrap(), EpisodeSpan { start: 0, len: 4, open: false });
        assert_eq!(store.get_episode(0).unwrap().reward, &[0.0, 1.0, 2.0, 3.0]);

        // Not stored yet.
        assert!(store.get_episode(1).is_none());
        check_invariants(&store);
    }

    #[test]
    fn done_mid_batch_splits_the_episode() {
        let mut store = EpisodicStore::<f32>::new(16, OBS_DIM, 1);
        let start = store.store(&steps(0.0, 5, Some(2)).view()).unwrap();
        assert_eq!(start, 0);
        assert_eq!(store.num_episodes(), 2);
        assert_eq!(store.episode(0).unwrap(), EpisodeSpan { start: 0, len: 3, open: false });
        assert_eq!(store.episode(1).unwrap(), EpisodeSpan { start: 3, len: 2, open: true });
        check_invariants(&store);
    }

    #[test]
    fn delete_shifts_later_episodes_down() {
        let mut store = EpisodicStore::<f32>::new(16, OBS_DIM, 1);
        store.store(&steps(0.0, 4, Some(3)).view()).unwrap();
        store.store(&steps(10.0, 3, None).view()).unwrap();
        assert_eq!(store.num_episodes(), 2);
        assert_eq!(store.len(), 7);

        assert_eq!(store.delete_episode(0), 4);
        assert_eq!(store.len(), 3);
        assert_eq!(store.next_index(), 3);
        assert_eq!(store.num_episodes(), 1);

        let ep = store.get_episode(0).unwrap();
        assert_eq!(ep.reward, &[10.0, 11.0, 12.0]);
        assert_eq!(ep.act, &[100.0, 110.0, 120.0]);
        assert_eq!(ep.obs[..OBS_DIM], [10.0, 10.0, 10.0]);
        assert!(store.episode(0).unwrap().open);
        check_invariants(&store);
    }

    #[test]
    fn delete_of_untracked_id_changes_nothing() {
        let mut store = EpisodicStore::<f32>::new(16, OBS_DIM, 1);
        store.store(&steps(0.0, 4, Some(3)).view()).unwrap();
        store.store(&steps(10.0, 3, None).view()).unwrap();

        assert_eq!(store.delete_episode(99), 0);
        assert_eq!(store.len(), 7);
        assert_eq!(store.next_index(), 7);
        assert_eq!(store.num_episodes(), 2);
        check_invariants(&store);
    }

    #[test]
    fn half_open_episode_can_be_deleted() {
        let mut store = EpisodicStore::<f32>::new(16, OBS_DIM, 1);
        store.store(&steps(0.0, 3, Some(2)).view()).unwrap();

        // Three more steps that never reach a done flag.
        store.store(&steps(10.0, 3, None).view()).unwrap();
        assert_eq!(store.num_episodes(), 2);
        assert_eq!(store.episode(1).unwrap(), EpisodeSpan { start: 3, len: 3, open: true });

        assert_eq!(store.delete_episode(1), 3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.next_index(), 3);
        assert_eq!(store.num_episodes(), 1);
        check_invariants(&store);

        // Deleting the closed head while an open tail exists keeps the
        // tail's partial data.
        store.store(&steps(20.0, 3, None).view()).unwrap();
        assert_eq!(store.num_episodes(), 2);
        assert_eq!(store.delete_episode(0), 3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get_episode(0).unwrap().reward, &[20.0, 21.0, 22.0]);
        assert!(store.episode(0).unwrap().open);
        check_invariants(&store);
    }

    #[test]
    fn delete_middle_episode_of_three() {
        let mut store = EpisodicStore::<f32>::new(16, OBS_DIM, 1);
        store.store(&steps(0.0, 2, Some(1)).view()).unwrap();
        store.store(&steps(10.0, 3, Some(2)).view()).unwrap();
        store.store(&steps(20.0, 2, None).view()).unwrap();

        assert_eq!(store.delete_episode(1), 3);
        assert_eq!(store.num_episodes(), 2);
        assert_eq!(store.episode(0).unwrap(), EpisodeSpan { start: 0, len: 2, open: false });
        assert_eq!(store.episode(1).unwrap(), EpisodeSpan { start: 2, len: 2, open: true });
        assert_eq!(store.get_episode(0).unwrap().reward, &[0.0, 1.0]);
        assert_eq!(store.get_episode(1).unwrap().reward, &[20.0, 21.0]);
        check_invariants(&store);
    }

    #[test]
    fn store_past_the_end_is_rejected() {
        let mut store = EpisodicStore::<f32>::new(4, OBS_DIM, 1);
        store.store(&steps(0.0, 3, None).view()).unwrap();
        let err = store.store(&steps(10.0, 2, None).view()).unwrap_err();
        assert_eq!(err, ReplayError::CapacityViolation { requested: 2, capacity: 1 });
        assert_eq!(store.len(), 3);
        assert_eq!(store.num_episodes(), 1);
        check_invariants(&store);
    }

    #[test]
    fn clear_discards_everything() {
        let mut store = EpisodicStore::<f32>::new(16, OBS_DIM, 1);
        store.store(&steps(0.0, 4, Some(3)).view()).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.num_episodes(), 0);
        assert!(store.get_episode(0).is_none());
    }
}
