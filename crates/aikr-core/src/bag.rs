//! Capacity-bounded, priority-weighted container.
//!
//! Sampling is probabilistic (weight `(p / p_max)^sharpness`) but eviction is
//! deterministic: when full, the lowest-priority entry goes, oldest first on
//! ties. The bag never holds more than `capacity` members.

use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

/// Anything stored in a [`Bag`] must name itself with a stable key.
pub trait BagItem {
    type Key: Clone + Eq + Hash;

    fn key(&self) -> Self::Key;
}

struct Slot<T> {
    item: T,
    priority: f64,
    seq: u64,
}

pub struct Bag<T: BagItem> {
    capacity: usize,
    sharpness: f64,
    slots: Vec<Slot<T>>,
    index: HashMap<T::Key, usize>,
    next_seq: u64,
}

fn unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

impl<T: BagItem> Bag<T> {
    /// A zero capacity bag accepts nothing; negative or NaN sharpness is
    /// treated as 0 (uniform). Memory construction rejects both up front.
    pub fn new(capacity: usize, sharpness: f64) -> Self {
        let sharpness = if sharpness.is_nan() { 0.0 } else { sharpness.max(0.0) };
        Self {
            capacity,
            sharpness,
            slots: Vec::with_capacity(capacity.min(1024)),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn sharpness(&self) -> f64 {
        self.sharpness
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Insert `item` at `priority` (clamped to `[0, 1]`).
    ///
    /// Returns whatever is no longer resident: the displaced member with the
    /// same key, the evicted lowest-priority member, or `item` itself when it
    /// is the lowest of a full bag.
    pub fn insert(&mut self, item: T, priority: f64) -> Option<T> {
        let priority = unit(priority);
        let key = item.key();
        let seq = self.bump();

        if let Some(&i) = self.index.get(&key) {
            let slot = &mut self.slots[i];
            slot.priority = priority;
            slot.seq = seq;
            return Some(std::mem::replace(&mut slot.item, item));
        }

        if self.capacity == 0 {
            return Some(item);
        }

        let mut evicted = None;
        if self.is_full() {
            let victim = self.min_index()?;
            // Residents are older than the newcomer, so they lose ties.
            if priority < self.slots[victim].priority {
                return Some(item);
            }
            evicted = Some(self.remove_at(victim));
        }

        self.index.insert(key, self.slots.len());
        self.slots.push(Slot {
            item,
            priority,
            seq,
        });
        evicted
    }

    /// Lowest priority, oldest insertion first on ties.
    fn min_index(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.priority
                    .total_cmp(&b.priority)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i)
    }

    fn remove_at(&mut self, i: usize) -> T {
        let slot = self.slots.swap_remove(i);
        self.index.remove(&slot.item.key());
        if i < self.slots.len() {
            let moved = self.slots[i].item.key();
            self.index.insert(moved, i);
        }
        slot.item
    }

    fn weights(&self, bias: impl Fn(&T) -> f64) -> Vec<f64> {
        let max = self.slots.iter().map(|s| s.priority).fold(0.0, f64::max);
        self.slots
            .iter()
            .map(|s| {
                let base = if self.sharpness == 0.0 || max <= 0.0 {
                    1.0
                } else {
                    (s.priority / max).powf(self.sharpness)
                };
                let factor = bias(&s.item);
                if factor.is_finite() && factor > 0.0 {
                    base * factor
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn sample_index(&self, rng: &mut impl Rng, bias: impl Fn(&T) -> f64) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let weights = self.weights(bias);
        WeightedIndex::new(&weights).ok().map(|dist| dist.sample(rng))
    }

    /// Draw a member with probability proportional to `priority^sharpness`.
    /// All-zero priorities fall back to uniform.
    pub fn sample(&self, rng: &mut impl Rng) -> Option<&T> {
        let i = self.sample_index(rng, |_| 1.0).or_else(|| {
            (!self.slots.is_empty()).then(|| rng.random_range(0..self.slots.len()))
        })?;
        Some(&self.slots[i].item)
    }

    /// Like [`Bag::sample`] with each weight multiplied by `bias(item)`.
    /// Returns `None` when every biased weight is zero.
    pub fn sample_weighted(&self, rng: &mut impl Rng, bias: impl Fn(&T) -> f64) -> Option<&T> {
        let i = self.sample_index(rng, bias)?;
        Some(&self.slots[i].item)
    }

    /// Sample and remove.
    pub fn take_sampled(&mut self, rng: &mut impl Rng) -> Option<T> {
        let key = self.sample(rng)?.key();
        self.remove(&key)
    }

    /// Re-weight a member in place. Returns false if it is not resident.
    pub fn update_priority(&mut self, key: &T::Key, priority: f64) -> bool {
        match self.index.get(key) {
            Some(&i) => {
                self.slots[i].priority = unit(priority);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let i = *self.index.get(key)?;
        Some(self.remove_at(i))
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.index.get(key).map(|&i| &self.slots[i].item)
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn priority_of(&self, key: &T::Key) -> Option<f64> {
        self.index.get(key).map(|&i| self.slots[i].priority)
    }

    /// Mutate one member and return its new priority. The key must not change.
    pub fn modify(&mut self, key: &T::Key, f: impl FnOnce(&mut T, f64) -> f64) -> bool {
        let Some(&i) = self.index.get(key) else {
            return false;
        };
        let slot = &mut self.slots[i];
        slot.priority = unit(f(&mut slot.item, slot.priority));
        debug_assert!(slot.item.key() == *key, "bag item key changed in place");
        true
    }

    /// Apply `f` to every member; its return value is the new priority.
    pub fn reweight(&mut self, mut f: impl FnMut(&mut T, f64) -> f64) {
        for slot in &mut self.slots {
            slot.priority = unit(f(&mut slot.item, slot.priority));
        }
    }

    /// Remove every member for which `pred` holds.
    pub fn drain_where(&mut self, mut pred: impl FnMut(&T, f64) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.slots.len());
        for slot in self.slots.drain(..) {
            if pred(&slot.item, slot.priority) {
                removed.push(slot.item);
            } else {
                kept.push(slot);
            }
        }
        self.slots = kept;
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.item.key(), i))
            .collect();
        removed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    /// Members with their priorities, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.slots.iter().map(|s| (&s.item, s.priority))
    }

    /// Members oldest first; re-inserting in this order preserves tie-breaks.
    pub fn entries_by_age(&self) -> Vec<(&T, f64)> {
        let mut entries: Vec<&Slot<T>> = self.slots.iter().collect();
        entries.sort_by_key(|s| s.seq);
        entries.into_iter().map(|s| (&s.item, s.priority)).collect()
    }

    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<&T> {
        self.slots.iter().map(|s| &s.item).find(|item| pred(*item))
    }

    pub fn mean_priority(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        self.slots.iter().map(|s| s.priority).sum::<f64>() / self.slots.len() as f64
    }
}
