//! Sum tree for proportional priority sampling.
//!
//! The tree is a flat array: node `i` has children `2i + 1` and
//! `2i + 2`, leaves occupy the last `capacity` entries and every
//! internal node holds the sum of its two children. Point update and
//! weighted selection both walk one root-to-leaf path, so they cost
//! O(log capacity).

/// Sum-indexed binary tree over a fixed number of slots.
///
/// Leaves correspond 1:1 to slot indexes `0..capacity`, including
/// never-written slots, which hold zero mass and can never be selected.
/// The `alpha`-th power of each priority is what the tree stores; the
/// exponent is fixed at construction.
#[derive(Clone, Debug)]
pub struct SumTree {
    alpha: f32,
    capacity: usize,
    tree: Vec<f32>,
}

impl SumTree {
    /// Creates a tree with `capacity` zero-mass leaves.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or `alpha` is outside `[0, 1]`.
    pub fn new(capacity: usize, alpha: f32) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        assert!((0.0..=1.0).contains(&alpha), "alpha must be in [0, 1]");
        Self {
            alpha,
            capacity,
            tree: vec![0f32; 2 * capacity - 1],
        }
    }

    /// Number of leaves.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The exponent applied to stored priorities.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Total priority mass, the root of the tree.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// The mass stored at leaf `ix`, i.e. `priority^alpha`.
    pub fn leaf(&self, ix: usize) -> f32 {
        debug_assert!(ix < self.capacity);
        self.tree[ix + self.capacity - 1]
    }

    /// Stores `p^alpha` at leaf `ix` and restores the sum invariant on
    /// the path up to the root.
    ///
    /// The caller validates that `p` is non-negative.
    pub fn update(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        debug_assert!(p >= 0.0);

        let v = p.powf(self.alpha);
        let ix = ix + self.capacity - 1;
        let change = v - self.tree[ix];
        self.tree[ix] = v;
        if ix > 0 {
            self.propagate(ix, change);
        }
    }

    fn propagate(&mut self, ix: usize, change: f32) {
        let parent = (ix - 1) / 2;
        self.tree[parent] += change;
        if parent != 0 {
            self.propagate(parent, change);
        }
    }

    /// Finds the leaf selected by the cumulative mass `s`, the
    /// inverse-CDF descent: at each internal node go left if `s` is
    /// below the left child's sum, otherwise subtract it and go right.
    ///
    /// Returns the slot index of the selected leaf.
    pub fn descend(&self, s: f32) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= self.capacity - 1);
        ix + 1 - self.capacity
    }

    fn retrieve(&self, ix: usize, s: f32) -> usize {
        let left = 2 * ix + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return ix;
        }

        // The zero-mass guard keeps rounding in `s` from pushing the
        // descent into never-written leaves.
        if s <= self.tree[left] || self.tree[right] == 0f32 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }

    /// Zeroes every node.
    pub fn clear(&mut self) {
        for v in self.tree.iter_mut() {
            *v = 0f32;
        }
    }
}
