//! Width histogram with relative-tolerance binning.
//!
//! Bins are equivalence classes under a 20% relative tolerance: a width
//! joins the first bin whose running mean it is within tolerance of,
//! otherwise it opens a new bin. Because bin means drift as samples arrive,
//! a fuse pass afterwards merges bins that ended up within tolerance of each
//! other.

/// Maximum number of bins per histogram; further outliers are dropped.
pub const MAX_BINS: usize = 16;

/// Relative tolerance for two widths to be considered the same class.
pub const TOLERANCE: f32 = 0.2;

/// `true` when `a` and `b` fall in the same equivalence class.
fn within_tolerance(a: u32, b: u32) -> bool {
    (a.abs_diff(b) as f32) < TOLERANCE * a.max(b) as f32
}

/// One width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bin {
    pub count: u32,
    pub sum: u64,
    pub mean: u32,
    pub min: u32,
    pub max: u32,
}

impl Bin {
    fn seed(width: u32) -> Self {
        Self {
            count: 1,
            sum: u64::from(width),
            mean: width,
            min: width,
            max: width,
        }
    }

    fn absorb_width(&mut self, width: u32) {
        self.count += 1;
        self.sum += u64::from(width);
        self.mean = (self.sum / u64::from(self.count)) as u32;
        self.min = self.min.min(width);
        self.max = self.max.max(width);
    }

    fn absorb_bin(&mut self, other: &Bin) {
        self.count += other.count;
        self.sum += other.sum;
        self.mean = (self.sum / u64::from(self.count)) as u32;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Histogram {
    bins: Vec<Bin>,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            bins: Vec::with_capacity(MAX_BINS),
        }
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin one width: linear probe for a matching class, else open a new bin
    /// if there is room.
    pub fn add(&mut self, width: u32) {
        for bin in &mut self.bins {
            if within_tolerance(width, bin.mean) {
                bin.absorb_width(width);
                return;
            }
        }
        if self.bins.len() < MAX_BINS {
            self.bins.push(Bin::seed(width));
        }
    }

    /// Merge bins whose means drifted into tolerance of each other,
    /// repeating until no pair merges.
    pub fn fuse_bins(&mut self) {
        loop {
            let mut merged = false;
            let mut n = 0;
            while n + 1 < self.bins.len() {
                let mut m = n + 1;
                while m < self.bins.len() {
                    if within_tolerance(self.bins[n].mean, self.bins[m].mean) {
                        let other = self.bins.remove(m);
                        self.bins[n].absorb_bin(&other);
                        merged = true;
                    } else {
                        m += 1;
                    }
                }
                n += 1;
            }
            if !merged {
                break;
            }
        }
    }

    pub fn sort_by_mean(&mut self) {
        self.bins.sort_by_key(|bin| bin.mean);
    }

    /// Ascending by population, so the rarest class (a sync or delimiter
    /// candidate) lands first.
    pub fn sort_by_count(&mut self) {
        self.bins.sort_by_key(|bin| bin.count);
    }

    pub fn delete_bin(&mut self, index: usize) {
        if index < self.bins.len() {
            self.bins.remove(index);
        }
    }
}
