use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};

/// Progress counter shared by worker threads. Reports through `log` every
/// tenth of the total.
#[derive(Debug)]
pub struct Progress {
    label: String,
    total: usize,
    count: AtomicUsize,
}

impl Progress {
    pub fn new(label: &str, total: usize) -> Self {
        info!("{}: started ({} iterations)", label, total);
        Self {
            label: label.to_string(),
            total,
            count: AtomicUsize::new(0),
        }
    }

    pub fn tick(&self) {
        self.add(1);
    }

    pub fn add(&self, n: usize) {
        let prev = self.count.fetch_add(n, Ordering::Relaxed);
        let now = prev + n;
        let step = (self.total / 10).max(1);
        if prev / step != now / step && now < self.total {
            debug!("{}: {}%", self.label, (100 * now) / self.total.max(1));
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        info!("{}: finished ({}/{})", self.label, self.count(), self.total);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_parallel_count() {
        let p = Progress::new("test", 1000);
        (0..1000).into_par_iter().for_each(|_| p.tick());
        assert_eq!(p.count(), 1000);
        p.finish();
    }

    #[test]
    fn test_add() {
        let p = Progress::new("test", 12);
        p.add(5);
        p.add(7);
        assert_eq!(p.count(), 12);
    }
}
