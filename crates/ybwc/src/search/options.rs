use crate::constants::{DEFAULT_MAX_THREADS_PER_SPLITPOINT, MAX_THREADS};
use crate::error::PoolError;
use crate::types::Depth;

/// Live configuration of the thread pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of search threads, main thread included.
    pub threads: usize,
    /// Nodes shallower than this are never split.
    pub min_split_depth: Depth,
    /// Cap on the threads working on one split point, master included.
    pub max_threads_per_split_point: usize,
    /// Leave idle threads asleep at search start; they are woken when recruited.
    pub use_sleeping_threads: bool,
    /// Let threads that finish their share join other active split points.
    pub late_join: bool,
}

impl PoolOptions {
    /// Create options for `threads` threads, relying on defaults for the rest.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        PoolOptions {
            threads,
            ..Default::default()
        }
    }

    /// Override the number of threads when the CPU count is not appropriate.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        if let Some(value) = threads {
            self.threads = value;
        }
        self
    }

    #[must_use]
    pub fn with_min_split_depth(mut self, depth: Depth) -> Self {
        self.min_split_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_threads_per_split_point(mut self, n: usize) -> Self {
        self.max_threads_per_split_point = n;
        self
    }

    #[must_use]
    pub fn with_sleeping_threads(mut self, enabled: bool) -> Self {
        self.use_sleeping_threads = enabled;
        self
    }

    #[must_use]
    pub fn with_late_join(mut self, enabled: bool) -> Self {
        self.late_join = enabled;
        self
    }

    /// Checks that every value is usable by the pool.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.threads == 0 {
            return Err(PoolError::NoThreads);
        }
        if self.threads > MAX_THREADS {
            return Err(PoolError::TooManyThreads {
                requested: self.threads,
                max: MAX_THREADS,
            });
        }
        if !(1..=MAX_THREADS).contains(&self.max_threads_per_split_point) {
            return Err(PoolError::InvalidSplitWidth {
                value: self.max_threads_per_split_point,
                max: MAX_THREADS,
            });
        }
        if self.min_split_depth < 1 {
            return Err(PoolError::InvalidSplitDepth(self.min_split_depth));
        }
        Ok(())
    }

    /// Sets an option by its protocol name.
    ///
    /// Names are matched case-insensitively. The value is validated before it
    /// is stored, so a failed call leaves the options unchanged.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), PoolError> {
        let invalid = || PoolError::InvalidOptionValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        let mut updated = self.clone();

        match name.trim().to_ascii_lowercase().as_str() {
            "threads" => updated.threads = value.trim().parse().map_err(|_| invalid())?,
            "min split depth" => {
                updated.min_split_depth = value.trim().parse().map_err(|_| invalid())?
            }
            "max threads per split point" => {
                updated.max_threads_per_split_point = value.trim().parse().map_err(|_| invalid())?
            }
            "use sleeping threads" => {
                updated.use_sleeping_threads = parse_check(value).ok_or_else(invalid)?
            }
            "late join" => updated.late_join = parse_check(value).ok_or_else(invalid)?,
            _ => return Err(PoolError::UnknownOption(name.to_string())),
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        let cpus = num_cpus::get();
        PoolOptions {
            threads: cpus.clamp(1, MAX_THREADS),
            min_split_depth: if cpus < 8 { 4 } else { 7 },
            max_threads_per_split_point: DEFAULT_MAX_THREADS_PER_SPLITPOINT,
            use_sleeping_threads: true,
            late_join: true,
        }
    }
}

fn parse_check(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let options = PoolOptions::default();
        assert!(options.validate().is_ok());
        assert!(options.threads >= 1);
        assert_eq!(options.max_threads_per_split_point, 5);
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let options = PoolOptions::new(0);
        assert!(matches!(options.validate(), Err(PoolError::NoThreads)));
    }

    #[test]
    fn test_validate_rejects_too_many_threads() {
        let options = PoolOptions::new(MAX_THREADS + 1);
        assert!(matches!(
            options.validate(),
            Err(PoolError::TooManyThreads { requested: 65, max: 64 })
        ));
    }

    #[test]
    fn test_set_option_by_name() {
        let mut options = PoolOptions::new(1);
        options.set_option("Threads", "3").unwrap();
        options.set_option("min split depth", "6").unwrap();
        options.set_option("Max Threads per Split Point", "4").unwrap();
        options.set_option("Use Sleeping Threads", "false").unwrap();
        options.set_option("Late Join", "off").unwrap();

        assert_eq!(options.threads, 3);
        assert_eq!(options.min_split_depth, 6);
        assert_eq!(options.max_threads_per_split_point, 4);
        assert!(!options.use_sleeping_threads);
        assert!(!options.late_join);
    }

    #[test]
    fn test_set_option_rejects_bad_values() {
        let mut options = PoolOptions::new(2);

        assert!(matches!(
            options.set_option("Threads", "zero"),
            Err(PoolError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            options.set_option("Threads", "0"),
            Err(PoolError::NoThreads)
        ));
        assert!(matches!(
            options.set_option("Hash", "16"),
            Err(PoolError::UnknownOption(_))
        ));
        assert_eq!(options.threads, 2);
    }
}
