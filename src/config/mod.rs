pub const DEFAULT_MAX_CACHE_BYTES: usize = 64 * 1024 * 1024;
// Largest packed key an ordered index can hold
pub const DEFAULT_MAX_KEY_BYTES: usize = 3056;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStatConfig {
    pub max_cache_bytes: usize,
    pub max_key_bytes: usize,
}

impl IndexStatConfig {
    pub fn new() -> IndexStatConfig {
        // Read environment variables 'INDEXSTAT_MAX_CACHE_BYTES' and 'INDEXSTAT_MAX_KEY_BYTES'
        // Unset or unparsable values fall back to the defaults
        let max_cache_bytes = match std::env::var("INDEXSTAT_MAX_CACHE_BYTES") {
            Ok(val) => val.parse::<usize>().unwrap_or(DEFAULT_MAX_CACHE_BYTES),
            Err(_) => DEFAULT_MAX_CACHE_BYTES
        };
        let max_key_bytes = match std::env::var("INDEXSTAT_MAX_KEY_BYTES") {
            Ok(val) => val.parse::<usize>().unwrap_or(DEFAULT_MAX_KEY_BYTES),
            Err(_) => DEFAULT_MAX_KEY_BYTES
        };
        IndexStatConfig {
            max_cache_bytes,
            max_key_bytes
        }
    }
}

impl Default for IndexStatConfig {
    fn default() -> Self {
        IndexStatConfig {
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            max_key_bytes: DEFAULT_MAX_KEY_BYTES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexStatConfig::default();
        assert_eq!(config.max_cache_bytes, 64 * 1024 * 1024);
        assert_eq!(config.max_key_bytes, 3056);
    }
}
