use std::time::Duration;

#[derive(Clone, PartialEq, Eq, Debug)]
/// Config values for [`DirectoryBatcher`](crate::DirectoryBatcher).
pub struct BatcherConfig {
    /// How long a window keeps accepting new keys after the latest arrival
    pub debounce_window: Duration,
    /// Number of pending keys that forces a window to dispatch early
    ///
    /// Also used to split oversized windows into multiple service calls
    pub max_batch_size: usize,
    /// Upper bound on the total age of a window before it must dispatch
    pub max_batch_wait: Duration,
    /// Ask the directory service for every variant of each entry
    pub include_all_variants: bool,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(50),
            max_batch_size: 100,
            max_batch_wait: Duration::from_millis(250),
            include_all_variants: false,
        }
    }
}

impl From<&courier_config::Directory> for BatcherConfig {
    fn from(settings: &courier_config::Directory) -> Self {
        Self {
            debounce_window: Duration::from_millis(settings.debounce_window_ms),
            max_batch_size: settings.max_batch_size,
            max_batch_wait: Duration::from_millis(settings.max_batch_wait_ms),
            include_all_variants: settings.include_all_variants,
        }
    }
}
