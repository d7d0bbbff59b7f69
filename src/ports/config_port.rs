//! Configuration access port trait.

/// Typed lookups over `[section] key = value` configuration. Typed getters
/// fall back to `default` when the key is absent or unparseable.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Whether the key is present at all, even with an unparseable value.
    fn has(&self, section: &str, key: &str) -> bool {
        self.get_string(section, key).is_some()
    }
}
