//! Read-only access to sectioned `key = value` settings.
//!
//! Values come back as raw text; typed parsing and range checks live in
//! `domain::config_validation` so a malformed value is reported, never
//! silently replaced.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    /// Soft flags only; unrecognised text falls back to `default`.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
