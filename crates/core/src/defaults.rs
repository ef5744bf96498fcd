//! Request defaulting.

/// Opt-in capability to fill unset request fields before validation.
///
/// The default implementation leaves the message untouched, so messages
/// without defaults only need an empty `impl`.
pub trait Defaultable {
    fn apply_defaults(&mut self) {}
}
