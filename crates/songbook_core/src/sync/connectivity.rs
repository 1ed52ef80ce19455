//! Connectivity signal consumed before any network attempt.

/// Reports whether the device currently has network reachability.
///
/// The replica manager consults this before every remote call; test doubles
/// and platform shells provide their own implementations.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Probe that always reports connectivity. Suitable for server-side and
/// development use where reachability is handled by the transport layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}
