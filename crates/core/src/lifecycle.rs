// Host lifecycle hooks forwarded to the plugins

/// Lifecycle notifications delivered by the host shell.
///
/// The host calls these from its main thread.
pub trait HostLifecycle {
    /// The host became visible again
    fn on_resume(&mut self);

    /// The host went to the background
    fn on_pause(&mut self);

    /// The host is going away; release every resource
    fn on_destroy(&mut self);
}
