use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    command::CommandSpec,
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::supervisor::{Supervisor, control_loop};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    spec: CommandSpec,
    cfg: Config,
    ambient: BTreeMap<OsString, OsString>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder for `spec` with the default configuration and an
    /// empty ambient environment.
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            cfg: Config::default(),
            ambient: BTreeMap::new(),
            subscribers: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Adds variables to the ambient environment the child inherits.
    ///
    /// The command's own overrides are applied on top.
    pub fn ambient_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.ambient
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Uses the current process environment as the ambient environment.
    pub fn inherit_env(self) -> Self {
        self.ambient_env(std::env::vars_os())
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every event, in order, through dedicated workers; a
    /// slow or panicking subscriber never stalls the supervisor.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor in the `stopped` status.
    ///
    /// Must be called within a tokio runtime. The supervisor keeps a handle to
    /// that runtime and spawns all of its tasks there, so its methods may later
    /// be called from any thread.
    pub fn build(self) -> Arc<Supervisor> {
        let runtime = Handle::current();
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let env = self.spec.merged_env(self.ambient);

        let subscribers =
            (!self.subscribers.is_empty()).then(|| SubscriberSet::on(&runtime, self.subscribers));

        let sup = Arc::new(Supervisor::new_internal(
            self.spec,
            self.cfg,
            env,
            bus,
            subscribers,
            runtime.clone(),
            control_tx,
            token.clone(),
        ));
        runtime.spawn(control_loop(Arc::downgrade(&sup), control_rx, token));
        sup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_starts_stopped() {
        let spec = CommandSpec::new("/bin/true").env("B", "override");
        let sup = SupervisorBuilder::new(spec)
            .ambient_env([("A", "1"), ("B", "ambient")])
            .build();
        assert_eq!(sup.status(), crate::Status::Stopped);
        assert!(sup.child().is_none());
        assert_eq!(sup.restarts(), 0);
    }

    #[test]
    fn test_ambient_env_accumulates() {
        let builder = SupervisorBuilder::new(CommandSpec::new("/bin/true"))
            .ambient_env([("A", "1")])
            .ambient_env([("B", "2"), ("A", "3")]);
        assert_eq!(builder.ambient.len(), 2);
        assert_eq!(builder.ambient.get(&OsString::from("A")), Some(&OsString::from("3")));
    }

    #[test]
    fn test_inherit_env_copies_process_environment() {
        let builder = SupervisorBuilder::new(CommandSpec::new("/bin/true")).inherit_env();
        let expected = std::env::vars_os().count();
        assert_eq!(builder.ambient.len(), expected);
    }
}
