use std::{sync::Arc, time::Duration};

use crate::{
    hub::{Hub, MembershipAuthority, SharedHub},
    identity::{IdentityProvider, IdentityVerifier},
    notify::Notifier,
    realtime::Realtime,
    store::ChatStore,
};

/* ------------ shared per-process state ------------ */
#[derive(Clone)]
pub struct AppState {
    pub hub:           SharedHub,
    pub realtime:      Realtime,
    pub verifier:      Arc<IdentityVerifier>,
    pub notifier:      Notifier,
    pub internal_key:  Option<Arc<str>>,
    pub ping_interval: Duration,
    pub pong_timeout:  Duration,
}

impl AppState {
    /// Build the hub and wire every handle to it. The returned `Realtime` is
    /// already attached.
    pub fn new(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn IdentityProvider>,
        join_timeout: Duration,
    ) -> Self {
        let hub = Arc::new(Hub::new(MembershipAuthority::new(store.clone(), join_timeout)));
        let realtime = Realtime::new();
        realtime.attach(hub.clone());

        Self {
            hub,
            notifier: Notifier::new(realtime.clone(), store.clone()),
            verifier: Arc::new(IdentityVerifier::new(provider, store)),
            realtime,
            internal_key: None,
            ping_interval: Duration::from_secs(25),
            pong_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_internal_key(mut self, key: Option<String>) -> Self {
        self.internal_key = key.map(Arc::from);
        self
    }

    pub fn with_ping_interval(mut self, every: Duration) -> Self {
        self.ping_interval = every;
        self
    }

    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }
}
