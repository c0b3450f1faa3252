use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use super::{AcmeError, AcmeManager, HostPolicy};
use crate::supervisor::{stop_channel, Actor, StopHandle, StopSignal};

/// Obtains certificates for every host the manager's policy allows, at start
/// and then once per interval, so handshakes find them already resident.
///
/// Hosts that already have a certificate in memory or in the cache are not
/// reissued. Without a host policy there is nothing to obtain ahead of time.
pub struct CertificateRefresher {
    manager: Arc<AcmeManager>,
    interval: Duration,
    stop: StopSignal,
    stop_handle: StopHandle,
}

impl fmt::Debug for CertificateRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRefresher")
            .field("manager", &self.manager)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl CertificateRefresher {
    #[must_use]
    pub fn new(manager: Arc<AcmeManager>, interval: Duration) -> Self {
        let (stop_handle, stop) = stop_channel();
        Self {
            manager,
            interval,
            stop,
            stop_handle,
        }
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Obtain a certificate for each allowed host. Returns how many hosts
    /// have one ready afterwards.
    pub async fn refresh(&self) -> usize {
        refresh_hosts(&self.manager).await
    }

    /// Refresh immediately, then once per interval until a stop request
    /// arrives. A pending stop request wins over a due refresh.
    pub async fn run(&mut self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                Some(ack) = self.stop.requested() => {
                    drop(ticker);
                    ack.acknowledge();
                    tracing::debug!("Certificate refresh stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let ready = refresh_hosts(&self.manager).await;
                    tracing::debug!(ready, "Certificate refresh finished");
                }
            }
        }
    }
}

async fn refresh_hosts(manager: &AcmeManager) -> usize {
    let hosts = manager
        .host_policy()
        .map(HostPolicy::hosts)
        .unwrap_or_default();

    let mut ready = 0;
    for host in &hosts {
        match manager.obtain(host).await {
            Ok(_) => ready += 1,
            Err(AcmeError::NoIssuer(_)) => {
                tracing::debug!(host = %host, "No cached certificate and no issuer");
            }
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "Failed to obtain certificate");
            }
        }
    }
    ready
}

#[async_trait]
impl Actor for CertificateRefresher {
    fn name(&self) -> &'static str {
        "acme-certificate-refresher"
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        CertificateRefresher::run(self).await;
        Ok(())
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }
}
