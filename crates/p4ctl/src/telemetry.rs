//! Tunnel counter polling.
//!
//! Every cycle reads, for each tunnel, the ingress counter on the tunnel's
//! ingress switch and the egress counter on its egress switch, both at the
//! tunnel id. The loop only looks at cancellation while it sleeps; a cycle
//! that has started runs to completion.

use crate::config::TelemetryConfig;
use crate::error::{TelemetryError, TelemetryResult};
use crate::policy::Tunnel;
use crate::switches::SwitchSet;
use p4ctl_catalog::{Catalog, CounterId};
use p4ctl_runtime::{Switch, Transport};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reads one counter cell as `(packets, bytes)`. Index 0 sums every cell.
pub async fn poll_counter<T: Transport>(
    catalog: &Catalog,
    switch: &Switch<T>,
    counter: &str,
    index: i64,
) -> TelemetryResult<(u64, u64)> {
    let counter_id = catalog.resolve_counter(counter)?;
    read_cell(switch, counter_id, index).await
}

async fn read_cell<T: Transport>(
    switch: &Switch<T>,
    counter: CounterId,
    index: i64,
) -> TelemetryResult<(u64, u64)> {
    let readings = switch.read_counters(counter, index).await?;
    Ok(readings
        .iter()
        .fold((0, 0), |(packets, bytes), r| (packets + r.packets, bytes + r.bytes)))
}

/// A counter resolved once, before the first cycle.
#[derive(Debug, Clone)]
struct ResolvedCounter {
    id: CounterId,
    name: String,
}

impl ResolvedCounter {
    fn resolve(catalog: &Catalog, name: &str) -> TelemetryResult<Self> {
        let id = catalog.resolve_counter(name)?;
        let name = catalog.counter_name(id).unwrap_or(name).to_string();
        Ok(Self { id, name })
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryPoller {
    interval: Duration,
    ingress: ResolvedCounter,
    egress: ResolvedCounter,
    tunnels: Vec<Tunnel>,
}

impl TelemetryPoller {
    /// Resolves both counters up front, so a missing counter fails before
    /// any read is issued.
    pub fn new(catalog: &Catalog, config: &TelemetryConfig, tunnels: Vec<Tunnel>) -> TelemetryResult<Self> {
        Ok(Self {
            interval: config.interval(),
            ingress: ResolvedCounter::resolve(catalog, &config.ingress_counter)?,
            egress: ResolvedCounter::resolve(catalog, &config.egress_counter)?,
            tunnels,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn tunnels(&self) -> &[Tunnel] {
        &self.tunnels
    }

    /// Runs one cycle and renders its report.
    pub async fn poll_once<T: Transport>(&self, switches: &SwitchSet<T>) -> TelemetryResult<String> {
        let mut report = String::from("----- Reading tunnel counters -----\n");
        for tunnel in &self.tunnels {
            let ingress = lookup(switches, &tunnel.ingress)?;
            let egress = lookup(switches, &tunnel.egress)?;
            let index = tunnel.counter_index();

            report.push_str(&format!("----- {} -> {} -----\n", tunnel.ingress, tunnel.egress));
            for (switch, counter) in [(ingress, &self.ingress), (egress, &self.egress)] {
                let (packets, bytes) = read_cell(switch, counter.id, index).await?;
                report.push_str(&format!(
                    "{} {} {}: {} packets ({} bytes)\n",
                    switch.name(),
                    counter.name,
                    index,
                    packets,
                    bytes
                ));
            }
        }
        report.push_str("----- Finished -----\n");
        Ok(report)
    }

    /// Sleeps, polls and hands each report to `sink` until `cancel` fires.
    /// Returns the number of completed cycles. A failed read ends the loop.
    pub async fn run<T, F>(
        &self,
        switches: &SwitchSet<T>,
        cancel: CancellationToken,
        mut sink: F,
    ) -> TelemetryResult<u64>
    where
        T: Transport,
        F: FnMut(&str),
    {
        info!(
            "Polling {} tunnel counters every {:?}",
            self.tunnels.len(),
            self.interval
        );
        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
            let report = self.poll_once(switches).await?;
            sink(&report);
            cycles += 1;
            debug!(cycles, "Telemetry cycle done");
        }
        info!("Telemetry stopped after {} cycles", cycles);
        Ok(cycles)
    }
}

fn lookup<'s, T: Transport>(switches: &'s SwitchSet<T>, name: &str) -> TelemetryResult<&'s Switch<T>> {
    switches
        .get(name)
        .ok_or_else(|| TelemetryError::UnknownSwitch(name.to_string()))
}
