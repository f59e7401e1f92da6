//! Controller run: bring-up, policy installation, inspection, telemetry and
//! shutdown, in that order.
//!
//! Everything runs on one task and every RPC is awaited before the next one
//! is issued. The cancellation token is checked before each switch is
//! brought up, before each policy and before each table dump; once it fires
//! no further operation is started. Without telemetry the sessions are held
//! until the token fires. Whatever happens after the switches are up, every
//! session is released before `run` returns.

use crate::config::ControllerConfig;
use crate::engine::{EngineStats, PolicyEngine};
use crate::error::{ControllerResult, PolicyError, PolicyResult};
use crate::inspect::read_table_rules;
use crate::policy::{Policy, Tunnel};
use crate::switches::SwitchSet;
use crate::telemetry::TelemetryPoller;
use p4ctl_catalog::Catalog;
use p4ctl_runtime::{Connector, PipelineConfig, RpcResult, Switch, SwitchInfo, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Whether a stage ran to its end or stopped at the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Complete,
    Interrupted,
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: EngineStats,
    pub telemetry_cycles: u64,
    /// The interrupt arrived before every switch was configured and inspected.
    pub interrupted: bool,
}

pub struct Controller<C: Connector> {
    connector: C,
    catalog: Arc<Catalog>,
    pipeline: PipelineConfig,
    config: ControllerConfig,
}

impl<C: Connector> Controller<C> {
    pub fn new(connector: C, catalog: Arc<Catalog>, pipeline: PipelineConfig, config: ControllerConfig) -> Self {
        Self {
            connector,
            catalog,
            pipeline,
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Connects, arbitrates and installs the pipeline on every configured
    /// switch, one after the other. On failure the switches already up are
    /// released. When `cancel` fires the switches brought up so far are
    /// returned.
    pub async fn bring_up(&self, cancel: &CancellationToken) -> RpcResult<SwitchSet<C::Transport>> {
        let mut switches = SwitchSet::new();
        for info in self.config.switch_infos() {
            if cancel.is_cancelled() {
                warn!(
                    "Interrupted during bring-up, {} of {} switches up",
                    switches.len(),
                    self.config.switches.len()
                );
                break;
            }
            match self.bring_up_one(&info).await {
                Ok(switch) => switches.push(switch),
                Err(e) => {
                    error!("Bring-up of {} failed: {}", info.name, e);
                    switches.close_all().await;
                    return Err(e);
                }
            }
        }
        Ok(switches)
    }

    async fn bring_up_one(&self, info: &SwitchInfo) -> RpcResult<Switch<C::Transport>> {
        let switch = self
            .connector
            .connect(info)
            .await?
            .arbitrate()
            .await?
            .install_pipeline(&self.pipeline)
            .await?;
        info!("Installed P4 program on {}", switch.info());
        Ok(switch)
    }

    /// Installs every configured policy in file order. Stops at the first
    /// failure, or before the next policy once `cancel` fires.
    pub async fn apply_policies<T: Transport>(
        &self,
        engine: &mut PolicyEngine,
        switches: &SwitchSet<T>,
        cancel: &CancellationToken,
    ) -> PolicyResult<Progress> {
        let total = self.config.policies.len();
        for (installed, policy) in self.config.policies.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Interrupted, {} of {} policies installed", installed, total);
                return Ok(Progress::Interrupted);
            }
            match policy {
                Policy::Tunnel(t) => {
                    let ingress = switch_for(switches, &t.ingress, t)?;
                    let egress = switch_for(switches, &t.egress, t)?;
                    engine.install_tunnel(ingress, egress, t).await?;
                }
                Policy::EcmpGroup(group) => {
                    let switch = switch_for(switches, &group.switch, group)?;
                    engine.install_ecmp_group(switch, group).await?;
                }
                Policy::EgressRewrite(rewrite) => {
                    let switch = switch_for(switches, &rewrite.switch, rewrite)?;
                    engine.install_egress_rewrite(switch, rewrite).await?;
                }
                Policy::ForwardRule(rule) => {
                    let switch = switch_for(switches, &rule.switch, rule)?;
                    engine.install_forward_rule(switch, rule).await?;
                }
            }
        }
        Ok(Progress::Complete)
    }

    /// Runs until `cancel` fires, then releases every session.
    /// Table dumps and telemetry reports go to `sink`.
    pub async fn run<F>(&self, cancel: CancellationToken, mut sink: F) -> ControllerResult<RunSummary>
    where
        F: FnMut(&str),
    {
        let switches = self.bring_up(&cancel).await?;
        let mut engine = PolicyEngine::new(Arc::clone(&self.catalog));

        let result = self.serve(&switches, &mut engine, cancel, &mut sink).await;
        if let Err(e) = &result {
            error!("Controller run failed: {}", e);
        }

        info!("Shutting down");
        let failed = switches.close_all().await;
        if failed > 0 {
            warn!("{} of {} sessions did not close cleanly", failed, switches.len());
        }
        info!("Policy engine: {}", engine.stats());

        let (progress, telemetry_cycles) = result?;
        Ok(RunSummary {
            stats: engine.stats(),
            telemetry_cycles,
            interrupted: progress == Progress::Interrupted,
        })
    }

    async fn serve<T, F>(
        &self,
        switches: &SwitchSet<T>,
        engine: &mut PolicyEngine,
        cancel: CancellationToken,
        sink: &mut F,
    ) -> ControllerResult<(Progress, u64)>
    where
        T: Transport,
        F: FnMut(&str),
    {
        if cancel.is_cancelled() {
            return Ok((Progress::Interrupted, 0));
        }
        if self.apply_policies(engine, switches, &cancel).await? == Progress::Interrupted {
            return Ok((Progress::Interrupted, 0));
        }

        if self.config.inspect {
            for switch in switches.iter() {
                if cancel.is_cancelled() {
                    warn!("Interrupted before reading the tables of {}", switch.name());
                    return Ok((Progress::Interrupted, 0));
                }
                sink(&read_table_rules(&self.catalog, switch).await?);
            }
        }

        let tunnels: Vec<Tunnel> = self.config.policies.tunnels().cloned().collect();
        if !self.config.telemetry.enabled || tunnels.is_empty() {
            info!("No tunnel telemetry to poll, holding sessions until interrupted");
            cancel.cancelled().await;
            return Ok((Progress::Complete, 0));
        }
        let poller = TelemetryPoller::new(&self.catalog, &self.config.telemetry, tunnels)?;
        let cycles = poller.run(switches, cancel, |report| sink(report)).await?;
        Ok((Progress::Complete, cycles))
    }
}

fn switch_for<'s, T: Transport>(
    switches: &'s SwitchSet<T>,
    name: &str,
    policy: &impl ToString,
) -> PolicyResult<&'s Switch<T>> {
    switches.get(name).ok_or_else(|| PolicyError::UnknownSwitch {
        policy: policy.to_string(),
        switch: name.to_string(),
    })
}
