//! Policy engine.
//!
//! Turns policies into table entries and writes them. Every entry of a
//! policy is built before the first one is written, so a naming or shape
//! mistake never leaves a policy half installed. Writes are issued one at a
//! time in a fixed order; a failed write stops the policy and leaves the
//! entries already written in place.

use crate::error::{PolicyError, PolicyResult};
use crate::policy::{EcmpGroup, EgressRewrite, ForwardRule, Tunnel};
use crate::tables::{ipv4, load_balance, tunnel, SWITCH_TO_HOST_PORT};
use p4ctl_catalog::{Catalog, CatalogError, CatalogResult, TableEntry};
use p4ctl_runtime::{Switch, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Running totals over the lifetime of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub entries_written: usize,
    pub policies_installed: usize,
    pub failures: usize,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries written, {} policies installed, {} failures",
            self.entries_written, self.policies_installed, self.failures
        )
    }
}

/// One planned write.
struct PlannedWrite<'s, T: Transport> {
    switch: &'s Switch<T>,
    rule: &'static str,
    entry: TableEntry,
}

pub struct PolicyEngine {
    catalog: Arc<Catalog>,
    stats: EngineStats,
}

impl PolicyEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            stats: EngineStats::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Ingress, transit and egress entries of a tunnel, in write order.
    ///
    /// The first two go to the ingress switch, the third to the egress
    /// switch.
    pub fn tunnel_entries(&self, t: &Tunnel) -> CatalogResult<[TableEntry; 3]> {
        let ingress = self
            .catalog
            .entry(ipv4::LPM_TABLE)
            .lpm(ipv4::DST_ADDR, t.dst_ip, 32)
            .action(tunnel::INGRESS)
            .param(tunnel::ingress_params::DST_ID, t.tunnel_id)
            .build()?;

        let transit = self
            .catalog
            .entry(tunnel::EXACT_TABLE)
            .exact(tunnel::DST_ID, t.tunnel_id)
            .action(tunnel::FORWARD)
            .param(tunnel::forward_params::PORT, t.egress_port)
            .build()?;

        let egress = self
            .catalog
            .entry(tunnel::EXACT_TABLE)
            .exact(tunnel::DST_ID, t.tunnel_id)
            .action(tunnel::EGRESS)
            .param(tunnel::egress_params::DST_ADDR, t.dst_eth)
            .param(tunnel::egress_params::PORT, SWITCH_TO_HOST_PORT)
            .build()?;

        Ok([ingress, transit, egress])
    }

    /// The group entry followed by one entry per next hop, in the order
    /// given.
    pub fn ecmp_entries(&self, group: &EcmpGroup) -> CatalogResult<Vec<TableEntry>> {
        let mut entries = Vec::with_capacity(group.next_hops.len() + 1);
        entries.push(
            self.catalog
                .entry(load_balance::GROUP_TABLE)
                .with_match(load_balance::DST_ADDR, group.dst)
                .action(load_balance::SET_SELECT)
                .param(load_balance::select_params::BASE, group.base)
                .param(load_balance::select_params::COUNT, group.count)
                .build()?,
        );
        for hop in &group.next_hops {
            entries.push(
                self.catalog
                    .entry(load_balance::NHOP_TABLE)
                    .exact(load_balance::SELECT, hop.select)
                    .action(load_balance::SET_NHOP)
                    .param(load_balance::nhop_params::DMAC, hop.dmac)
                    .param(load_balance::nhop_params::IPV4, hop.ipv4)
                    .param(load_balance::nhop_params::PORT, hop.port)
                    .build()?,
            );
        }
        Ok(entries)
    }

    pub fn forward_entry(&self, rule: &ForwardRule) -> CatalogResult<TableEntry> {
        self.catalog
            .entry(ipv4::LPM_TABLE)
            .with_match(ipv4::DST_ADDR, rule.dst)
            .action(ipv4::FORWARD)
            .param(ipv4::forward_params::DST_ADDR, rule.dst_eth)
            .param(ipv4::forward_params::PORT, rule.port)
            .build()
    }

    pub fn egress_rewrite_entry(&self, rewrite: &EgressRewrite) -> CatalogResult<TableEntry> {
        self.catalog
            .entry(load_balance::SEND_FRAME_TABLE)
            .exact(load_balance::EGRESS_PORT, rewrite.port)
            .action(load_balance::REWRITE_MAC)
            .param(load_balance::rewrite_params::SMAC, rewrite.smac)
            .build()
    }

    pub async fn install_tunnel<T: Transport>(
        &mut self,
        ingress: &Switch<T>,
        egress: &Switch<T>,
        t: &Tunnel,
    ) -> PolicyResult<()> {
        let policy = t.to_string();
        let [ingress_entry, transit_entry, egress_entry] = self
            .tunnel_entries(t)
            .map_err(|source| self.build_failed(&policy, source))?;

        let writes = vec![
            PlannedWrite {
                switch: ingress,
                rule: "ingress tunnel",
                entry: ingress_entry,
            },
            PlannedWrite {
                switch: ingress,
                rule: "transit tunnel",
                entry: transit_entry,
            },
            PlannedWrite {
                switch: egress,
                rule: "egress tunnel",
                entry: egress_entry,
            },
        ];
        self.write_all(&policy, writes).await
    }

    pub async fn install_ecmp_group<T: Transport>(
        &mut self,
        switch: &Switch<T>,
        group: &EcmpGroup,
    ) -> PolicyResult<()> {
        let policy = group.to_string();
        let entries = self
            .ecmp_entries(group)
            .map_err(|source| self.build_failed(&policy, source))?;

        let writes = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| PlannedWrite {
                switch,
                rule: if i == 0 { "ECMP group" } else { "ECMP next hop" },
                entry,
            })
            .collect();
        self.write_all(&policy, writes).await
    }

    pub async fn install_forward_rule<T: Transport>(
        &mut self,
        switch: &Switch<T>,
        rule: &ForwardRule,
    ) -> PolicyResult<()> {
        let policy = rule.to_string();
        let entry = self
            .forward_entry(rule)
            .map_err(|source| self.build_failed(&policy, source))?;
        let writes = vec![PlannedWrite {
            switch,
            rule: "forward",
            entry,
        }];
        self.write_all(&policy, writes).await
    }

    pub async fn install_egress_rewrite<T: Transport>(
        &mut self,
        switch: &Switch<T>,
        rewrite: &EgressRewrite,
    ) -> PolicyResult<()> {
        let policy = rewrite.to_string();
        let entry = self
            .egress_rewrite_entry(rewrite)
            .map_err(|source| self.build_failed(&policy, source))?;
        let writes = vec![PlannedWrite {
            switch,
            rule: "egress rewrite",
            entry,
        }];
        self.write_all(&policy, writes).await
    }

    fn build_failed(&mut self, policy: &str, source: CatalogError) -> PolicyError {
        self.stats.failures += 1;
        warn!("Cannot build {}: {}", policy, source);
        PolicyError::Build {
            policy: policy.to_string(),
            source,
        }
    }

    async fn write_all<T: Transport>(
        &mut self,
        policy: &str,
        writes: Vec<PlannedWrite<'_, T>>,
    ) -> PolicyResult<()> {
        let total = writes.len();
        for (written, write) in writes.iter().enumerate() {
            if let Err(source) = write.switch.write_table_entry(&write.entry).await {
                self.stats.failures += 1;
                return Err(PolicyError::Rpc {
                    policy: policy.to_string(),
                    written,
                    total,
                    source,
                });
            }
            self.stats.entries_written += 1;
            info!(
                "Installed {} rule on {}: {}",
                write.rule,
                write.switch.name(),
                self.catalog.describe(&write.entry)
            );
        }
        self.stats.policies_installed += 1;
        Ok(())
    }
}
