//! Test fixtures: program descriptors and switch identities
//!
//! The descriptors are the P4Info text files `p4c` emits for the three
//! forwarding programs the controller drives.

use p4ctl_catalog::descriptor::{self, DescriptorFormat};
use p4ctl_catalog::{Catalog, CatalogResult};
use p4ctl_runtime::{PipelineConfig, SwitchInfo};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const ADVANCED_TUNNEL_P4INFO: &str = include_str!("../fixtures/advanced_tunnel.p4info.txt");
pub const LOAD_BALANCE_P4INFO: &str = include_str!("../fixtures/load_balance.p4info.txt");
pub const QOS_P4INFO: &str = include_str!("../fixtures/qos.p4info.txt");

/// One of the forwarding programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    /// Tunnel encapsulation with per-tunnel counters
    AdvancedTunnel,
    /// ECMP group and next-hop tables plus egress MAC rewrite
    LoadBalance,
    /// IPv4 LPM forwarding
    Qos,
}

impl Program {
    pub const ALL: [Program; 3] = [Program::AdvancedTunnel, Program::LoadBalance, Program::Qos];

    pub fn name(&self) -> &'static str {
        match self {
            Program::AdvancedTunnel => "advanced_tunnel",
            Program::LoadBalance => "load_balance",
            Program::Qos => "qos",
        }
    }

    pub fn p4info_text(&self) -> &'static str {
        match self {
            Program::AdvancedTunnel => ADVANCED_TUNNEL_P4INFO,
            Program::LoadBalance => LOAD_BALANCE_P4INFO,
            Program::Qos => QOS_P4INFO,
        }
    }

    pub fn catalog(&self) -> CatalogResult<Catalog> {
        let p4info = descriptor::decode(self.p4info_text().as_bytes(), DescriptorFormat::Text)?;
        Catalog::from_p4info(p4info)
    }

    /// Stand-in for the BMv2 JSON; in-memory devices do not interpret it.
    pub fn device_config(&self) -> Vec<u8> {
        format!("{{\"program\": \"{}.p4\"}}", self.name()).into_bytes()
    }

    pub fn pipeline(&self) -> CatalogResult<PipelineConfig> {
        let catalog = self.catalog()?;
        Ok(PipelineConfig::new(catalog.p4info().clone(), self.device_config()))
    }

    /// Lays the program out the way `make` does: `build/<name>.p4.p4info.txt`
    /// and `build/<name>.json` under `dir`. Returns both paths.
    pub fn write_build_dir(&self, dir: &Path) -> io::Result<(PathBuf, PathBuf)> {
        let build = dir.join("build");
        fs::create_dir_all(&build)?;
        let p4info = build.join(format!("{}.p4.p4info.txt", self.name()));
        let json = build.join(format!("{}.json", self.name()));
        fs::write(&p4info, self.p4info_text())?;
        fs::write(&json, self.device_config())?;
        Ok((p4info, json))
    }
}

/// Switch identities of the three-switch exercise topology
pub mod switch_fixtures {
    use super::*;

    pub fn s1() -> SwitchInfo {
        SwitchInfo::new("s1", "127.0.0.1:50051", 0)
    }

    pub fn s2() -> SwitchInfo {
        SwitchInfo::new("s2", "127.0.0.1:50052", 1)
    }

    pub fn s3() -> SwitchInfo {
        SwitchInfo::new("s3", "127.0.0.1:50053", 2)
    }

    pub fn three_switches() -> Vec<SwitchInfo> {
        vec![s1(), s2(), s3()]
    }
}
