//! In-memory fabric with every switch configured.

use crate::fixtures::{switch_fixtures, Program};
use p4ctl_catalog::{Catalog, CatalogError};
use p4ctl_runtime::{
    Connector, MemoryDevice, MemoryFabric, MemoryTransport, PipelineConfig, RpcError, Switch,
    SwitchInfo,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TestFabricError {
    #[error("fixture descriptor: {0}")]
    Catalog(#[from] CatalogError),

    #[error("bring-up: {0}")]
    Rpc(#[from] RpcError),
}

/// Three switches (s1, s2, s3) connected, arbitrated and running `program`.
pub struct TestFabric {
    program: Program,
    fabric: MemoryFabric,
    catalog: Arc<Catalog>,
    pipeline: PipelineConfig,
    switches: Vec<Switch<MemoryTransport>>,
}

impl TestFabric {
    pub async fn start(program: Program) -> Result<Self, TestFabricError> {
        Self::start_with(program, MemoryFabric::new(), switch_fixtures::three_switches()).await
    }

    /// Brings up `switches` on an existing fabric, so faults can be armed
    /// on its devices beforehand.
    pub async fn start_with(
        program: Program,
        fabric: MemoryFabric,
        switches: Vec<SwitchInfo>,
    ) -> Result<Self, TestFabricError> {
        let catalog = Arc::new(program.catalog()?);
        let pipeline = PipelineConfig::new(catalog.p4info().clone(), program.device_config());

        let mut up = Vec::with_capacity(switches.len());
        for info in &switches {
            let switch = fabric
                .connect(info)
                .await?
                .arbitrate()
                .await?
                .install_pipeline(&pipeline)
                .await?;
            up.push(switch);
        }
        debug!("Test fabric up with {} switches running {}", up.len(), program.name());

        Ok(Self {
            program,
            fabric,
            catalog,
            pipeline,
            switches: up,
        })
    }

    pub fn program(&self) -> Program {
        self.program
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn fabric(&self) -> &MemoryFabric {
        &self.fabric
    }

    pub fn device(&self, name: &str) -> MemoryDevice {
        self.fabric.device(name)
    }

    pub fn switch(&self, name: &str) -> Option<&Switch<MemoryTransport>> {
        self.switches.iter().find(|s| s.name() == name)
    }

    pub fn switches(&self) -> &[Switch<MemoryTransport>] {
        &self.switches
    }

    pub fn into_switches(self) -> Vec<Switch<MemoryTransport>> {
        self.switches
    }
}
