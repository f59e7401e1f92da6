//! The configured switches of a run, addressed by name.

use p4ctl_runtime::{Switch, Transport};
use tracing::{info, warn};

#[derive(Debug)]
pub struct SwitchSet<T: Transport> {
    switches: Vec<Switch<T>>,
}

impl<T: Transport> Default for SwitchSet<T> {
    fn default() -> Self {
        Self { switches: Vec::new() }
    }
}

impl<T: Transport> SwitchSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, switch: Switch<T>) {
        self.switches.push(switch);
    }

    pub fn get(&self, name: &str) -> Option<&Switch<T>> {
        self.switches.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Switch<T>> {
        self.switches.iter()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Releases every session. Failures are logged and do not stop the
    /// remaining releases. Returns the number of sessions that failed to
    /// close.
    pub async fn close_all(&self) -> usize {
        let mut failed = 0;
        for switch in &self.switches {
            match switch.close().await {
                Ok(()) => info!("Closed session to {}", switch.name()),
                Err(e) => {
                    failed += 1;
                    warn!("Failed to close session to {}: {}", switch.name(), e);
                }
            }
        }
        failed
    }
}

impl<T: Transport> From<Vec<Switch<T>>> for SwitchSet<T> {
    fn from(switches: Vec<Switch<T>>) -> Self {
        Self { switches }
    }
}

impl<T: Transport> FromIterator<Switch<T>> for SwitchSet<T> {
    fn from_iter<I: IntoIterator<Item = Switch<T>>>(iter: I) -> Self {
        Self {
            switches: iter.into_iter().collect(),
        }
    }
}
