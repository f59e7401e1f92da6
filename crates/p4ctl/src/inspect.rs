//! Table dump of one switch, rendered by name.

use p4ctl_catalog::Catalog;
use p4ctl_runtime::{RpcResult, Switch, Transport};

/// Reads every installed entry of `switch` and renders one line per entry.
pub async fn read_table_rules<T: Transport>(catalog: &Catalog, switch: &Switch<T>) -> RpcResult<String> {
    let entries = switch.read_table_entries().await?;

    let mut out = format!("----- Reading tables rules for {} -----\n", switch.name());
    for entry in &entries {
        out.push_str(&catalog.describe(entry));
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4ctl_test::{Program, TestFabric};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_empty_switch() {
        let env = TestFabric::start(Program::Qos).await.unwrap();
        let s2 = env.switch("s2").unwrap();
        assert_eq!(
            read_table_rules(env.catalog(), s2).await.unwrap(),
            "----- Reading tables rules for s2 -----\n"
        );
    }

    #[tokio::test]
    async fn test_entries_by_name() {
        let env = TestFabric::start(Program::Qos).await.unwrap();
        let s1 = env.switch("s1").unwrap();
        let entry = env
            .catalog()
            .entry("ipv4_lpm")
            .lpm("hdr.ipv4.dstAddr", std::net::Ipv4Addr::new(10, 0, 1, 1), 32)
            .action("ipv4_forward")
            .param("dstAddr", "08:00:00:00:01:01".parse::<p4ctl_types::MacAddress>().unwrap())
            .param("port", 2u32)
            .build()
            .unwrap();
        s1.write_table_entry(&entry).await.unwrap();

        assert_eq!(
            read_table_rules(env.catalog(), s1).await.unwrap(),
            "----- Reading tables rules for s1 -----\n\
             MyIngress.ipv4_lpm: hdr.ipv4.dstAddr=10.0.1.1/32 -> MyIngress.ipv4_forward(dstAddr=08:00:00:00:01:01, port=2)\n"
        );
    }
}
