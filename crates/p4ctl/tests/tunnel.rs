//! Tunnel installation against in-memory switches.

use p4ctl::{PolicyEngine, PolicyError, Tunnel};
use p4ctl_runtime::{Operation, RpcCode};
use p4ctl_test::{DeviceVerifier, Program, TestFabric};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn tunnel(ingress: &str, egress: &str, tunnel_id: u32, dst_eth: &str, dst_ip: &str, egress_port: u32) -> Tunnel {
    Tunnel {
        ingress: ingress.to_string(),
        egress: egress.to_string(),
        tunnel_id,
        dst_eth: dst_eth.parse().unwrap(),
        dst_ip: dst_ip.parse().unwrap(),
        egress_port,
    }
}

#[tokio::test]
async fn test_tunnel_writes_three_entries_in_order() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let t = tunnel("s1", "s2", 100, "08:00:00:00:02:22", "10.0.2.2", 2);

    engine
        .install_tunnel(env.switch("s1").unwrap(), env.switch("s2").unwrap(), &t)
        .await
        .unwrap();

    let s1 = DeviceVerifier::new(env.catalog(), "s1", env.device("s1"));
    s1.assert_write_order(&[
        "MyIngress.ipv4_lpm: hdr.ipv4.dstAddr=10.0.2.2/32 -> MyIngress.myTunnel_ingress(dst_id=100)",
        "MyIngress.myTunnel_exact: hdr.myTunnel.dst_id=100 -> MyIngress.myTunnel_forward(port=2)",
    ])
    .unwrap();
    assert_eq!(s1.described_writes().len(), 2);

    let s2 = DeviceVerifier::new(env.catalog(), "s2", env.device("s2"));
    assert_eq!(
        s2.described_writes(),
        vec!["MyIngress.myTunnel_exact: hdr.myTunnel.dst_id=100 -> MyIngress.myTunnel_egress(dstAddr=08:00:00:00:02:22, port=1)"]
    );

    let s3 = DeviceVerifier::new(env.catalog(), "s3", env.device("s3"));
    assert!(s3.described_writes().is_empty());

    assert_eq!(engine.stats().entries_written, 3);
    assert_eq!(engine.stats().policies_installed, 1);
}

#[tokio::test]
async fn test_tunnel_entries_use_catalog_ids() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let t = tunnel("s1", "s2", 100, "08:00:00:00:02:22", "10.0.2.2", 2);
    engine
        .install_tunnel(env.switch("s1").unwrap(), env.switch("s2").unwrap(), &t)
        .await
        .unwrap();

    let catalog = env.catalog();
    let s1 = DeviceVerifier::new(catalog, "s1", env.device("s1"));
    let transit = s1.exact_keys("MyIngress.myTunnel_exact", "hdr.myTunnel.dst_id").unwrap();
    assert_eq!(transit.len(), 1);
    let (key, entry) = &transit[0];
    assert_eq!(key, &vec![0, 100]);
    assert_eq!(entry.table_id.as_raw(), 43310977);
    assert_eq!(entry.action.action_id, catalog.resolve_action("myTunnel_forward").unwrap());
    assert_eq!(catalog.table_name(entry.table_id), Some("MyIngress.myTunnel_exact"));
    assert_eq!(catalog.action_name(entry.action.action_id), Some("MyIngress.myTunnel_forward"));

    let s2 = DeviceVerifier::new(catalog, "s2", env.device("s2"));
    let egress = s2.exact_keys("myTunnel_exact", "hdr.myTunnel.dst_id").unwrap();
    assert_eq!(egress[0].0, vec![0, 100]);
    assert_eq!(entry.matches, egress[0].1.matches);
}

#[tokio::test]
async fn test_tunnels_in_both_directions() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let s1 = env.switch("s1").unwrap();
    let s2 = env.switch("s2").unwrap();

    engine
        .install_tunnel(s1, s2, &tunnel("s1", "s2", 100, "08:00:00:00:02:22", "10.0.2.2", 2))
        .await
        .unwrap();
    engine
        .install_tunnel(s2, s1, &tunnel("s2", "s1", 101, "08:00:00:00:01:11", "10.0.1.1", 2))
        .await
        .unwrap();

    for name in ["s1", "s2"] {
        let verifier = DeviceVerifier::new(env.catalog(), name, env.device(name));
        verifier.assert_entry_count("MyIngress.ipv4_lpm", 1).unwrap();
        verifier.assert_entry_count("MyIngress.myTunnel_exact", 2).unwrap();
    }
    let s1 = DeviceVerifier::new(env.catalog(), "s1", env.device("s1"));
    s1.assert_installed(
        "MyIngress.myTunnel_exact: hdr.myTunnel.dst_id=101 -> MyIngress.myTunnel_egress(dstAddr=08:00:00:00:01:11, port=1)",
    )
    .unwrap();
}

#[tokio::test]
async fn test_reused_tunnel_id_last_write_wins() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let s1 = env.switch("s1").unwrap();
    let s2 = env.switch("s2").unwrap();

    engine
        .install_tunnel(s1, s2, &tunnel("s1", "s2", 100, "08:00:00:00:02:22", "10.0.2.2", 2))
        .await
        .unwrap();
    engine
        .install_tunnel(s1, s2, &tunnel("s1", "s2", 100, "08:00:00:00:02:23", "10.0.2.3", 3))
        .await
        .unwrap();

    let s1 = DeviceVerifier::new(env.catalog(), "s1", env.device("s1"));
    s1.assert_entry_count("MyIngress.myTunnel_exact", 1).unwrap();
    s1.assert_installed("MyIngress.myTunnel_exact: hdr.myTunnel.dst_id=100 -> MyIngress.myTunnel_forward(port=3)")
        .unwrap();
    s1.assert_entry_count("MyIngress.ipv4_lpm", 2).unwrap();
}

#[tokio::test]
async fn test_failed_egress_write_leaves_ingress_entries() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    env.device("s2").fail_writes_after(0, RpcCode::ResourceExhausted);
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let t = tunnel("s1", "s2", 100, "08:00:00:00:02:22", "10.0.2.2", 2);

    let err = engine
        .install_tunnel(env.switch("s1").unwrap(), env.switch("s2").unwrap(), &t)
        .await
        .unwrap_err();
    match &err {
        PolicyError::Rpc {
            written,
            total,
            source,
            ..
        } => {
            assert_eq!((*written, *total), (2, 3));
            assert_eq!(source.device(), "s2");
            assert_eq!(source.operation(), Operation::Write);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.policy(), "tunnel 100 (s1 -> s2)");

    let s1 = DeviceVerifier::new(env.catalog(), "s1", env.device("s1"));
    assert_eq!(s1.described_entries().len(), 2);
    assert!(env.device("s2").entries().is_empty());
    assert_eq!(engine.stats().failures, 1);
    assert_eq!(engine.stats().policies_installed, 0);
}

#[tokio::test]
async fn test_unbuildable_tunnel_writes_nothing() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    // 17 bits do not fit the 16-bit tunnel id
    let t = tunnel("s1", "s2", 1 << 16, "08:00:00:00:02:22", "10.0.2.2", 2);

    let err = engine
        .install_tunnel(env.switch("s1").unwrap(), env.switch("s2").unwrap(), &t)
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyError::Build { ref source, .. } if source.is_shape()));
    assert!(env.device("s1").write_log().is_empty());
    assert!(env.device("s2").write_log().is_empty());
}
