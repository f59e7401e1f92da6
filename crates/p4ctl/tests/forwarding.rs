//! IPv4 forwarding end to end, and tunnel counters under traffic.

use p4ctl::{poll_counter, ForwardRule, PolicyEngine, Tunnel};
use p4ctl_catalog::{MatchInput, Value};
use p4ctl_test::{DeviceVerifier, Program, TestFabric};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;
use std::sync::Arc;

#[tokio::test]
async fn test_forward_rule_end_to_end() {
    let env = TestFabric::start(Program::Qos).await.unwrap();
    let catalog = env.catalog();
    let entry = catalog
        .build_table_entry(
            "MyIngress.ipv4_lpm",
            &[("hdr.ipv4.dstAddr", MatchInput::lpm(Ipv4Addr::new(10, 0, 1, 1), 32))],
            "MyIngress.ipv4_forward",
            &[
                ("dstAddr", Value::from("08:00:00:00:01:01".parse::<p4ctl_types::MacAddress>().unwrap())),
                ("port", Value::from(2u32)),
            ],
        )
        .unwrap();

    assert_eq!(entry.table_id, catalog.resolve_table("MyIngress.ipv4_lpm").unwrap());
    assert_eq!(entry.action.action_id, catalog.resolve_action("MyIngress.ipv4_forward").unwrap());
    assert_eq!(catalog.table_name(entry.table_id), Some("MyIngress.ipv4_lpm"));

    let s1 = env.switch("s1").unwrap();
    s1.write_table_entry(&entry).await.unwrap();
    assert_eq!(s1.read_table_entries().await.unwrap(), vec![entry]);

    let err = catalog
        .entry("MyIngress.ipv4_lpm")
        .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 32)
        .action("MyIngress.ipv4_rewrite")
        .build()
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "action 'MyIngress.ipv4_rewrite' not found");
}

#[tokio::test]
async fn test_forward_rules_through_engine() {
    let env = TestFabric::start(Program::Qos).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let s1 = env.switch("s1").unwrap();
    for (dst_eth, dst, port) in [
        ("08:00:00:00:01:01", "10.0.1.1/32", 2),
        ("08:00:00:00:02:00", "10.0.2.0/24", 3),
    ] {
        let rule = ForwardRule {
            switch: "s1".to_string(),
            dst_eth: dst_eth.parse().unwrap(),
            dst: dst.parse().unwrap(),
            port,
        };
        engine.install_forward_rule(s1, &rule).await.unwrap();
    }

    let verifier = DeviceVerifier::new(env.catalog(), "s1", env.device("s1"));
    verifier
        .assert_write_order(&[
            "MyIngress.ipv4_lpm: hdr.ipv4.dstAddr=10.0.1.1/32 -> MyIngress.ipv4_forward(dstAddr=08:00:00:00:01:01, port=2)",
            "MyIngress.ipv4_lpm: hdr.ipv4.dstAddr=10.0.2.0/24 -> MyIngress.ipv4_forward(dstAddr=08:00:00:00:02:00, port=3)",
        ])
        .unwrap();
    assert_eq!(engine.stats().entries_written, 2);
}

#[tokio::test]
async fn test_tunnel_counter_tracks_traffic() {
    let env = TestFabric::start(Program::AdvancedTunnel).await.unwrap();
    let mut engine = PolicyEngine::new(Arc::clone(env.catalog()));
    let tunnel = Tunnel {
        ingress: "s1".to_string(),
        egress: "s2".to_string(),
        tunnel_id: 100,
        dst_eth: "08:00:00:00:02:22".parse().unwrap(),
        dst_ip: "10.0.2.2".parse().unwrap(),
        egress_port: 2,
    };
    let s1 = env.switch("s1").unwrap();
    engine
        .install_tunnel(s1, env.switch("s2").unwrap(), &tunnel)
        .await
        .unwrap();

    let counter = "MyIngress.ingressTunnelCounter";
    assert_eq!(poll_counter(env.catalog(), s1, counter, 100).await.unwrap(), (0, 0));

    let counter_id = env.catalog().resolve_counter(counter).unwrap();
    let mut last = 0;
    for sent in 1..=5u64 {
        env.device("s1").hit_counter(counter_id, tunnel.counter_index(), 1, 98);
        let (packets, bytes) = poll_counter(env.catalog(), s1, counter, 100).await.unwrap();
        assert!(packets >= sent);
        assert!(packets >= last);
        assert_eq!(bytes, packets * 98);
        last = packets;
    }

    // other tunnels are unaffected
    assert_eq!(poll_counter(env.catalog(), s1, counter, 200).await.unwrap(), (0, 0));
}
