//! Table, action, field and counter names of the forwarding programs.
//!
//! The programs share the IPv4 LPM stage; `advanced_tunnel` adds the
//! tunnel table and counters, `load_balance` the two ECMP tables and the
//! egress MAC rewrite.

/// Port facing the attached host on every switch.
pub const SWITCH_TO_HOST_PORT: u32 = 1;

/// IPv4 longest-prefix forwarding, used by `qos` and by the tunnel ingress.
pub mod ipv4 {
    pub const LPM_TABLE: &str = "MyIngress.ipv4_lpm";
    pub const DST_ADDR: &str = "hdr.ipv4.dstAddr";

    pub const FORWARD: &str = "MyIngress.ipv4_forward";

    /// `ipv4_forward` parameters
    pub mod forward_params {
        pub const DST_ADDR: &str = "dstAddr";
        pub const PORT: &str = "port";
    }
}

/// `advanced_tunnel`
pub mod tunnel {
    pub const EXACT_TABLE: &str = "MyIngress.myTunnel_exact";
    pub const DST_ID: &str = "hdr.myTunnel.dst_id";

    /// Encapsulates on the ingress switch; installed in `ipv4_lpm`.
    pub const INGRESS: &str = "MyIngress.myTunnel_ingress";
    pub const FORWARD: &str = "MyIngress.myTunnel_forward";
    pub const EGRESS: &str = "MyIngress.myTunnel_egress";

    pub const INGRESS_COUNTER: &str = "MyIngress.ingressTunnelCounter";
    pub const EGRESS_COUNTER: &str = "MyIngress.egressTunnelCounter";

    pub mod ingress_params {
        pub const DST_ID: &str = "dst_id";
    }

    pub mod forward_params {
        pub const PORT: &str = "port";
    }

    pub mod egress_params {
        pub const DST_ADDR: &str = "dstAddr";
        pub const PORT: &str = "port";
    }
}

/// `load_balance`
pub mod load_balance {
    pub const GROUP_TABLE: &str = "MyIngress.ecmp_group";
    pub const DST_ADDR: &str = "hdr.ipv4.dstAddr";
    pub const SET_SELECT: &str = "MyIngress.set_ecmp_select";

    pub const NHOP_TABLE: &str = "MyIngress.ecmp_nhop";
    pub const SELECT: &str = "meta.ecmp_select";
    pub const SET_NHOP: &str = "MyIngress.set_nhop";

    pub const SEND_FRAME_TABLE: &str = "MyEgress.send_frame";
    pub const EGRESS_PORT: &str = "standard_metadata.egress_port";
    pub const REWRITE_MAC: &str = "MyEgress.rewrite_mac";

    pub mod select_params {
        pub const BASE: &str = "ecmp_base";
        pub const COUNT: &str = "ecmp_count";
    }

    pub mod nhop_params {
        pub const DMAC: &str = "nhop_dmac";
        pub const IPV4: &str = "nhop_ipv4";
        pub const PORT: &str = "port";
    }

    pub mod rewrite_params {
        pub const SMAC: &str = "smac";
    }
}
