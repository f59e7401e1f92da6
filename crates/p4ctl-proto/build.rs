//! Compiles the P4Info schema into a file descriptor set for the text and
//! JSON readers in `src/format.rs`.

use prost::Message;
use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

const PROTOS: &[&str] = &["p4/config/v1/p4info.proto", "p4/config/v1/p4types.proto"];

fn main() -> Result<(), Box<dyn Error>> {
    for proto in PROTOS {
        println!("cargo:rerun-if-changed=proto/{proto}");
    }

    let descriptors = protox::compile(PROTOS, ["proto"])?;
    let out = PathBuf::from(env::var("OUT_DIR")?).join("p4info_descriptor.bin");
    fs::write(out, descriptors.encode_to_vec())?;
    Ok(())
}
