//! Regenerates the checked-in `grpc.reflection.v1alpha` message types.
//!
//! Run with `cargo run -p graw_core --features gen-proto --bin generate-reflection-service`.
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let proto_dir = manifest_dir.join("proto");
    let out_dir = manifest_dir.join("src/reflection/generated");

    std::fs::create_dir_all(&out_dir)?;

    // Messages only. Both protocol versions share them and the stream is opened on the
    // version's path through the generic client.
    tonic_prost_build::configure()
        .build_server(false)
        .build_client(false)
        .out_dir(&out_dir)
        .compile_protos(&[proto_dir.join("reflection.proto")], &[proto_dir])?;

    println!("Reflection protocol types written to {}", out_dir.display());

    Ok(())
}
