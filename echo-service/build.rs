use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tests serve this descriptor set through the reflection service.
    let descriptors = PathBuf::from(std::env::var("OUT_DIR")?).join("descriptors.bin");

    tonic_prost_build::configure()
        .file_descriptor_set_path(descriptors)
        .protoc_arg("--experimental_allow_proto3_optional")
        .build_client(false)
        .compile_protos(&["proto/echo.proto"], &["proto"])?;

    Ok(())
}
