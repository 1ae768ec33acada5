use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto = "proto/csi.proto";
    let includes = [PathBuf::from("proto"), protoc_bin_vendored::include_path()?];

    let mut config = prost_build::Config::new();
    config.protoc_executable(protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos_with_config(config, &[proto], &includes)?;

    println!("cargo:rerun-if-changed={proto}");
    Ok(())
}
