fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the system protoc when one is configured, the vendored one otherwise.
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| format!("{:?}", e))?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_build::configure()
        .build_server(false)
        .bytes(["."])
        .compile_protos(
            &["proto/parca/profilestore/v1alpha1/profilestore.proto"],
            &["proto"],
        )?;
    Ok(())
}
