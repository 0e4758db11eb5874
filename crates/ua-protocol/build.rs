fn main() {
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("failed to locate protoc");
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed=proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(
            &[
                "proto/gnoi/system.proto",
                "proto/gnoi/os.proto",
                "proto/sonic/upgrade.proto",
            ],
            &["proto"],
        )
        .expect("failed to compile gRPC definitions");
}
