/// Proto source files to compile.
const PROTO_FILES: &[&str] = &[
    "proto/blog/v1/blog.proto",
    "proto/blog/v1/healthz.proto",
    "proto/blog/v1/post.proto",
    "proto/blog/v1/user.proto",
];
const PROTO_INCLUDES: &[&str] = &["proto"];

fn main() {
    let protoc_path =
        protoc_bin_vendored::protoc_bin_path().expect("failed to find bundled protoc");
    std::env::set_var("PROTOC", protoc_path);

    // Messages double as the gateway's JSON bodies.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(
            ".blog.v1",
            "#[derive(serde::Serialize, serde::Deserialize)] #[serde(rename_all = \"camelCase\", default)]",
        )
        .compile_protos(PROTO_FILES, PROTO_INCLUDES)
        .expect("failed to compile protos");

    for path in PROTO_FILES {
        println!("cargo:rerun-if-changed={path}");
    }
}
