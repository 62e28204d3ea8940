//! Compiles the CSI Identity and Controller services into tonic server stubs.

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let proto_file = "../../proto/csi.proto";
  let includes = ["../../proto"];

  tonic_build::configure()
    .build_client(false)
    .build_server(true)
    .compile(&[proto_file], &includes)?;

  println!("cargo:rerun-if-changed={}", proto_file);
  Ok(())
}
