//! Generated gRPC stubs

#[allow(missing_docs, clippy::all)]
pub mod system {
    tonic::include_proto!("gnoi.system");
}

#[allow(missing_docs, clippy::all)]
pub mod os {
    tonic::include_proto!("gnoi.os");
}

#[allow(missing_docs, clippy::all)]
pub mod sonic {
    tonic::include_proto!("gnoi_sonic");
}
