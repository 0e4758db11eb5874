//! Control-plane client implementations

mod grpc;

pub use grpc::{GrpcConnector, GrpcControlPlane};
