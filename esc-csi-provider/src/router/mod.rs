pub mod grpc;
pub mod health;
