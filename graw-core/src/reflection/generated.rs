#![allow(clippy::all)]

pub mod reflection_v1alpha {
    include!("generated/grpc.reflection.v1alpha.rs");
}
