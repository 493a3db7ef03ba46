pub mod agent;
pub mod config;
pub mod hash;
pub mod perf;
pub mod symbols;

pub mod profilestorepb {
    tonic::include_proto!("parca.profilestore.v1alpha1");
}
