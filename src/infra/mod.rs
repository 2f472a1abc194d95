pub mod podman_adapter;
pub mod registry_adapter;
pub mod registry_auth;
