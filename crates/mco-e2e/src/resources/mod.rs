pub mod configmap;
pub mod mco;
pub mod names;
pub mod ocm;
pub mod secret;
