//! Crossplane provider for [Elestio](https://elest.io) managed services.
//!
//! The provider exposes Elestio resources of the Elestio Terraform provider as Kubernetes
//! custom resources. This crate holds the pieces between the Kubernetes API and the Terraform
//! execution layer:
//!
//! * [`config`] shapes Terraform resources into managed resource kinds,
//! * [`clients`] builds the Terraform setup of a managed resource, resolving its provider
//!   config into Elestio credentials,
//! * [`apis`] holds the custom resources served by the provider.

pub mod apis;
pub mod cli;
pub mod client;
pub mod clients;
pub mod config;
pub mod crd;
pub mod logging;
pub mod managed;
pub mod tracker;
