//! Orchestration engine: override merging, dependency layering, alias
//! binding and container lifecycle management.
//!
//! Data flow per launch request: a read-only [`manifest_model::Manifest`]
//! goes through [`merge::resolve`] (cluster + optional group overlay →
//! effective specs), [`graph::build_layers`] (topological launch layers),
//! and the [`orchestrator::Orchestrator`] drives the runtime layer by
//! layer, binding dependency aliases via [`binder`] before each dependent
//! starts. Teardown reverses the start order.

pub mod binder;
pub mod graph;
pub mod merge;
pub mod orchestrator;

pub use binder::{AliasBinding, BindingPlan};
pub use graph::{build_layers, CycleError};
pub use merge::{apply_overlay, resolve, ResolveError};
pub use orchestrator::{
    ClusterStatus, ContainerPhase, ContainerStatusEntry, FailureCause, LaunchError, Orchestrator,
    OrchestratorConfig, RunningCluster, RunningContainer, TeardownReport,
};
