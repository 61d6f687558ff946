//! CLI subcommand implementations.

pub mod resolve;
pub mod start;
pub mod status;
pub mod stop;
pub mod validate;

use std::sync::Arc;

use container_runtime::{ContainerRuntime, DockerCliConfig, DockerCliRuntime, MockRuntime};

/// Builds the runtime the commands drive: docker by default, the in-memory
/// mock for dry runs.
pub fn make_runtime(mock: bool) -> Arc<dyn ContainerRuntime> {
    if mock {
        Arc::new(MockRuntime::new())
    } else {
        Arc::new(DockerCliRuntime::new(DockerCliConfig::default()))
    }
}
