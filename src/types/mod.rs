// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Project, region, service and image names are validated once at the edge.

mod id;
mod image_ref;
mod project;
mod service_name;

pub use id::{BuildId, OperationName};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use project::{DEFAULT_REGION, ProjectId, ProjectIdError, Region, RegionError};
pub use service_name::{MAX_SERVICE_NAME_LEN, ServiceName, ServiceNameError};
