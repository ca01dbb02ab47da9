pub mod config;
pub mod manifest;
pub mod upload;

pub use config::{WidgetConfig, WidgetMode};
pub use manifest::{ModelDefinition, WidgetDefinition, WidgetManifest};
pub use upload::{FileUploadWidget, UploadWidget, WidgetDescriptor};
