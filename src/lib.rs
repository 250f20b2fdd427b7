//! glTF scene loading for a wgpu renderer: document import, geometry and
//! texture conversion, material resolution, scene graph solving, culling
//! and draw submission.

pub mod config;
pub mod culling;
pub mod document;
pub mod drawdata;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod job_system;
pub mod material;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod render;
pub mod scene_graph;
pub mod texture;

pub use config::LoadConfig;
pub use culling::Frustum;
pub use document::Document;
pub use drawdata::{MainViewDrawdata, ShadowDrawdata, CASCADE_COUNT};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use gpu::wgpu_device::WgpuDevice;
pub use gpu::RenderDevice;
pub use model::{DrawOptions, Drawcall, Drawdata, Model};
pub use progress::{LoadProgress, LoadStage, ProgressCell};
