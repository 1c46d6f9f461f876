//! Model artifact abstraction and its ONNX implementation

pub mod artifact;
pub mod inference;
pub mod loader;

pub use artifact::{FeatureMatrix, ModelArtifact};
pub use inference::OnnxModel;
pub use loader::{FeatureInfo, ModelLoader};
