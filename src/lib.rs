pub mod config;
pub mod decoder;
pub mod error;
pub mod logger;
pub mod materialize;
pub mod models;
pub mod openai;
pub mod pipeline;

pub use config::{Config, PipelineConfig, ProviderConfig};
pub use error::{GenerationError, Result};
pub use materialize::{MaterializeResult, PngFileMaterializer, TextureMaterializer};
pub use models::{
    supported_models, DecodedImage, GenerationOutput, GenerationRequest, ImageResponseFormat,
    ImageSize, ImageSource, Stage,
};
pub use pipeline::{GenerationPipeline, RequestHandle};
