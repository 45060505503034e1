//! Public types for the BananaAI API.

mod generate;
mod operation;
mod options;
mod outcome;

pub use generate::{GeneratedImage, TextExpansion};
pub use operation::{AspectRatio, ClientKey, OperationClass};
pub use options::{
    ExpandOptions, HarmCategory, ImageOptions, ReferenceMaterial, SafetySetting, SafetyThreshold,
};
pub use outcome::Outcome;
