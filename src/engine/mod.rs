//! Inference engine module
//!
//! Provides the classification cascade:
//! - Label types and the ten classifier slots
//! - Routing from mask to gender to age classifiers
//! - OpenVINO model pool with lazy loading
//! - Image preprocessing

pub mod labels;
pub mod slot;
pub mod routing;
pub mod pool;
pub mod classifier;
pub mod preprocess;

pub use labels::{AgeBracket, AgeMod10Bucket, CompositeLabel, GenderState, MaskState};
pub use slot::ClassifierSlot;
pub use routing::{Classifier, ClassifierBank, ClassifierBankBuilder, RouteTrace, RoutingPolicy};
pub use pool::ModelPool;
pub use classifier::{openvino_bank, OpenVinoClassifier};
pub use preprocess::{ImageTensor, Preprocessor};
