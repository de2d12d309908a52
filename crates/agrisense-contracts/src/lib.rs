pub mod crops;
pub mod diagnosis;
pub mod errors;
pub mod events;
pub mod features;
pub mod weather;

pub use crops::{CropInfo, CropInfoTable, SuitabilityBand};
pub use diagnosis::DiagnosisReport;
pub use errors::{ErrorClass, PredictionError};
pub use features::{FeatureVector, RecommendInput, YieldInput};
pub use weather::WeatherSnapshot;
