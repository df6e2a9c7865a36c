pub mod etl;
pub mod matcher;
pub mod normalize;
pub mod similarity;

pub use crate::domain::model::{CacheEntry, CacheKey, GeocodeOutcome, GeocodeResult};
pub use crate::domain::ports::{
    GeocodeCache, Geocoder, Pipeline, RecordCount, ReverseGeocoder, Storage,
};
pub use crate::utils::error::Result;
