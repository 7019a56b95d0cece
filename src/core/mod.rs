//! Core business logic abstractions

pub mod config;
pub mod conversion;
pub mod error;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use conversion::{
    Conversion, ConversionRequest, ConversionService, ConversionState, CurrencyList,
    StateObserver,
};
pub use error::ServiceError;
pub use rates::{FetchError, RateProvider, RateSnapshot};
