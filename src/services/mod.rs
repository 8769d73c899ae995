pub mod conversion;
pub mod posting;
pub mod store;

pub use posting::PostingService;
pub use store::ConversionStateStore;
