pub mod conversion;
pub mod error;
pub mod snapshot;

pub use conversion::{
    AccountAlias, AfterIdentity, ConversionRow, ConversionSet, InventoryRow, IssueBatch,
    IssueBatchKey, PlantItem, PostingResult, PostingRunReport, PostingStatus, ReceiptBatch,
    ReceiptBatchKey, RunFailure, WarehouseRef,
};
pub use error::ConvertError;
pub use snapshot::ConversionSnapshot;
