pub mod error;
pub mod tools;
pub mod traits;
pub mod types;

pub use error::ExtractError;
pub use tools::{ToolName, ToolRegistry};
pub use traits::{LlmProvider, LlmRequest, LlmResponse, OcrOutput, OcrProvider, StructuredSchema, Tool};
pub use types::{
    AddressComponent, AddressComponents, Batch, BatchType, ContactEntry, ContactList,
    MultiEntryResult, PhoneType, RawContact, ERROR_CONFIDENCE_KEY, LOW_CONFIDENCE_THRESHOLD,
};
