pub mod address_format;
pub mod builtin;
pub mod lookup;
pub mod phone_format;
pub mod review;

pub use address_format::{components_from_text, validate_address_format, AddressFormatReport, ComponentMatch};
pub use builtin::{default_registry, AddressFormatTool, AddressLookupTool, PhoneFormatTool};
pub use lookup::{AddressLookupStore, ComponentLookup, LookupQuery, LookupResult, LookupStatus};
pub use phone_format::{
    canonicalize_phone, classify_phone, validate_phone_format, PhoneFormatReport, PhoneMatch,
};
pub use review::ReviewPolicy;
