pub mod batch_plan;
pub mod providers;
pub mod region;

pub use batch_plan::{assign_entry_offsets, GeographicPlanner, RegionGroup, DEFAULT_BATCH_SIZE};
pub use providers::mock::MockProvider;
pub use providers::ollama::OllamaProvider;
pub use providers::openrouter::OpenRouterProvider;
pub use providers::ProviderRegistry;
pub use region::{classify_region, full_region_name, OTHER_REGION};
