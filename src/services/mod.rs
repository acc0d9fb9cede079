// Receiving pipeline
pub mod duplicates;
pub mod receiving;
pub mod submission;

// Photo storage and short links
pub mod photos;

// Markout/shrink tracking
pub mod mos;

pub use duplicates::DuplicatePolicy;
pub use mos::MosService;
pub use photos::PhotoService;
pub use receiving::{ReceivingService, ReceivingSettings};
