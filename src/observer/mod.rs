// Observer system: stores publish change events, views subscribe to them

pub mod registry;
pub mod traits;

// Re-export core types
pub use registry::*;
pub use traits::*;
