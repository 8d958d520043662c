// External I/O operations module
pub mod lock; // Lock file around schedule updates
pub mod machine; // Per-installation identity
