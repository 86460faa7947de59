// Adapters layer: concrete implementations of the domain ports for the outside
// world (layout files, the verification tool process).

pub mod gds;
pub mod klayout;

pub use gds::{GdsCellSource, ListCellSource};
pub use klayout::KlayoutRunner;
