pub mod overlay;
pub mod patch;

pub use overlay::{OverlayDocument, OverlayDocumentBuilder};
pub use patch::{PatchDocument, PatchDocumentBuilder};
