//! Vendor wire format types
//!
//! Serde shapes for each supported protocol family, kept separate from the
//! canonical model. Nothing here leaves the adapter layer.

pub mod anthropic;
pub mod google;
pub mod openai;
