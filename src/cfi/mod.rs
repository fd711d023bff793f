//! CFI (Canonical Fragment Identifier) support
//!
//! The default position-token primitive. The rendering layer hands out CFI
//! strings; this module parses, orders and builds them.
//!
//! ```text
//! epubcfi(/6/4[chapter1]!/4/2/1:42)
//!         │  │          │ │ │ │ └── character offset 42
//!         │  │          │ │ │ └──── text node (odd = text)
//!         │  │          │ │ └────── element index
//!         │  │          │ └──────── element index (body)
//!         │  │          └────────── indirection (into content doc)
//!         │  └───────────────────── spine item with ID
//!         └──────────────────────── spine element
//! ```

mod comparator;
mod generator;
mod parser;
mod types;

pub use comparator::{compare_cfi_strings, compare_paths};
pub use generator::{block_cfi, text_cfi, CfiBuilder};
pub use parser::{parse, CfiParseError};
pub use types::{Cfi, CfiPath, CfiRange, CfiStep, StepKind, SPINE_STEP};
