//! CFI Generator
//!
//! Builds CFIs from spine and element indices. Indices passed to the builder
//! are 0-based; the builder converts them to CFI numbering (elements even,
//! text nodes odd).

use super::types::*;

/// Builder for constructing CFIs programmatically
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    path: CfiPath,
}

fn element_index(index: usize) -> u32 {
    ((index + 1) * 2) as u32
}

impl CfiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step into the package spine (`/6`)
    pub fn package_step(mut self) -> Self {
        self.path.push(CfiStep::element(SPINE_STEP));
        self
    }

    /// Spine item: index 0 -> /2, index 1 -> /4
    pub fn spine_item(mut self, index: usize) -> Self {
        self.path.push(CfiStep::element(element_index(index)));
        self
    }

    pub fn spine_item_with_id(mut self, index: usize, id: impl Into<String>) -> Self {
        self.path
            .push(CfiStep::element_with_id(element_index(index), id));
        self
    }

    /// Enter the content document (`!`)
    pub fn indirection(mut self) -> Self {
        self.path.push(CfiStep::indirection());
        self
    }

    pub fn element(mut self, index: usize) -> Self {
        self.path.push(CfiStep::element(element_index(index)));
        self
    }

    pub fn element_with_id(mut self, index: usize, id: impl Into<String>) -> Self {
        self.path
            .push(CfiStep::element_with_id(element_index(index), id));
        self
    }

    /// Text node: index 0 -> /1, index 1 -> /3
    pub fn text_node(mut self, index: usize) -> Self {
        self.path.push(CfiStep::element((index * 2 + 1) as u32));
        self
    }

    pub fn character_offset(mut self, offset: u32) -> Self {
        self.path.offset = Some(offset);
        self
    }

    pub fn build(self) -> Cfi {
        Cfi::new(self.path)
    }
}

/// Location of a block-level element within a spine item: spine, body,
/// block, optional id assertion on the block.
pub fn block_cfi(spine_index: usize, block_index: usize, block_id: Option<&str>) -> Cfi {
    let builder = CfiBuilder::new()
        .package_step()
        .spine_item(spine_index)
        .indirection()
        .element(1);

    match block_id {
        Some(id) => builder.element_with_id(block_index, id),
        None => builder.element(block_index),
    }
    .build()
}

/// Character position inside the first text node of a block
pub fn text_cfi(spine_index: usize, block_index: usize, char_offset: u32) -> Cfi {
    CfiBuilder::new()
        .package_step()
        .spine_item(spine_index)
        .indirection()
        .element(1)
        .element(block_index)
        .text_node(0)
        .character_offset(char_offset)
        .build()
}
