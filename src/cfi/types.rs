//! CFI (Canonical Fragment Identifier) types
//!
//! Positions handed out by the rendering layer are EPUB CFIs:
//! `epubcfi(/6/4[chap01ref]!/4/2/22/3:268)`. A selection is the range form
//! `epubcfi(/6/4!/4/2,/1:0,/1:10)`, a common parent path followed by
//! relative start and end paths.
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use std::fmt;

/// Element index of the spine in the package document
pub const SPINE_STEP: u32 = 6;

/// A parsed EPUB CFI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfi {
    /// Path to the location, or the common parent of a range
    pub path: CfiPath,
    /// Relative start and end paths when this CFI is a range
    pub range: Option<CfiRange>,
}

/// A sequence of steps with an optional terminal character offset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfiPath {
    pub steps: Vec<CfiStep>,
    pub offset: Option<u32>,
}

/// Relative start and end of a range CFI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfiRange {
    pub start: CfiPath,
    pub end: CfiPath,
}

/// A single step in a CFI path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfiStep {
    pub kind: StepKind,
    /// ID assertion (`/4[chapter1]`)
    pub id: Option<String>,
}

/// Step kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Child index; even numbers are elements, odd numbers text nodes
    Element(u32),
    /// `!` - steps into the referenced content document
    Indirection,
}

impl Cfi {
    pub fn new(path: CfiPath) -> Self {
        Self { path, range: None }
    }

    pub fn with_range(path: CfiPath, range: CfiRange) -> Self {
        Self {
            path,
            range: Some(range),
        }
    }

    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// 0-based spine index, read from the `/6/N` prefix
    pub fn spine_index(&self) -> Option<usize> {
        match self.path.steps.as_slice() {
            [first, second, ..] => match (first.kind, second.kind) {
                (StepKind::Element(SPINE_STEP), StepKind::Element(n)) if n >= 2 => {
                    Some((n / 2 - 1) as usize)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Absolute path of the location, or of the start of a range
    pub fn start_point(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.join(&range.start),
            None => self.path.clone(),
        }
    }

    /// Absolute path of the end of a range; the location itself otherwise
    pub fn end_point(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.join(&range.end),
            None => self.path.clone(),
        }
    }
}

impl CfiPath {
    pub fn with_steps(steps: Vec<CfiStep>) -> Self {
        Self {
            steps,
            offset: None,
        }
    }

    pub fn push(&mut self, step: CfiStep) {
        self.steps.push(step);
    }

    /// Append a relative path. The offset of `relative` wins.
    pub fn join(&self, relative: &CfiPath) -> CfiPath {
        let mut steps = self.steps.clone();
        steps.extend(relative.steps.iter().cloned());
        CfiPath {
            steps,
            offset: relative.offset.or(if relative.steps.is_empty() {
                self.offset
            } else {
                None
            }),
        }
    }
}

impl CfiStep {
    pub fn element(index: u32) -> Self {
        Self {
            kind: StepKind::Element(index),
            id: None,
        }
    }

    pub fn element_with_id(index: u32, id: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Element(index),
            id: Some(id.into()),
        }
    }

    pub fn indirection() -> Self {
        Self {
            kind: StepKind::Indirection,
            id: None,
        }
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", self.path)?;
        if let Some(range) = &self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for CfiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StepKind::Element(n) => write!(f, "/{}", n)?,
            StepKind::Indirection => write!(f, "!")?,
        }
        if let Some(id) = &self.id {
            write!(f, "[{}]", escape_assertion(id))?;
        }
        Ok(())
    }
}

fn escape_assertion(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '^' | '[' | ']' | '(' | ')' | ',' | ';' | '=') {
            escaped.push('^');
        }
        escaped.push(ch);
    }
    escaped
}
