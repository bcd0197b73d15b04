//! Positional input enumeration.

use std::fmt;

use crate::command::FfmpegInput;
use crate::error::{MediaError, MediaResult};

/// What a positional input is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputRole {
    IntroImage,
    /// Product image by its position in the ordered image list
    MainImage(usize),
    OutroImage,
    CodeImage,
    Voice,
    Background,
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRole::IntroImage => f.write_str("intro_image"),
            InputRole::MainImage(i) => write!(f, "main_image_{}", i),
            InputRole::OutroImage => f.write_str("outro_image"),
            InputRole::CodeImage => f.write_str("code_image"),
            InputRole::Voice => f.write_str("voice"),
            InputRole::Background => f.write_str("background"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputEntry {
    pub role: InputRole,
    pub input: FfmpegInput,
}

/// Inputs in the exact order they are passed to FFmpeg.
///
/// An input's index is fixed when it is pushed and is the only way filter
/// nodes refer to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputList {
    entries: Vec<InputEntry>,
}

impl InputList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input and return its positional index.
    pub fn push(&mut self, role: InputRole, input: FfmpegInput) -> MediaResult<usize> {
        if self.index_of(role).is_some() {
            return Err(MediaError::graph_invariant(format!(
                "input role {} registered twice",
                role
            )));
        }
        self.entries.push(InputEntry { role, input });
        Ok(self.entries.len() - 1)
    }

    pub fn index_of(&self, role: InputRole) -> Option<usize> {
        self.entries.iter().position(|e| e.role == role)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[InputEntry] {
        &self.entries
    }

    pub fn into_inputs(self) -> Vec<FfmpegInput> {
        self.entries.into_iter().map(|e| e.input).collect()
    }
}
