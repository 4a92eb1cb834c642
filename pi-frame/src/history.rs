//! Recently generated descriptions, so the model can be told not to repeat itself.

use crate::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
};

pub const HISTORY_FILE: &str = "prompt_history.json";
pub const CAPACITY: usize = 10;

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    timestamp: String,
    description: String,
}

/// The last [`CAPACITY`] descriptions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    descriptions: VecDeque<String>,
}

impl History {
    pub fn push(&mut self, description: impl Into<String>) {
        if self.descriptions.len() == CAPACITY {
            self.descriptions.pop_front();
        }
        self.descriptions.push_back(description.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.descriptions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.descriptions.iter().cloned().collect()
    }

    /// Read a newline-delimited JSON history. A missing file is an empty history.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let mut history = Self::default();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Entry>(line) {
                Ok(entry) => history.push(entry.description),
                Err(e) => warn!("Skipping {}:{}: {}", path.display(), number + 1, e),
            }
        }
        Ok(history)
    }

    /// Add a line to the history file.
    pub fn append(path: impl AsRef<Path>, timestamp: &str, description: &str) -> Result<()> {
        let mut line = serde_json::to_string(&Entry {
            timestamp: timestamp.to_owned(),
            description: description.to_owned(),
        })?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(line.as_bytes())?;
        Ok(())
    }
}
