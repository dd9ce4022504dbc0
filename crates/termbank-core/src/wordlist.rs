//! Reload-aware word list stage.
//!
//! Holds a set of words (stop words, protected words and the like) read as a
//! named resource. The resource is normally the virtual `database` resource,
//! so every new generation re-runs the stage's query.

use std::io::Read;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::info;

use crate::loader::{LoadError, ResourceLoader, VIRTUAL_RESOURCE, VirtualResourceLoader};
use crate::reader::{QueryReader, ReaderError, RowReader};
use crate::reload::{Generation, GenerationAware, HookError, Stage};
use crate::resolve::ResolutionChain;

/// Argument naming the word list resource.
pub const WORDS_PARAM: &str = "words";

pub struct WordListStage {
    name: String,
    resource: String,
    reader: Arc<dyn RowReader>,
    words: RwLock<Vec<String>>,
}

impl WordListStage {
    pub fn new(
        name: impl Into<String>,
        resource: impl Into<String>,
        reader: Arc<dyn RowReader>,
    ) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            reader,
            words: RwLock::new(Vec::new()),
        }
    }

    /// Build the stage from filter arguments, replacing the `words`
    /// argument with the virtual resource name.
    pub fn from_args(
        name: impl Into<String>,
        args: &mut IndexMap<String, String>,
        chain: &ResolutionChain,
    ) -> Result<Self, ReaderError> {
        let reader = QueryReader::from_args(args, WORDS_PARAM, chain)?;
        Ok(Self::new(name, VIRTUAL_RESOURCE, Arc::new(reader)))
    }

    /// Re-read the word list through `parent`, with the virtual resource
    /// answered by this stage's reader.
    pub fn load(&self, parent: Arc<dyn ResourceLoader>) -> Result<usize, LoadError> {
        let loader = VirtualResourceLoader::new(parent, Arc::clone(&self.reader));
        let mut text = String::new();
        loader
            .open_resource(&self.resource)?
            .read_to_string(&mut text)
            .map_err(|source| LoadError::Io {
                name: self.resource.clone(),
                source,
            })?;

        let words: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        let count = words.len();
        *self.words.write() = words;
        info!(stage = %self.name, words = count, "Loaded word list");
        Ok(count)
    }

    /// Name of the resource the list is read from.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Snapshot of the current words.
    pub fn words(&self) -> Vec<String> {
        self.words.read().clone()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.read().iter().any(|w| w == word)
    }
}

impl Stage for WordListStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn generation_aware(&self) -> Option<&dyn GenerationAware> {
        Some(self)
    }
}

impl GenerationAware for WordListStage {
    fn inform_of_new_generation(&self, generation: &Generation) -> Result<(), HookError> {
        self.load(Arc::clone(generation.loader()))?;
        Ok(())
    }
}
