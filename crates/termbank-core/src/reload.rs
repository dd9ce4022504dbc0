//! Generation reload broadcasting.
//!
//! When the host opens a new generation it hands the current [`Schema`] to
//! the [`GenerationBroadcaster`], which walks every field type and its
//! analysis chains and tells each reload-aware object about the generation.
//! An object reachable along several paths is told once per walk.
//!
//! Broadcasts are serialized: a call from another thread waits until the
//! running walk finishes, while a call from a hook on the broadcasting
//! thread itself is rejected with [`ReloadError::Reentrant`].

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::loader::ResourceLoader;
use crate::resource::identity;

/// Error type returned by reload hooks.
pub type HookError = Box<dyn Error + Send + Sync>;

/// One lifecycle epoch of the consumer graph.
#[derive(Clone)]
pub struct Generation {
    number: u64,
    loader: Arc<dyn ResourceLoader>,
}

impl Generation {
    pub fn new(number: u64, loader: Arc<dyn ResourceLoader>) -> Self {
        Self { number, loader }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Loader for the generation's resources.
    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

/// An object that must be told when a new generation begins.
pub trait GenerationAware: Send + Sync {
    fn inform_of_new_generation(&self, generation: &Generation) -> Result<(), HookError>;
}

/// A processing stage of an analysis chain.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// The stage's reload hook, if it has one.
    fn generation_aware(&self) -> Option<&dyn GenerationAware> {
        None
    }
}

/// A tokenizer followed by an ordered list of stages.
pub struct AnalysisChain {
    tokenizer: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl AnalysisChain {
    pub fn new(tokenizer: impl Into<String>) -> Self {
        Self {
            tokenizer: tokenizer.into(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn tokenizer(&self) -> &str {
        &self.tokenizer
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }
}

/// The analyzer of a field type.
#[derive(Clone)]
pub enum Analyzer {
    /// A configurable chain; its stages are walked.
    Chain(Arc<AnalysisChain>),
    /// Any other analyzer, known only by name; skipped.
    Opaque(Arc<str>),
}

impl Analyzer {
    pub fn chain(chain: AnalysisChain) -> Self {
        Analyzer::Chain(Arc::new(chain))
    }

    pub fn opaque(name: &str) -> Self {
        Analyzer::Opaque(Arc::from(name))
    }

    fn as_chain(&self) -> Option<&Arc<AnalysisChain>> {
        match self {
            Analyzer::Chain(chain) => Some(chain),
            Analyzer::Opaque(_) => None,
        }
    }
}

/// Analysis configuration of one field type.
#[derive(Clone)]
pub struct FieldType {
    index: Analyzer,
    query: Analyzer,
    listener: Option<Arc<dyn GenerationAware>>,
}

impl FieldType {
    /// Field type using `analyzer` at both index and query time.
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            query: analyzer.clone(),
            index: analyzer,
            listener: None,
        }
    }

    /// Use a different analyzer at query time.
    pub fn with_query(mut self, analyzer: Analyzer) -> Self {
        self.query = analyzer;
        self
    }

    /// Reload hook carried by the field type itself.
    pub fn with_listener(mut self, listener: Arc<dyn GenerationAware>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn index_analyzer(&self) -> &Analyzer {
        &self.index
    }

    pub fn query_analyzer(&self) -> &Analyzer {
        &self.query
    }
}

/// Named field types, walked in declaration order.
#[derive(Clone, Default)]
pub struct Schema {
    name: String,
    field_types: IndexMap<String, FieldType>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_types: IndexMap::new(),
        }
    }

    pub fn with_field_type(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_types.insert(name.into(), field_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_types(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.field_types.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("failed to inform {stage} of field type '{field}' about generation {generation}")]
    Stage {
        field: String,
        stage: String,
        generation: u64,
        #[source]
        source: HookError,
    },

    #[error(
        "generation {requested} requested while generation {active} is being broadcast on the same thread"
    )]
    Reentrant { active: u64, requested: u64 },
}

/// Outcome of a completed broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub generation: u64,
    /// Distinct objects informed.
    pub notified: usize,
}

#[derive(Debug, Clone, Copy)]
enum BroadcastState {
    Idle,
    Broadcasting { generation: u64, thread: ThreadId },
}

/// Tells reload-aware objects about new generations, one broadcast at a time.
pub struct GenerationBroadcaster {
    state: Mutex<BroadcastState>,
    idle: Condvar,
}

impl Default for GenerationBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationBroadcaster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BroadcastState::Idle),
            idle: Condvar::new(),
        }
    }

    /// Whether a broadcast is running.
    pub fn is_broadcasting(&self) -> bool {
        matches!(*self.state.lock(), BroadcastState::Broadcasting { .. })
    }

    /// Inform every reload-aware object reachable from `schema`.
    ///
    /// The walk stops at the first failing hook; objects informed before it
    /// stay informed.
    pub fn broadcast(
        &self,
        schema: &Schema,
        generation: &Generation,
    ) -> Result<BroadcastReport, ReloadError> {
        let _gate = self.enter(generation.number())?;
        info!(
            schema = schema.name(),
            generation = generation.number(),
            "Informing generation-aware objects"
        );

        let mut walk = Walk {
            generation,
            visited: HashSet::new(),
        };
        for (field, field_type) in schema.field_types() {
            if let Some(listener) = &field_type.listener {
                walk.inform(field, "field type", &**listener)?;
            }

            let index = field_type.index.as_chain();
            if let Some(chain) = index {
                walk.chain(field, chain)?;
            }
            if let Some(chain) = field_type.query.as_chain() {
                if !index.is_some_and(|index| Arc::ptr_eq(index, chain)) {
                    walk.chain(field, chain)?;
                }
            }
        }

        let report = BroadcastReport {
            generation: generation.number(),
            notified: walk.visited.len(),
        };
        info!(
            generation = report.generation,
            notified = report.notified,
            "All generation-aware objects have been informed"
        );
        Ok(report)
    }

    fn enter(&self, requested: u64) -> Result<Gate<'_>, ReloadError> {
        let current = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match *state {
                BroadcastState::Idle => break,
                BroadcastState::Broadcasting { generation, thread } if thread == current => {
                    error!(active = generation, requested, "Re-entrant broadcast rejected");
                    return Err(ReloadError::Reentrant {
                        active: generation,
                        requested,
                    });
                }
                BroadcastState::Broadcasting { generation, .. } => {
                    debug!(active = generation, requested, "Waiting for running broadcast");
                    self.idle.wait(&mut state);
                }
            }
        }
        *state = BroadcastState::Broadcasting {
            generation: requested,
            thread: current,
        };
        Ok(Gate { broadcaster: self })
    }
}

/// Returns the broadcaster to idle when the walk ends, however it ends.
struct Gate<'a> {
    broadcaster: &'a GenerationBroadcaster,
}

impl Drop for Gate<'_> {
    fn drop(&mut self) {
        *self.broadcaster.state.lock() = BroadcastState::Idle;
        self.broadcaster.idle.notify_all();
    }
}

struct Walk<'a> {
    generation: &'a Generation,
    visited: HashSet<usize>,
}

impl Walk<'_> {
    fn chain(&mut self, field: &str, chain: &AnalysisChain) -> Result<(), ReloadError> {
        for stage in chain.stages() {
            if let Some(hook) = stage.generation_aware() {
                self.inform(field, stage.name(), hook)?;
            }
        }
        Ok(())
    }

    fn inform(
        &mut self,
        field: &str,
        stage: &str,
        hook: &dyn GenerationAware,
    ) -> Result<(), ReloadError> {
        if !self.visited.insert(identity(hook)) {
            debug!(field, stage, "Already informed during this walk");
            return Ok(());
        }
        info!(
            field,
            stage,
            generation = self.generation.number(),
            "Informing about new generation"
        );
        hook.inform_of_new_generation(self.generation)
            .map_err(|source| {
                error!(field, stage, error = %source, "Failed to inform about new generation");
                ReloadError::Stage {
                    field: field.to_string(),
                    stage: stage.to_string(),
                    generation: self.generation.number(),
                    source,
                }
            })
    }
}
