use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::monitor::{LogLevel, LogSink, OperationMonitor};
use crate::operation::{Operation, OperationKind, REASON_OK};
use crate::paths::{is_occupied, resolve};

pub const REASON_SOURCE_MISSING: &str = "source missing or not a regular file";
pub const REASON_PREVIEW: &str = "PREVIEW";

#[cfg(unix)]
const CROSS_DEVICE: Option<i32> = Some(18); // EXDEV
#[cfg(windows)]
const CROSS_DEVICE: Option<i32> = Some(17); // ERROR_NOT_SAME_DEVICE
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE: Option<i32> = None;

/// What happened to a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Moved { destination: PathBuf },
    /// Preview run: the move that would have happened
    Previewed { destination: PathBuf },
    Skipped { reason: String },
    Failed { reason: String },
}

impl OpOutcome {
    pub fn reason(&self) -> &str {
        match self {
            OpOutcome::Moved { .. } => REASON_OK,
            OpOutcome::Previewed { .. } => REASON_PREVIEW,
            OpOutcome::Skipped { reason } | OpOutcome::Failed { reason } => reason,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            OpOutcome::Moved { destination } | OpOutcome::Previewed { destination } => {
                Some(destination)
            }
            _ => None,
        }
    }
}

/// Tallies over one executed plan. Previewed moves count as `moved`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub total: usize,
    pub moved: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl ExecutionResult {
    pub fn tally(&mut self, outcome: &OpOutcome) {
        self.total += 1;
        match outcome {
            OpOutcome::Moved { .. } | OpOutcome::Previewed { .. } => self.moved += 1,
            OpOutcome::Skipped { .. } => self.skipped += 1,
            OpOutcome::Failed { .. } => self.errored += 1,
        }
    }
}

/// Mutable state a stage may touch while handling one operation.
pub struct StageContext<'a> {
    pub preview: bool,
    /// Directories already created by this executor (absolute, resolved)
    pub created_dirs: &'a mut HashSet<PathBuf>,
    /// Destinations handed out earlier in the same preview run
    pub claimed: &'a mut HashSet<PathBuf>,
    pub sink: &'a mut dyn LogSink,
}

impl StageContext<'_> {
    fn is_taken(&self, path: &Path) -> bool {
        is_occupied(path) || (self.preview && self.claimed.contains(path))
    }
}

pub enum Step {
    Continue,
    Finish(OpOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Read-only validation, runs in preview too
    Check,
    /// Touches the filesystem
    Apply,
}

pub type StageFn = fn(&mut Operation, &mut StageContext<'_>) -> io::Result<Step>;

#[derive(Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub phase: Phase,
    pub run: StageFn,
}

/// Callbacks around a pipeline run; used to layer logging over the stages.
pub trait PipelineHooks {
    /// All checks passed and the first filesystem stage is about to run.
    fn apply_started(&self, _op: &Operation, _sink: &mut dyn LogSink) {}

    fn finished(&self, _op: &Operation, _outcome: &OpOutcome, _sink: &mut dyn LogSink) {}
}

/// Ordered stages an operation goes through until one of them finishes it.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// kind → source → preview → collision → directory → move
    pub fn standard() -> Self {
        Self::new(vec![
            Stage { name: "kind", phase: Phase::Check, run: check_kind },
            Stage { name: "source", phase: Phase::Check, run: check_source },
            Stage { name: "preview", phase: Phase::Check, run: preview_gate },
            Stage { name: "collision", phase: Phase::Apply, run: resolve_collision },
            Stage { name: "directory", phase: Phase::Apply, run: ensure_parent_dir },
            Stage { name: "move", phase: Phase::Apply, run: move_file },
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name).collect()
    }

    /// Run stages in order. An I/O error from any stage becomes a failed
    /// outcome with the error text as reason.
    pub fn run(
        &self,
        op: &mut Operation,
        ctx: &mut StageContext<'_>,
        hooks: &dyn PipelineHooks,
    ) -> OpOutcome {
        let mut applying = false;
        let mut outcome = None;

        for stage in &self.stages {
            if stage.phase == Phase::Apply && !applying {
                applying = true;
                hooks.apply_started(op, ctx.sink);
            }
            match (stage.run)(op, ctx) {
                Ok(Step::Continue) => {}
                Ok(Step::Finish(done)) => {
                    outcome = Some(done);
                    break;
                }
                Err(e) => {
                    outcome = Some(OpOutcome::Failed {
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        let outcome = outcome.unwrap_or_else(|| OpOutcome::Failed {
            reason: format!("no stage completed the operation ({})", op.kind),
        });
        match &outcome {
            OpOutcome::Skipped { reason } | OpOutcome::Failed { reason } => {
                if op.kind == OperationKind::Move {
                    op.reason = reason.clone();
                }
            }
            _ => {}
        }
        hooks.finished(op, &outcome, ctx.sink);
        outcome
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_kind(op: &mut Operation, _ctx: &mut StageContext<'_>) -> io::Result<Step> {
    Ok(match op.kind {
        OperationKind::Skip => Step::Finish(OpOutcome::Skipped {
            reason: op.reason.clone(),
        }),
        OperationKind::Move => Step::Continue,
    })
}

fn check_source(op: &mut Operation, _ctx: &mut StageContext<'_>) -> io::Result<Step> {
    let is_file = fs::metadata(&op.source).map(|m| m.is_file()).unwrap_or(false);
    if is_file {
        Ok(Step::Continue)
    } else {
        Ok(Step::Finish(OpOutcome::Skipped {
            reason: REASON_SOURCE_MISSING.to_string(),
        }))
    }
}

fn preview_gate(op: &mut Operation, ctx: &mut StageContext<'_>) -> io::Result<Step> {
    if !ctx.preview {
        return Ok(Step::Continue);
    }
    let destination = if ctx.is_taken(&op.destination) {
        collision_safe_name(&op.destination, |p| ctx.is_taken(p))
    } else {
        op.destination.clone()
    };
    ctx.claimed.insert(destination.clone());
    Ok(Step::Finish(OpOutcome::Previewed { destination }))
}

fn resolve_collision(op: &mut Operation, ctx: &mut StageContext<'_>) -> io::Result<Step> {
    if ctx.is_taken(&op.destination) {
        let alternate = collision_safe_name(&op.destination, |p| ctx.is_taken(p));
        let name = alternate
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        op.resolved_destination = Some(alternate);
        ctx.sink.record(
            &format!("COLLISION at destination; renamed to {}", name),
            LogLevel::Warn,
            Some(&*op),
        );
    }
    Ok(Step::Continue)
}

fn ensure_parent_dir(op: &mut Operation, ctx: &mut StageContext<'_>) -> io::Result<Step> {
    let Some(parent) = op.effective_destination().parent() else {
        return Ok(Step::Continue);
    };
    if parent.as_os_str().is_empty() {
        return Ok(Step::Continue);
    }
    let key = resolve(parent);
    if ctx.created_dirs.contains(&key) {
        return Ok(Step::Continue);
    }
    fs::create_dir_all(parent).map_err(|e| {
        io::Error::new(e.kind(), format!("cannot create {}: {}", parent.display(), e))
    })?;
    ctx.created_dirs.insert(key);
    Ok(Step::Continue)
}

fn move_file(op: &mut Operation, _ctx: &mut StageContext<'_>) -> io::Result<Step> {
    let destination = op.effective_destination().to_path_buf();
    match fs::rename(&op.source, &destination) {
        Ok(()) => {}
        Err(e) if CROSS_DEVICE.is_some() && e.raw_os_error() == CROSS_DEVICE => {
            log::debug!(
                "rename across devices, copying {} -> {}",
                op.source.display(),
                destination.display()
            );
            fs::copy(&op.source, &destination)?;
            fs::remove_file(&op.source)?;
        }
        Err(e) => return Err(e),
    }
    Ok(Step::Finish(OpOutcome::Moved { destination }))
}

/// First free `base (N).ext` next to `target`, counting from 1.
pub fn collision_safe_name(target: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    let stem = target.file_stem().unwrap_or_else(|| OsStr::new("file"));
    let ext = target.extension();
    let mut counter = 1u32;
    loop {
        let mut name = stem.to_os_string();
        name.push(format!(" ({})", counter));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = target.with_file_name(name);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Writes the execution log around each pipeline run.
pub struct ExecutionLogger;

impl PipelineHooks for ExecutionLogger {
    fn apply_started(&self, op: &Operation, sink: &mut dyn LogSink) {
        sink.record(
            &format!("MOVE: {} -> {}", op.source.display(), op.destination.display()),
            LogLevel::Info,
            Some(op),
        );
    }

    fn finished(&self, op: &Operation, outcome: &OpOutcome, sink: &mut dyn LogSink) {
        let (message, level) = match outcome {
            OpOutcome::Moved { destination } => (
                format!(
                    "DONE: {} -> {}",
                    op.source.display(),
                    destination.display()
                ),
                LogLevel::Info,
            ),
            OpOutcome::Previewed { destination } => (
                format!(
                    "PREVIEW MOVE: {} -> {}",
                    op.source.display(),
                    destination.display()
                ),
                LogLevel::Info,
            ),
            OpOutcome::Skipped { reason } => (format!("SKIP: {}", reason), LogLevel::Info),
            OpOutcome::Failed { reason } => (format!("ERROR: {}", reason), LogLevel::Error),
        };
        sink.record(&message, level, Some(op));
    }
}

/// Applies (or previews) a plan. Never fails as a whole: every operation
/// ends up moved, skipped or errored.
pub struct OperationExecutor<S = OperationMonitor> {
    sink: S,
    pipeline: Pipeline,
    created_dirs: HashSet<PathBuf>,
}

impl OperationExecutor<OperationMonitor> {
    pub fn new() -> Self {
        Self::with_sink(OperationMonitor::new())
    }
}

impl Default for OperationExecutor<OperationMonitor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LogSink> OperationExecutor<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            pipeline: Pipeline::standard(),
            created_dirs: HashSet::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run every operation in order and tally the outcomes.
    pub fn execute(&mut self, operations: &mut [Operation], preview: bool) -> ExecutionResult {
        self.execute_with(operations, preview, |_, _| {})
    }

    /// Like [`execute`](Self::execute), calling `on_step(done, total)` after
    /// each operation.
    pub fn execute_with(
        &mut self,
        operations: &mut [Operation],
        preview: bool,
        mut on_step: impl FnMut(usize, usize),
    ) -> ExecutionResult {
        let mut claimed = HashSet::new();
        let mut result = ExecutionResult::default();
        let total = operations.len();
        for (i, op) in operations.iter_mut().enumerate() {
            let outcome = self.run(op, preview, &mut claimed);
            result.tally(&outcome);
            on_step(i + 1, total);
        }
        log::debug!(
            "executed {} operation(s) (preview={}): {} moved, {} skipped, {} errored",
            result.total,
            preview,
            result.moved,
            result.skipped,
            result.errored
        );
        result
    }

    /// Run a single operation on its own.
    pub fn execute_one(&mut self, op: &mut Operation, preview: bool) -> OpOutcome {
        self.run(op, preview, &mut HashSet::new())
    }

    fn run(&mut self, op: &mut Operation, preview: bool, claimed: &mut HashSet<PathBuf>) -> OpOutcome {
        let mut ctx = StageContext {
            preview,
            created_dirs: &mut self.created_dirs,
            claimed,
            sink: &mut self.sink,
        };
        self.pipeline.run(op, &mut ctx, &ExecutionLogger)
    }
}
