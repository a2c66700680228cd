//! The compilation session.
//!
//! [`CompilationContext`] owns every piece of mutable state of one
//! compilation: declarations, host tables, diagnostics, the frame stack, the
//! template cache and the Compilable queues. It is passed by `&mut` through
//! every lowering call.

use corvid_core::{
    CompilationError, CompilerSettings, Diagnostics, FileId, Location, Severity, Span,
};
use rustc_hash::FxHashMap;

use crate::attributes::{ExternalConstant, ExternalFunction, UserAttribute};
use crate::registry::Declarations;
use crate::scope::Frame;
use crate::template::{CompilableQueues, TemplateInstanceCache};

/// Host-provided inputs besides the parsed files.
#[derive(Debug, Clone, Default)]
pub struct CompilerInputs {
    pub settings: CompilerSettings,
    pub external_functions: Vec<ExternalFunction>,
    pub external_constants: Vec<ExternalConstant>,
    pub user_attributes: Vec<UserAttribute>,
}

impl CompilerInputs {
    pub fn new(settings: CompilerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_external_function(mut self, function: ExternalFunction) -> Self {
        self.external_functions.push(function);
        self
    }

    pub fn with_external_constant(mut self, constant: ExternalConstant) -> Self {
        self.external_constants.push(constant);
        self
    }

    pub fn with_user_attribute(mut self, attribute: UserAttribute) -> Self {
        self.user_attributes.push(attribute);
        self
    }
}

pub struct CompilationContext<'ast> {
    pub decls: Declarations<'ast>,
    pub settings: CompilerSettings,
    pub diagnostics: Diagnostics,
    pub templates: TemplateInstanceCache,
    pub queues: CompilableQueues,
    external_functions: FxHashMap<String, ExternalFunction>,
    external_constants: FxHashMap<String, ExternalConstant>,
    user_attributes: FxHashMap<String, UserAttribute>,
    frames: Vec<Frame>,
    file: FileId,
    lambda_count: u32,
}

impl<'ast> CompilationContext<'ast> {
    pub fn new(inputs: &CompilerInputs) -> Self {
        Self {
            decls: Declarations::new(),
            settings: inputs.settings.clone(),
            diagnostics: Diagnostics::new(),
            templates: TemplateInstanceCache::new(),
            queues: CompilableQueues::default(),
            external_functions: inputs
                .external_functions
                .iter()
                .map(|f| (f.name.clone(), f.clone()))
                .collect(),
            external_constants: inputs
                .external_constants
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            user_attributes: inputs
                .user_attributes
                .iter()
                .map(|a| (a.name.clone(), a.clone()))
                .collect(),
            frames: Vec::new(),
            file: FileId(0),
            lambda_count: 0,
        }
    }

    // ==========================================================================
    // Host tables
    // ==========================================================================

    /// Consume the session, keeping what outlives it.
    pub fn finish(self) -> (Declarations<'ast>, Diagnostics) {
        (self.decls, self.diagnostics)
    }

    pub fn external_function(&self, name: &str) -> Option<&ExternalFunction> {
        self.external_functions.get(name)
    }

    pub fn external_constant(&self, name: &str) -> Option<&ExternalConstant> {
        self.external_constants.get(name)
    }

    pub fn user_attribute(&self, name: &str) -> Option<&UserAttribute> {
        self.user_attributes.get(name)
    }

    // ==========================================================================
    // Files and diagnostics
    // ==========================================================================

    /// File currently being compiled.
    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn set_file(&mut self, file: FileId) {
        self.file = file;
    }

    /// Run `f` with `file` as the current file, restoring it afterwards.
    pub fn with_file<R>(&mut self, file: FileId, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.file, file);
        let result = f(self);
        self.file = previous;
        result
    }

    pub fn location(&self, span: Span) -> Location {
        Location::new(self.file, span)
    }

    /// Record a critical error.
    pub fn report(&mut self, error: CompilationError) {
        self.diagnostics.report(error, self.file);
    }

    /// Record a recoverable error.
    pub fn error_from(&mut self, error: CompilationError) {
        let mut diagnostic = error.into_diagnostic(self.file);
        if diagnostic.severity == Severity::Critical {
            diagnostic.severity = Severity::Error;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        let location = self.location(span);
        self.diagnostics.error(message, Some(location));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        let location = self.location(span);
        self.diagnostics.warning(message, Some(location));
    }

    pub fn hint(&mut self, message: impl Into<String>, span: Span) {
        let location = self.location(span);
        self.diagnostics.hint(message, Some(location));
    }

    pub fn optimization_notice(&mut self, message: impl Into<String>, span: Span) {
        let location = self.location(span);
        self.diagnostics.optimization(message, Some(location));
    }

    pub fn failed_optimization(&mut self, message: impl Into<String>, span: Span) {
        let location = self.location(span);
        self.diagnostics.failed_optimization(message, Some(location));
    }

    // ==========================================================================
    // Frames and scopes
    // ==========================================================================

    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn frame_at_mut(&mut self, index: usize) -> &mut Frame {
        &mut self.frames[index]
    }

    /// Run `f` inside `frame` and return the frame once `f` is done.
    ///
    /// The frame is popped on every exit path of `f`.
    pub fn in_frame<R>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> R) -> (R, Frame) {
        self.frames.push(frame);
        let depth = self.frames.len();
        let result = f(self);
        debug_assert_eq!(self.frames.len(), depth, "frame stack changed inside in_frame");
        self.frames.truncate(depth);
        let frame = self.frames.pop().unwrap_or_else(Frame::top_level);
        (result, frame)
    }

    /// Run `f` inside a fresh lexical scope of the innermost frame.
    pub fn in_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.frames.is_empty() {
            return f(self);
        }
        let depth = match self.frames.last_mut() {
            Some(frame) => {
                frame.push_scope();
                frame.depth()
            }
            None => 0,
        };
        let result = f(self);
        if let Some(frame) = self.frames.last_mut() {
            debug_assert_eq!(frame.depth(), depth, "scope stack changed inside in_scope");
            while frame.depth() >= depth && frame.depth() > 1 {
                frame.pop_scope();
            }
        }
        result
    }

    /// Run `f` with the innermost frame's scopes hidden.
    ///
    /// Used while lowering default argument values: locals of the caller are
    /// not visible, parameters and globals are.
    pub fn with_detached_scopes<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let Some(scopes) = self.frames.last_mut().map(Frame::take_scopes) else {
            return f(self);
        };
        let result = f(self);
        if let Some(frame) = self.frames.last_mut() {
            frame.restore_scopes(scopes);
        }
        result
    }

    /// Run `f` on an empty frame stack.
    ///
    /// Bodies compiled on demand from inside another body must not see the
    /// caller's locals or constants.
    pub fn with_detached_frames<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let frames = std::mem::take(&mut self.frames);
        let result = f(self);
        self.frames = frames;
        result
    }

    /// Run `f` and discard every change it made to the session.
    ///
    /// References, template instances, queued work, frames, lambdas and
    /// diagnostics are all restored once `f` returns.
    pub fn speculate<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let decls = self.decls.clone();
        let templates = self.templates.clone();
        let queues = self.queues.clone();
        let frames = self.frames.clone();
        let diagnostics = self.diagnostics.len();
        let lambda_count = self.lambda_count;
        let result = f(self);
        self.decls = decls;
        self.templates = templates;
        self.queues = queues;
        self.frames = frames;
        self.diagnostics.truncate(diagnostics);
        self.lambda_count = lambda_count;
        result
    }

    /// Unique name for a synthesized lambda function.
    pub(crate) fn next_lambda_name(&mut self) -> String {
        self.lambda_count += 1;
        format!("lambda#{}", self.lambda_count)
    }
}

#[cfg(test)]
mod tests {
    use corvid_core::Span;

    use super::*;
    use crate::scope::{FrameKind, LocalVariable};
    use crate::types::GeneralType;

    fn var(name: &str) -> LocalVariable {
        LocalVariable {
            name: name.into(),
            ty: GeneralType::I32,
            span: Span::default(),
            temp: false,
            state_field: None,
        }
    }

    #[test]
    fn scope_is_popped_on_error_path() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let (result, frame) = ctx.in_frame(Frame::new(FrameKind::Function, None, None), |ctx| {
            let failed: Result<(), &str> = ctx.in_scope(|ctx| {
                ctx.frame_mut().unwrap().declare_variable(var("x")).unwrap();
                ctx.frame().map(|_| ()).ok_or("no frame")?;
                Err("boom")
            });
            (failed, ctx.frame().unwrap().find_variable("x"))
        });
        assert!(result.0.is_err());
        assert_eq!(result.1, None);
        assert_eq!(frame.depth(), 1);
        assert!(ctx.frame().is_none());
    }

    #[test]
    fn detached_scopes_hide_locals() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        ctx.in_frame(Frame::top_level(), |ctx| {
            ctx.frame_mut().unwrap().declare_variable(var("local")).unwrap();
            let visible =
                ctx.with_detached_scopes(|ctx| ctx.frame().unwrap().find_variable("local"));
            assert_eq!(visible, None);
            assert!(ctx.frame().unwrap().find_variable("local").is_some());
        });
    }

    #[test]
    fn recoverable_errors_are_not_failures() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        ctx.error_from(CompilationError::other("bad attribute", Span::default()));
        assert!(!ctx.diagnostics.has_failures());
        assert_eq!(ctx.diagnostics.count(Severity::Error), 1);
    }
}
