//! Compilation pass - lower top-level statements and every reachable body.
//!
//! 1. Outermost labels of each file are registered, so top-level `goto`s may
//!    jump forward
//! 2. Top-level statements are lowered in the top-level frame, constants of
//!    a file before its other statements
//! 3. Bodies are compiled in passes until a pass compiles nothing new. A pass
//!    visits every referenced or exported function in declaration order,
//!    then drains the instantiation queues by index, since compiling a body
//!    may queue further instances
//! 4. Functions that were never reached get a hint
//!
//! Errors abort only the statement or body they occur in.

use corvid_core::{CompilationError, FileId, Span};
use corvid_syntax::{ParsedFile, Stmt, VarModifiers};
use tracing::{debug, trace};

use crate::context::CompilationContext;
use crate::decls::BodyState;
use crate::function_compiler::compile_function_body;
use crate::ir::{CompiledBlock, CompiledStatement};
use crate::registry::{CallableKind, FunctionId, GlobalLabel};
use crate::scope::{Frame, FrameKind, LabelInfo, LocalVariable};
use crate::stmt::StmtCompiler;
use crate::types::GeneralType;

/// Lowered top-level code and pass statistics.
#[derive(Debug, Default, Clone)]
pub struct CompilationOutput {
    /// Top-level statements of every file, in file order.
    pub top_level: CompiledBlock,
    /// Locals of nested top-level blocks.
    pub top_level_locals: Vec<LocalVariable>,
    /// Labels declared in nested top-level blocks.
    pub top_level_labels: Vec<LabelInfo>,
    /// Number of body passes run.
    pub passes: usize,
    /// Bodies compiled successfully.
    pub bodies_compiled: usize,
}

pub struct CompilationPass<'a, 'ast> {
    ctx: &'a mut CompilationContext<'ast>,
    files: &'a [ParsedFile<'ast>],
    output: CompilationOutput,
    /// Next unvisited index of each instantiation queue.
    cursors: [usize; 4],
}

impl<'a, 'ast> CompilationPass<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>, files: &'a [ParsedFile<'ast>]) -> Self {
        Self {
            ctx,
            files,
            output: CompilationOutput::default(),
            cursors: [0; 4],
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> CompilationOutput {
        debug!(files = self.files.len(), "compilation started");
        self.register_labels();
        self.compile_top_level();
        self.compile_bodies();
        self.report_unused();
        debug!(
            passes = self.output.passes,
            bodies = self.output.bodies_compiled,
            statements = self.output.top_level.stmts.len(),
            "compilation finished"
        );
        self.output
    }

    // ==========================================================================
    // Top level
    // ==========================================================================

    fn register_labels(&mut self) {
        for file in self.files {
            for stmt in file.statements() {
                let Stmt::Label(label) = stmt else {
                    continue;
                };
                let name = label.name.name;
                if self.ctx.decls.find_label(name, file.file).is_some() {
                    self.ctx.with_file(file.file, |ctx| {
                        ctx.report(CompilationError::DuplicateDefinition {
                            name: name.to_string(),
                            span: label.span,
                        })
                    });
                    continue;
                }
                self.ctx.decls.add_label(GlobalLabel {
                    name: name.to_string(),
                    file: file.file,
                    span: label.span,
                });
            }
        }
    }

    fn compile_top_level(&mut self) {
        let exit_code = GeneralType::Builtin(self.ctx.settings.exit_code_type);
        let frame = Frame::new(FrameKind::TopLevel, None, Some(exit_code));
        let files = self.files;
        let (stmts, frame) = self.ctx.in_frame(frame, |ctx| {
            let mut stmts = Vec::new();
            for file in files {
                ctx.with_file(file.file, |ctx| {
                    let (constants, others): (Vec<&Stmt<'_>>, Vec<&Stmt<'_>>) =
                        file.statements().partition(|stmt| is_constant(stmt));
                    for stmt in constants.into_iter().chain(others) {
                        match StmtCompiler::new(ctx).compile(stmt) {
                            Ok(lowered) => stmts.extend(lowered),
                            Err(error) => ctx.report(error),
                        }
                    }
                });
            }
            stmts
        });
        trace!(statements = stmts.len(), "top level lowered");
        let span = stmts.first().map(CompiledStatement::span).unwrap_or_default();
        self.output.top_level = CompiledBlock::new(stmts, span);
        self.output.top_level_locals = frame.locals;
        self.output.top_level_labels = frame.labels;
    }

    // ==========================================================================
    // Bodies
    // ==========================================================================

    fn compile_bodies(&mut self) {
        loop {
            self.output.passes += 1;
            let mut attempted = 0;

            let mut index = 0;
            while index < self.ctx.decls.function_count() {
                let id = FunctionId(index as u32);
                let function = self.ctx.decls.function(id);
                if function.is_reachable() {
                    attempted += self.compile(id);
                }
                index += 1;
            }

            for kind in CallableKind::ALL {
                let cursor = kind.queue_index();
                while let Some(id) = self.ctx.queues.get(kind, self.cursors[cursor]) {
                    self.cursors[cursor] += 1;
                    attempted += self.compile(id);
                }
            }

            trace!(pass = self.output.passes, attempted, "body pass finished");
            if attempted == 0 {
                break;
            }
        }
    }

    /// Compile a pending body; returns 1 if an attempt was made.
    fn compile(&mut self, id: FunctionId) -> usize {
        let function = self.ctx.decls.function(id);
        if function.state != BodyState::Pending || !function.has_source_body() {
            return 0;
        }
        if compile_function_body(self.ctx, id) {
            self.output.bodies_compiled += 1;
        }
        1
    }

    fn report_unused(&mut self) {
        let unused: Vec<(String, FileId, Span)> = self
            .ctx
            .decls
            .functions()
            .filter(|(_, f)| {
                f.state == BodyState::Pending
                    && f.has_source_body()
                    && f.synthesized.is_none()
                    && !f.is_reachable()
            })
            .map(|(_, f)| (f.name.clone(), f.file, f.span))
            .collect();
        for (name, file, span) in unused {
            self.ctx
                .with_file(file, |ctx| ctx.hint(format!("function '{name}' is never used"), span));
        }
    }
}

fn is_constant(stmt: &Stmt<'_>) -> bool {
    matches!(stmt, Stmt::VarDecl(decl) if decl.modifiers.contains(VarModifiers::CONST))
}
