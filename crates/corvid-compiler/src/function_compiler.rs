//! Lowering of function bodies.
//!
//! Bodies are compiled on demand: by the driver for every reachable function
//! and by call sites that want to evaluate or inline their callee. A body is
//! compiled at most once; re-entrant requests while it is being compiled see
//! no body.

use corvid_core::CompilationError;
use tracing::debug;

use crate::context::CompilationContext;
use crate::decls::{BodyState, FunctionBody, Synthesized};
use crate::generator;
use crate::registry::FunctionId;
use crate::return_checker::all_paths_return;
use crate::scope::{Frame, FrameKind, FrameParameter};
use crate::stmt::StmtCompiler;

type Result<T> = std::result::Result<T, CompilationError>;

/// Compile the body of `id` if it has one and is not compiled yet.
///
/// Returns whether a compiled body is available afterwards.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_function_body(ctx: &mut CompilationContext<'_>, id: FunctionId) -> bool {
    let function = ctx.decls.function(id);
    match function.state {
        BodyState::Compiled => return function.body.is_some(),
        BodyState::Compiling | BodyState::Failed => return false,
        BodyState::Pending => {}
    }
    if !function.has_source_body() {
        return false;
    }
    let file = function.file;
    ctx.decls.function_mut(id).state = BodyState::Compiling;

    let result = ctx.with_detached_frames(|ctx| {
        ctx.with_file(file, |ctx| lower_body(ctx, id).map_err(|error| ctx.report(error)))
    });
    match result {
        Ok(body) => {
            let function = ctx.decls.function_mut(id);
            debug!(function = %function.name, statements = body.block.stmts.len(), "body compiled");
            function.body = Some(body);
            function.state = BodyState::Compiled;
            true
        }
        Err(()) => {
            let function = ctx.decls.function_mut(id);
            debug!(function = %function.name, "body failed");
            function.state = BodyState::Failed;
            false
        }
    }
}

fn lower_body(ctx: &mut CompilationContext<'_>, id: FunctionId) -> Result<FunctionBody> {
    let function = ctx.decls.function(id);
    match function.synthesized {
        Some(Synthesized::GeneratorConstructor) => return generator::constructor_body(ctx, id),
        Some(Synthesized::GeneratorNext) => return generator::next_body(ctx, id),
        _ => {}
    }
    if generator::is_generator_function(ctx, function) {
        return generator::compile_generator_function(ctx, id);
    }
    let Some(source) = function.syntax.and_then(|decl| decl.body) else {
        return Err(CompilationError::internal(format!(
            "function '{}' has no body to compile",
            function.name
        )));
    };

    let name = function.name.clone();
    let span = function.span;
    let return_type = function.return_type.clone();
    let mut frame = Frame::new(FrameKind::Function, Some(id), Some(return_type.clone()));
    frame.params = function
        .params
        .iter()
        .map(|p| FrameParameter {
            name: p.name.clone(),
            ty: p.ty.clone(),
            modifiers: p.modifiers,
        })
        .collect();
    frame.bindings = function.bindings();
    frame.owner = function.owner;

    let (block, frame) = ctx.in_frame(frame, |ctx| StmtCompiler::new(ctx).compile_block(&source));
    if !return_type.is_void() && !all_paths_return(&block) {
        return Err(CompilationError::MissingReturn { function: name, span });
    }
    Ok(FunctionBody {
        block,
        locals: frame.locals,
        labels: frame.labels,
        captures: frame.captures,
    })
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId, Severity};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::CompilerInputs;
    use crate::ir::CompiledStatement;
    use crate::passes::registration::RegistrationPass;

    #[test]
    fn bodies_compile_once() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let decl = b.function(b.ty("i32"), "seven", &[], &[b.ret(Some(b.int(7)))]);
        let files = [b.file("a.cv", &[b.fn_item(decl)])];
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        RegistrationPass::new(&mut ctx, &files).run();
        let id = ctx.decls.functions_named("seven")[0];

        assert!(compile_function_body(&mut ctx, id));
        assert!(compile_function_body(&mut ctx, id));
        let function = ctx.decls.function(id);
        assert_eq!(function.state, BodyState::Compiled);
        let body = function.body.as_ref().unwrap();
        assert!(matches!(body.block.stmts.as_slice(), [CompiledStatement::Return { .. }]));
    }

    #[test]
    fn missing_returns_fail_the_function() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let decl = b.function(b.ty("i32"), "nothing", &[], &[]);
        let files = [b.file("a.cv", &[b.fn_item(decl)])];
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        RegistrationPass::new(&mut ctx, &files).run();
        let id = ctx.decls.functions_named("nothing")[0];

        assert!(!compile_function_body(&mut ctx, id));
        assert_eq!(ctx.decls.function(id).state, BodyState::Failed);
        assert_eq!(ctx.diagnostics.count(Severity::Critical), 1);
        assert!(!compile_function_body(&mut ctx, id));
        assert_eq!(ctx.diagnostics.count(Severity::Critical), 1);
    }

    #[test]
    fn prototypes_have_no_body() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let files = [b.file("a.cv", &[b.fn_item(b.prototype(b.ty("void"), "later", &[]))])];
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        RegistrationPass::new(&mut ctx, &files).run();
        let id = ctx.decls.functions_named("later")[0];
        assert!(!compile_function_body(&mut ctx, id));
        assert_eq!(ctx.decls.function(id).state, BodyState::Pending);
    }
}
