//! Lambda expressions.
//!
//! A lambda is compiled right where it appears, in a frame nested inside the
//! current one. Variables of enclosing frames it names become captures; the
//! lambda expression carries their current values.

use corvid_core::{CompilationError, Span};
use corvid_syntax::LambdaExpr;
use tracing::debug;

use super::{ExprCompiler, Result};
use crate::decls::{BodyState, CompiledFunction, FunctionBody, Parameter, Synthesized};
use crate::generator;
use crate::ir::{CompiledExpr, ExprKind};
use crate::registry::CallableKind;
use crate::return_checker::all_paths_return;
use crate::scope::{CaptureSource, CapturedVariable, Frame, FrameKind, FrameParameter};
use crate::stmt::StmtCompiler;
use crate::types::GeneralType;

/// Lower `fn(params) -> T { body }`.
pub fn compile_lambda<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    lambda: &LambdaExpr<'ast>,
) -> Result<CompiledExpr> {
    let span = lambda.span;
    let mut params = Vec::with_capacity(lambda.params.len());
    for param in lambda.params {
        let ty = compiler.resolve_type(&param.ty)?;
        let mut parameter =
            Parameter::new(param.name.name, ty, param.span).with_modifiers(param.modifiers);
        parameter.default = param.default.as_ref();
        params.push(parameter);
    }
    let declared = lambda
        .return_type
        .as_ref()
        .map(|ty| compiler.resolve_type(ty))
        .transpose()?;

    let ctx = &mut *compiler.ctx;
    let (owner, bindings) = ctx
        .frame()
        .map(|f| (f.owner, f.bindings.clone()))
        .unwrap_or_default();
    let name = ctx.next_lambda_name();
    let mut function = CompiledFunction::new(
        CallableKind::Function,
        name.clone(),
        ctx.file(),
        span,
        declared.clone().unwrap_or(GeneralType::VOID),
    );
    function.params = params;
    function.owner = owner;
    function.synthesized = Some(Synthesized::Lambda);
    function.state = BodyState::Compiling;
    let frame_params = function
        .params
        .iter()
        .map(|p| FrameParameter {
            name: p.name.clone(),
            ty: p.ty.clone(),
            modifiers: p.modifiers,
        })
        .collect();
    let id = ctx.decls.add_function_unchecked(function);

    let mut frame = Frame::new(FrameKind::Lambda, Some(id), declared);
    frame.params = frame_params;
    frame.bindings = bindings;
    frame.owner = owner;
    let (block, frame) = ctx.in_frame(frame, |ctx| {
        StmtCompiler::new(ctx).compile_block(&lambda.body)
    });

    let return_type = frame.return_type.clone().unwrap_or(GeneralType::VOID);
    if !return_type.is_void() && !all_paths_return(&block) {
        ctx.decls.function_mut(id).state = BodyState::Failed;
        return Err(CompilationError::MissingReturn {
            function: name,
            span,
        });
    }

    let captures = frame
        .captures
        .iter()
        .map(|captured| capture_value(compiler, captured, span))
        .collect::<Vec<_>>();

    let ctx = &mut *compiler.ctx;
    let location = ctx.location(span);
    let param_types = {
        let compiled = ctx.decls.function_mut(id);
        compiled.return_type = return_type.clone();
        compiled.state = BodyState::Compiled;
        compiled.references.push(location);
        compiled.body = Some(FunctionBody {
            block,
            locals: frame.locals,
            labels: frame.labels,
            captures: frame.captures,
        });
        compiled.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>()
    };
    debug!(lambda = %name, captures = captures.len(), "lambda lowered");

    let ty = GeneralType::function(return_type, param_types, !captures.is_empty());
    Ok(CompiledExpr::new(ExprKind::Lambda { function: id, captures }, ty, span))
}

/// Current value of a captured variable, read in the enclosing frame.
fn capture_value(
    compiler: &ExprCompiler<'_, '_>,
    captured: &CapturedVariable,
    span: Span,
) -> CompiledExpr {
    match (captured.source, compiler.ctx.frame()) {
        (CaptureSource::Local(id), Some(frame)) => generator::local_expr(frame, id, span),
        (CaptureSource::Parameter(index), _) => {
            CompiledExpr::new(ExprKind::Parameter(index), captured.ty.clone(), span)
        }
        (CaptureSource::Capture(index), _) => {
            CompiledExpr::new(ExprKind::Capture(index), captured.ty.clone(), span)
        }
        (CaptureSource::Local(id), None) => {
            CompiledExpr::new(ExprKind::Local(id), captured.ty.clone(), span)
        }
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::scope::{LocalVariable, VariableId};

    #[test]
    fn return_type_is_inferred_from_the_first_return() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let expr = b.lambda(&[b.param(b.ty("i32"), "x")], None, &[b.ret(Some(b.name("x")))]);
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        let value = value.unwrap();
        assert_eq!(
            value.ty,
            GeneralType::function(GeneralType::I32, vec![GeneralType::I32], false)
        );
        let ExprKind::Lambda { function, captures } = value.kind else {
            panic!("not a lambda");
        };
        assert!(captures.is_empty());
        let compiled = ctx.decls.function(function);
        assert_eq!(compiled.state, BodyState::Compiled);
        assert_eq!(compiled.return_type, GeneralType::I32);
    }

    #[test]
    fn enclosing_locals_are_captured_by_value() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let mut outer = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        outer
            .declare_variable(LocalVariable {
                name: "total".into(),
                ty: GeneralType::I32,
                span: Span::default(),
                temp: false,
                state_field: None,
            })
            .unwrap();
        let expr = b.lambda(&[], None, &[b.ret(Some(b.name("total")))]);
        let (value, outer) = ctx.in_frame(outer, |ctx| ExprCompiler::new(ctx).infer(&expr));
        let value = value.unwrap();
        assert!(outer.captures.is_empty());
        match value.kind {
            ExprKind::Lambda { captures, .. } => {
                assert_eq!(captures.len(), 1);
                assert!(matches!(captures[0].kind, ExprKind::Local(VariableId(0))));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(value.ty, GeneralType::function(GeneralType::I32, Vec::new(), true));
    }

    #[test]
    fn declared_non_void_lambdas_must_return() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let expr = b.lambda(&[], Some(b.ty("i32")), &[]);
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        assert!(matches!(value, Err(CompilationError::MissingReturn { .. })));
    }
}
