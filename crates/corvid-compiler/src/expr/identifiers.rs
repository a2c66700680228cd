//! Identifier resolution.
//!
//! ## Algorithm
//!
//! Lookups are tried in a fixed order and the first hit wins:
//!
//! 1. compiler pseudo-variables (`__line__`, `__column__`, `__pointer_size__`)
//! 2. registers (`IP`, `SP`, `BP`)
//! 3. constants of the frame chain, then global constants
//! 4. parameters
//! 5. locals
//! 6. globals
//! 7. variables of enclosing frames, captured by the current lambda
//! 8. functions
//! 9. instruction labels
//! 10. type names, which are not values
//!
//! When everything fails the reason of every lookup ends up in the
//! diagnostic.

use corvid_core::{CompilationError, CompiledValue, Span};
use corvid_syntax::IdentExpr;

use super::{ExprCompiler, Result};
use crate::context::CompilationContext;
use crate::decls::Synthesized;
use crate::generator;
use crate::ir::{CompiledExpr, ExprKind, LabelRef, Register};
use crate::overload::RankOutcome;
use crate::registry::{CallableKind, FunctionId};
use crate::scope::{CaptureSource, CapturedVariable};
use crate::template::instantiate;
use crate::types::{GeneralType, TypeResolver};

/// Lower a bare identifier.
pub fn compile_ident(
    compiler: &mut ExprCompiler<'_, '_>,
    ident: &IdentExpr<'_>,
) -> Result<CompiledExpr> {
    let name = ident.ident.name;
    let span = ident.span;
    let mut reasons = Vec::new();

    if ident.type_args.is_empty() {
        if let Some(value) = pseudo_variable(compiler, name, span) {
            return Ok(value);
        }
        reasons.push("not a compiler variable".to_string());

        if let Some(register) = Register::from_name(name) {
            let ty = GeneralType::Builtin(compiler.ctx.settings.pointer_integer());
            return Ok(CompiledExpr::new(ExprKind::Register(register), ty, span));
        }
        reasons.push("not a register".to_string());

        match constant(compiler.ctx, name, span)? {
            Some(value) => return Ok(value),
            None => reasons.push("no constant with this name".to_string()),
        }

        if let Some(value) = lookup_variable(compiler, name, span)? {
            return Ok(value);
        }
        reasons.push(
            "no parameter, local, global or capturable variable with this name".to_string(),
        );
    }

    let type_args = ident
        .type_args
        .iter()
        .map(|ty| compiler.resolve_type(ty))
        .collect::<Result<Vec<_>>>()?;
    match function_address(compiler.ctx, name, &type_args) {
        Ok(Some(function)) => {
            compiler.reference(function, span);
            let ty = compiler.ctx.decls.function(function).function_type();
            return Ok(CompiledExpr::new(ExprKind::FunctionAddress(function), ty, span));
        }
        Ok(None) => reasons.push("no function with this name".to_string()),
        Err(reason) => reasons.push(reason),
    }

    if ident.type_args.is_empty() {
        if let Some(label) = label(compiler.ctx, name) {
            return Ok(CompiledExpr::new(
                ExprKind::LabelAddress(label),
                GeneralType::any_pointer(),
                span,
            ));
        }
        reasons.push("no instruction label with this name".to_string());
    }

    let resolver =
        TypeResolver::new(&compiler.ctx.decls, &compiler.ctx.settings, compiler.ctx.file());
    if resolver.resolve_name(name, type_args, span).is_ok() {
        reasons.push("names a type, which is not a value".to_string());
    }

    Err(CompilationError::UnknownSymbol {
        name: name.to_string(),
        reasons,
        span,
    })
}

fn pseudo_variable(
    compiler: &ExprCompiler<'_, '_>,
    name: &str,
    span: Span,
) -> Option<CompiledExpr> {
    let settings = &compiler.ctx.settings;
    let (value, kind) = match name {
        "__line__" => (span.line as i128, settings.size_of_type),
        "__column__" => (span.col as i128, settings.size_of_type),
        "__pointer_size__" => (settings.pointer_size as i128, settings.size_of_type),
        _ => return None,
    };
    let value = CompiledValue::from_integer(kind, value).ok()?;
    Some(CompiledExpr::literal(value, GeneralType::Builtin(kind), span))
}

fn constant(ctx: &CompilationContext<'_>, name: &str, span: Span) -> Result<Option<CompiledExpr>> {
    if let Some(local) = ctx.frames().iter().rev().find_map(|frame| frame.find_constant(name)) {
        return Ok(Some(CompiledExpr::literal(local.value, local.ty.clone(), span)));
    }
    match ctx.decls.find_constant(name, ctx.file()) {
        RankOutcome::Found(found) => {
            let constant = &ctx.decls.constants()[found.item];
            Ok(Some(CompiledExpr::literal(constant.value, constant.ty.clone(), span)))
        }
        RankOutcome::Ambiguous(_) => Err(CompilationError::Other {
            message: format!("constant '{name}' is declared in several files"),
            span,
        }),
        RankOutcome::NotFound(_) => Ok(None),
    }
}

/// Parameters, locals, globals and captures: everything with storage.
pub fn lookup_variable(
    compiler: &mut ExprCompiler<'_, '_>,
    name: &str,
    span: Span,
) -> Result<Option<CompiledExpr>> {
    let ctx = &mut *compiler.ctx;
    if let Some(frame) = ctx.frame() {
        if let Some(generator) = &frame.generator
            && let Some((_, ty, field)) = generator.params.iter().find(|(n, _, _)| n == name)
        {
            return Ok(Some(generator::state_field(generator, *field, ty.clone(), span)));
        }
        if frame.generator.is_none()
            && let Some((index, param)) = frame.find_parameter(name)
        {
            return Ok(Some(CompiledExpr::new(ExprKind::Parameter(index), param.ty.clone(), span)));
        }
        if let Some(id) = frame.find_variable(name) {
            return Ok(Some(generator::local_expr(frame, id, span)));
        }
    }

    match ctx.decls.find_global(name, ctx.file()) {
        RankOutcome::Found(found) => {
            let ty = ctx.decls.global(found.item).ty.clone();
            return Ok(Some(CompiledExpr::new(ExprKind::Global(found.item), ty, span)));
        }
        RankOutcome::Ambiguous(_) => {
            return Err(CompilationError::Other {
                message: format!("global '{name}' is declared in several files"),
                span,
            });
        }
        RankOutcome::NotFound(_) => {}
    }

    let innermost = ctx.frames().len().saturating_sub(1);
    Ok(capture(ctx, innermost, name)
        .map(|(index, ty)| CompiledExpr::new(ExprKind::Capture(index), ty, span)))
}

/// Capture `name` into the lambda frame at `index`, capturing through every
/// lambda in between.
fn capture(
    ctx: &mut CompilationContext<'_>,
    index: usize,
    name: &str,
) -> Option<(u32, GeneralType)> {
    let frames = ctx.frames();
    let frame = frames.get(index)?;
    if !frame.is_lambda() || index == 0 {
        return None;
    }
    if let Some(existing) = frame.find_capture(name) {
        return Some((existing, frame.captures[existing as usize].ty.clone()));
    }

    let outer = &frames[index - 1];
    let parameter = outer
        .find_parameter(name)
        .filter(|_| outer.generator.is_none());
    let found = if let Some((i, param)) = parameter {
        Some((CaptureSource::Parameter(i), param.ty.clone()))
    } else {
        outer
            .find_variable(name)
            .map(|id| (CaptureSource::Local(id), outer.variable(id).ty.clone()))
    };
    let (source, ty) = match found {
        Some(found) => found,
        None => {
            let (i, ty) = capture(ctx, index - 1, name)?;
            (CaptureSource::Capture(i), ty)
        }
    };
    let captured = ctx.frame_at_mut(index).capture(CapturedVariable {
        name: name.to_string(),
        ty: ty.clone(),
        source,
    });
    Some((captured, ty))
}

/// Address of a free function, `Err` with a reason when the name is
/// ambiguous or the template arguments do not fit.
fn function_address(
    ctx: &mut CompilationContext<'_>,
    name: &str,
    type_args: &[GeneralType],
) -> std::result::Result<Option<FunctionId>, String> {
    let candidates: Vec<FunctionId> = ctx
        .decls
        .functions_named(name)
        .iter()
        .copied()
        .filter(|id| {
            let f = ctx.decls.function(*id);
            f.kind == CallableKind::Function
                && f.owner.is_none()
                && f.instance_of.is_none()
                && !matches!(
                    f.synthesized,
                    Some(Synthesized::GeneratorBody { .. } | Synthesized::Lambda)
                )
                && f.is_template() != type_args.is_empty()
        })
        .collect();
    match candidates.as_slice() {
        [] => Ok(None),
        [single] if type_args.is_empty() => Ok(Some(*single)),
        [template] => {
            let expected = ctx.decls.function(*template).template_params.len();
            if expected != type_args.len() {
                let got = type_args.len();
                return Err(format!("'{name}' takes {expected} type argument(s), got {got}"));
            }
            Ok(Some(instantiate(ctx, *template, type_args)))
        }
        _ => Err(format!("'{name}' names {} overloads; call it instead", candidates.len())),
    }
}

fn label(ctx: &CompilationContext<'_>, name: &str) -> Option<LabelRef> {
    if let Some(local) = ctx.frame().and_then(|f| f.find_label(name)) {
        return Some(LabelRef::Local(local));
    }
    ctx.decls.find_label(name, ctx.file()).map(LabelRef::Global)
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::CompilerInputs;
    use crate::scope::{Frame, FrameKind, LocalVariable};

    fn local(name: &str, ty: GeneralType) -> LocalVariable {
        LocalVariable {
            name: name.into(),
            ty,
            span: Span::default(),
            temp: false,
            state_field: None,
        }
    }

    #[test]
    fn unknown_names_list_every_reason() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let (result, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.name("nothing"))
        });
        match result {
            Err(CompilationError::UnknownSymbol { reasons, .. }) => assert!(reasons.len() >= 6),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn registers_and_pseudo_variables() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let (values, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            let mut c = ExprCompiler::new(ctx);
            (c.infer(&b.name("SP")).unwrap(), c.infer(&b.name("__pointer_size__")).unwrap())
        });
        assert!(matches!(values.0.kind, ExprKind::Register(Register::Sp)));
        assert_eq!(values.1.as_literal(), Some(CompiledValue::I32(4)));
    }

    #[test]
    fn lambdas_capture_through_enclosing_frames() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let mut outer = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        outer.declare_variable(local("count", GeneralType::I32)).unwrap();

        let (_, outer) = ctx.in_frame(outer, |ctx| {
            let middle = Frame::new(FrameKind::Lambda, None, None);
            let (_, middle) = ctx.in_frame(middle, |ctx| {
                let inner = Frame::new(FrameKind::Lambda, None, None);
                let (value, inner) = ctx.in_frame(inner, |ctx| {
                    ExprCompiler::new(ctx).infer(&b.name("count"))
                });
                assert!(matches!(value.unwrap().kind, ExprKind::Capture(0)));
                assert_eq!(inner.captures[0].source, CaptureSource::Capture(0));
            });
            assert_eq!(middle.captures.len(), 1);
            assert!(matches!(middle.captures[0].source, CaptureSource::Local(_)));
        });
        assert!(outer.captures.is_empty());
    }
}
