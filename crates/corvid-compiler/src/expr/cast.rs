//! Explicit casts and `sizeof`.

use corvid_core::{CompilationError, CompiledValue};
use corvid_syntax::{CastExpr, SizeOfExpr};

use super::{ExprCompiler, Result};
use crate::ir::{CompiledExpr, ExprKind};
use crate::types::{GeneralType, can_cast_explicitly, size_of};

/// Lower `expr as T`.
pub fn compile_cast<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    cast: &CastExpr<'ast>,
) -> Result<CompiledExpr> {
    let target = compiler.resolve_type(&cast.target)?;
    let value = compiler.infer(&cast.expr)?;
    let span = cast.span;

    if let (Some(literal), Some(builtin)) = (value.as_literal(), target.as_builtin())
        && builtin.is_numeric()
        && let Ok(converted) = literal.cast(builtin)
    {
        return Ok(CompiledExpr::literal(converted, target, span));
    }

    match can_cast_explicitly(&value.ty, &target, &compiler.ctx.settings, &compiler.ctx.decls) {
        Ok(()) if value.ty.same_as(&target) && value.ty == target => Ok(value),
        Ok(()) => Ok(CompiledExpr::new(ExprKind::Cast(value.boxed()), target, span)),
        Err(_) => Err(CompilationError::InvalidCast {
            from: value.ty.display(&compiler.ctx.decls).to_string(),
            to: target.display(&compiler.ctx.decls).to_string(),
            span,
        }),
    }
}

/// Lower `sizeof(T)`; folds when statement evaluation is enabled.
pub fn compile_sizeof<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    sizeof: &SizeOfExpr<'ast>,
) -> Result<CompiledExpr> {
    let of = compiler.resolve_type(&sizeof.ty)?;
    let size = size_of(&of, &compiler.ctx.decls, &compiler.ctx.settings).map_err(|e| {
        CompilationError::Other {
            message: e.to_string(),
            span: sizeof.span,
        }
    })?;
    let kind = compiler.ctx.settings.size_of_type;
    if !CompiledValue::fits(size as i128, kind) {
        return Err(CompilationError::Other {
            message: format!("size {size} does not fit the size type"),
            span: sizeof.span,
        });
    }
    let node =
        CompiledExpr::new(ExprKind::SizeOf { of, size }, GeneralType::Builtin(kind), sizeof.span);
    Ok(compiler.fold(node))
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId, Span};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::decls::{CompiledStruct, Field};
    use crate::scope::Frame;

    #[test]
    fn literal_casts_convert_the_value() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.cast(b.float(2.75), b.ty("i32")))
        });
        assert_eq!(value.unwrap().as_literal(), Some(CompiledValue::I32(2)));
    }

    #[test]
    fn pointers_do_not_cast_to_floats() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.cast(b.name("SP"), b.pointer(b.ty("u8"))))
        });
        assert!(matches!(value.unwrap().kind, ExprKind::Cast(_)));

        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            let pointer = b.cast(b.name("SP"), b.pointer(b.ty("u8")));
            ExprCompiler::new(ctx).infer(&b.cast(pointer, b.ty("f32")))
        });
        assert!(value.is_err());
    }

    #[test]
    fn struct_size_is_sum_of_fields() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        ctx.decls.add_struct(CompiledStruct {
            name: "Packed".into(),
            file: FileId(0),
            span: Span::default(),
            template_params: Vec::new(),
            attributes: Vec::new(),
            fields: Some(vec![
                Field::new("a", GeneralType::U8, Span::default()),
                Field::new("b", GeneralType::CHAR, Span::default()),
                Field::new("c", GeneralType::I32, Span::default()),
            ]),
            syntax: None,
            generator: false,
            synthesized: false,
        });
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.size_of(b.ty("Packed")))
        });
        assert_eq!(value.unwrap().as_literal(), Some(CompiledValue::I32(7)));
    }
}
