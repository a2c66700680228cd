//! Field access and indexing.

use corvid_core::{CompilationError, CompiledValue, Span};
use corvid_syntax::{Expr, FieldExpr, GeneralKind, IndexExpr};

use super::{ExprCompiler, Result, calls, is_source_literal};
use crate::decls::Field;
use crate::ir::{CompiledExpr, ExprKind};
use crate::overload::{FunctionQuery, QueryArgument, find_function};
use crate::registry::CallableKind;
use crate::types::GeneralType;

/// Lower `object.field`.
pub fn compile_field<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    field: &FieldExpr<'ast>,
) -> Result<CompiledExpr> {
    let object = compiler.infer(&field.object)?;
    field_of(compiler, object, field.field.name, field.span)
}

/// Field `name` of a lowered object.
pub(crate) fn field_of(
    compiler: &mut ExprCompiler<'_, '_>,
    object: CompiledExpr,
    name: &str,
    span: Span,
) -> Result<CompiledExpr> {
    if name == "length"
        && let Some((_, length)) = array_shape(&object.ty)
    {
        let Some(length) = length else {
            return Err(CompilationError::Other {
                message: "array has no static length".into(),
                span,
            });
        };
        let kind = compiler.ctx.settings.array_length_type;
        let value =
            CompiledValue::from_integer(kind, length as i128).map_err(|e| CompilationError::Other {
                message: e.to_string(),
                span,
            })?;
        return Ok(CompiledExpr::literal(value, GeneralType::Builtin(kind), span));
    }

    let Some((id, type_args, through_pointer)) = object.ty.struct_or_pointee() else {
        return Err(unknown_field(compiler, &object.ty, name, span));
    };
    let Some(fields) = compiler.ctx.decls.struct_fields(id, type_args) else {
        return Err(CompilationError::Other {
            message: format!("struct '{}' is not complete", compiler.ctx.decls.structure(id).name),
            span,
        });
    };
    let Some((index, Field { ty, private, .. })) =
        fields.into_iter().enumerate().find(|(_, f)| f.name == name)
    else {
        return Err(unknown_field(compiler, &object.ty, name, span));
    };
    if private && compiler.ctx.frame().and_then(|f| f.owner) != Some(id) {
        let message = format!(
            "field '{name}' of '{}' is private",
            compiler.ctx.decls.structure(id).name
        );
        compiler.ctx.error(message, span);
    }
    Ok(CompiledExpr::new(
        ExprKind::Field {
            object: object.boxed(),
            index: index as u32,
            through_pointer,
        },
        ty,
        span,
    ))
}

fn unknown_field(
    compiler: &ExprCompiler<'_, '_>,
    ty: &GeneralType,
    name: &str,
    span: Span,
) -> CompilationError {
    CompilationError::UnknownField {
        field: name.to_string(),
        type_name: ty.display(&compiler.ctx.decls).to_string(),
        span,
    }
}

/// Arrays and pointers to arrays.
fn array_shape(ty: &GeneralType) -> Option<(&GeneralType, Option<u32>)> {
    ty.as_array().or_else(|| ty.pointee().and_then(GeneralType::as_array))
}

/// Lower `object[index]`: builtin for arrays and pointers, `indexer_get`
/// for structs.
pub fn compile_index<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    index: &IndexExpr<'ast>,
) -> Result<CompiledExpr> {
    let object = compiler.infer(&index.object)?;
    index_into(compiler, object, &index.index, index.span)
}

/// Index an already lowered object.
pub(crate) fn index_into<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    object: CompiledExpr,
    index: &Expr<'ast>,
    span: Span,
) -> Result<CompiledExpr> {
    if object.ty.struct_or_pointee().is_some() {
        let position = compiler.infer(index)?;
        return indexer_get(compiler, object, position, is_source_literal(index), span);
    }

    let element = match array_shape(&object.ty) {
        Some((of, _)) => of.clone(),
        None => match object.ty.pointee() {
            Some(pointee) if !pointee.is_any() && !pointee.is_void() => pointee.clone(),
            _ => {
                return Err(CompilationError::TypeMismatch {
                    message: format!("cannot index '{}'", object.ty.display(&compiler.ctx.decls)),
                    span,
                });
            }
        },
    };
    let position = compiler.infer(index)?;
    if !position.ty.is_integer() {
        return Err(CompilationError::TypeMismatch {
            message: format!(
                "index must be an integer, got '{}'",
                position.ty.display(&compiler.ctx.decls)
            ),
            span: position.span,
        });
    }
    Ok(CompiledExpr::new(
        ExprKind::Index {
            object: object.boxed(),
            index: position.boxed(),
        },
        element,
        span,
    ))
}

/// Call the `indexer_get` general function of a struct.
pub(crate) fn indexer_get(
    compiler: &mut ExprCompiler<'_, '_>,
    object: CompiledExpr,
    position: CompiledExpr,
    literal: bool,
    span: Span,
) -> Result<CompiledExpr> {
    let file = compiler.ctx.file();
    let found = {
        let args = [QueryArgument::Expr(&object), QueryArgument::of(&position, literal)];
        let query = FunctionQuery::new(
            CallableKind::GeneralFunction,
            GeneralKind::IndexerGet.name(),
            file,
            &args,
        );
        find_function(compiler.ctx, &query, span)?
    };
    let arguments =
        calls::finish_arguments(compiler, found.function, 0, vec![object, position], span)?;
    calls::emit_call(compiler, found.function, arguments, span, false)
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId, Severity};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::decls::CompiledStruct;
    use crate::registry::StructId;
    use crate::scope::{Frame, FrameKind, LocalVariable};

    fn point(ctx: &mut CompilationContext<'_>) -> StructId {
        let mut secret = Field::new("secret", GeneralType::I32, Span::default());
        secret.private = true;
        ctx.decls.add_struct(CompiledStruct {
            name: "Point".into(),
            file: FileId(0),
            span: Span::default(),
            template_params: Vec::new(),
            attributes: Vec::new(),
            fields: Some(vec![
                Field::new("x", GeneralType::I32, Span::default()),
                Field::new("y", GeneralType::F32, Span::default()),
                secret,
            ]),
            syntax: None,
            generator: false,
            synthesized: false,
        })
    }

    fn frame_with(name: &str, ty: GeneralType) -> Frame {
        let mut frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        frame
            .declare_variable(LocalVariable {
                name: name.into(),
                ty,
                span: Span::default(),
                temp: false,
                state_field: None,
            })
            .unwrap();
        frame
    }

    #[test]
    fn fields_through_pointers() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let id = point(&mut ctx);
        let pointer = GeneralType::pointer_to(GeneralType::structure(id, Vec::new()));
        let (value, _) = ctx.in_frame(frame_with("p", pointer), |ctx| {
            ExprCompiler::new(ctx).infer(&b.field(b.name("p"), "y"))
        });
        let value = value.unwrap();
        assert_eq!(value.ty, GeneralType::F32);
        assert!(matches!(value.kind, ExprKind::Field { index: 1, through_pointer: true, .. }));
        assert!(value.is_lvalue());
    }

    #[test]
    fn private_fields_report_an_error_outside_the_owner() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let id = point(&mut ctx);
        let value_type = GeneralType::structure(id, Vec::new());
        let expr = b.field(b.name("p"), "secret");

        let (value, _) = ctx.in_frame(frame_with("p", value_type.clone()), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        assert!(value.is_ok());
        assert_eq!(ctx.diagnostics.count(Severity::Error), 1);

        let mut owned = frame_with("p", value_type);
        owned.owner = Some(id);
        let _ = ctx.in_frame(owned, |ctx| ExprCompiler::new(ctx).infer(&expr));
        assert_eq!(ctx.diagnostics.count(Severity::Error), 1);
    }

    #[test]
    fn array_length_and_indexing() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let array = GeneralType::array_of(GeneralType::U8, Some(16));
        let (values, _) = ctx.in_frame(frame_with("buf", array), |ctx| {
            let mut c = ExprCompiler::new(ctx);
            (
                c.infer(&b.field(b.name("buf"), "length")).unwrap(),
                c.infer(&b.index(b.name("buf"), b.int(3))).unwrap(),
                c.infer(&b.field(b.name("buf"), "missing")),
            )
        });
        assert_eq!(values.0.as_literal(), Some(CompiledValue::I32(16)));
        assert_eq!(values.1.ty, GeneralType::U8);
        assert!(matches!(values.2, Err(CompilationError::UnknownField { .. })));
    }
}
