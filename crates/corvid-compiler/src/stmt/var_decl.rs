//! Variable and constant declarations.
//!
//! - `const T name = value;` computes the value now and binds a constant;
//!   nothing is emitted
//! - `var name = value;` takes the type of the value
//! - declarations in the outermost top-level scope become globals
//! - locals of a generator body live in fields of its state struct
//! - `temp` locals hold a pointer that is deleted when the scope ends

use corvid_core::{CompilationError, Span};
use corvid_syntax::{VarDeclStmt, VarModifiers};

use super::{Result, StmtCompiler};
use crate::attributes::{apply_variable_attributes, compile_attributes};
use crate::eval;
use crate::generator;
use crate::ir::{AssignTarget, CompiledExpr, CompiledStatement};
use crate::overload::RankOutcome;
use crate::registry::{GlobalConstant, GlobalVariable};
use crate::scope::{LocalConstant, LocalVariable};
use crate::types::GeneralType;

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    pub fn compile_var_decl(&mut self, decl: &VarDeclStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let attributes = compile_attributes(decl.attributes);
        let external = apply_variable_attributes(self.ctx, &attributes);
        let name = decl.name.name;
        let span = decl.span;

        let mut compiler = self.expr_compiler();
        let declared = if decl.ty.is_inferred() {
            None
        } else {
            Some(compiler.resolve_type(&decl.ty)?)
        };
        let value = match (&decl.init, external) {
            (Some(init), _) => Some(compiler.compile(init, declared.as_ref())?),
            (None, Some(value)) => {
                let ty = declared.clone().unwrap_or(GeneralType::Builtin(value.kind()));
                Some(CompiledExpr::literal(value, ty, span))
            }
            (None, None) => None,
        };
        let (ty, value) = match (declared, value) {
            (Some(ty), Some(value)) => {
                let value = compiler.coerce(value, &ty)?;
                (ty, Some(value))
            }
            (Some(ty), None) => (ty, None),
            (None, Some(value)) => (value.ty.clone(), Some(value)),
            (None, None) => {
                return Err(CompilationError::other(
                    format!("'{name}' needs an initializer to infer its type"),
                    span,
                ));
            }
        };
        if ty.is_void() {
            return Err(CompilationError::TypeMismatch {
                message: format!("'{name}' cannot have type void"),
                span,
            });
        }

        if decl.modifiers.contains(VarModifiers::CONST) {
            return self.declare_constant(name, ty, value, span).map(|()| Vec::new());
        }
        if decl.modifiers.contains(VarModifiers::TEMP) && !ty.is_pointer() {
            return Err(CompilationError::TypeMismatch {
                message: format!("temp variable '{name}' must hold a pointer"),
                span,
            });
        }

        if self.ctx.frame().is_some_and(|f| f.is_global_scope()) {
            return self.declare_global(name, ty, value, decl.modifiers, span);
        }
        self.declare_local(name, ty, value, decl.modifiers.contains(VarModifiers::TEMP), span)
    }

    fn declare_constant(
        &mut self,
        name: &str,
        ty: GeneralType,
        value: Option<CompiledExpr>,
        span: Span,
    ) -> Result<()> {
        let value = value
            .and_then(|v| eval::try_compute(&v, &self.ctx.settings))
            .ok_or_else(|| CompilationError::NotConstant {
                name: name.to_string(),
                span,
            })?;

        let Some(frame) = self.ctx.frame_mut() else {
            return Err(CompilationError::internal("constant declared outside of a frame"));
        };
        if frame.is_global_scope() {
            let file = self.ctx.file();
            if let RankOutcome::Found(found) = self.ctx.decls.find_constant(name, file)
                && self.ctx.decls.constants()[found.item].file == file
            {
                return Err(CompilationError::DuplicateDefinition {
                    name: name.to_string(),
                    span,
                });
            }
            self.ctx.decls.add_constant(GlobalConstant {
                name: name.to_string(),
                ty,
                value,
                file,
                span,
            });
            return Ok(());
        }
        frame
            .declare_constant(LocalConstant {
                name: name.to_string(),
                ty,
                value,
            })
            .map_err(|_| CompilationError::DuplicateDefinition {
                name: name.to_string(),
                span,
            })
    }

    fn declare_global(
        &mut self,
        name: &str,
        ty: GeneralType,
        value: Option<CompiledExpr>,
        modifiers: VarModifiers,
        span: Span,
    ) -> Result<Vec<CompiledStatement>> {
        let file = self.ctx.file();
        if self.ctx.decls.globals().iter().any(|g| g.name == name && g.file == file) {
            return Err(CompilationError::DuplicateDefinition {
                name: name.to_string(),
                span,
            });
        }
        if modifiers.contains(VarModifiers::TEMP) {
            self.ctx.warning(format!("'temp' has no effect on global '{name}'"), span);
        }
        let id = self.ctx.decls.add_global(GlobalVariable {
            name: name.to_string(),
            ty,
            file,
            span,
        });
        Ok(value
            .map(|value| CompiledStatement::Assignment {
                target: AssignTarget::Global(id),
                value,
                span,
            })
            .into_iter()
            .collect())
    }

    fn declare_local(
        &mut self,
        name: &str,
        ty: GeneralType,
        value: Option<CompiledExpr>,
        temp: bool,
        span: Span,
    ) -> Result<Vec<CompiledStatement>> {
        let Some(frame) = self.ctx.frame_mut() else {
            return Err(CompilationError::internal("local declared outside of a frame"));
        };
        let id = frame
            .declare_variable(LocalVariable {
                name: name.to_string(),
                ty: ty.clone(),
                span,
                temp,
                state_field: None,
            })
            .map_err(|_| CompilationError::DuplicateDefinition {
                name: name.to_string(),
                span,
            })?;

        // Generator locals live in the state struct once the name is taken.
        let state_field = generator::add_state_local(self.ctx, name, &ty, span);
        let Some(frame) = self.ctx.frame_mut() else {
            return Err(CompilationError::internal("local declared outside of a frame"));
        };
        frame.variable_mut(id).state_field = state_field;

        if state_field.is_some() {
            let stored = generator::local_expr(frame, id, span);
            let Some(target) = AssignTarget::from_expr(&stored) else {
                return Err(CompilationError::internal("generator local is not assignable"));
            };
            return Ok(value
                .map(|value| CompiledStatement::Assignment { target, value, span })
                .into_iter()
                .collect());
        }
        Ok(vec![CompiledStatement::VariableDeclaration {
            variable: id,
            value,
            span,
        }])
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompiledValue, CompilerSettings, FileId};
    use corvid_syntax::{AstBuilder, BinaryOp};

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::decls::{CompiledStruct, Field};
    use crate::ir::ExprKind;
    use crate::scope::{Frame, FrameKind, GeneratorContext};

    #[test]
    fn var_takes_the_type_of_its_value() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.var(b.inferred(), "ratio", Some(b.float(0.5)));
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, frame) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(matches!(
            result.unwrap().as_slice(),
            [CompiledStatement::VariableDeclaration { value: Some(_), .. }]
        ));
        assert_eq!(frame.locals[0].ty, GeneralType::F32);
    }

    #[test]
    fn constants_are_bound_not_emitted() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmts = [
            b.constant(b.ty("i32"), "SIZE", b.binary(b.int(4), BinaryOp::Mul, b.int(8))),
            b.var(b.ty("i32"), "n", Some(b.name("SIZE"))),
        ];
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (lowered, _) = ctx.in_frame(frame, |ctx| {
            let mut compiler = StmtCompiler::new(ctx);
            (compiler.compile(&stmts[0]).unwrap(), compiler.compile(&stmts[1]).unwrap())
        });
        assert!(lowered.0.is_empty());
        match &lowered.1[0] {
            CompiledStatement::VariableDeclaration { value: Some(value), .. } => {
                assert_eq!(value.as_literal(), Some(CompiledValue::I32(32)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn constants_are_computed_without_optimizations() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx =
            CompilationContext::new(&CompilerInputs::new(CompilerSettings::unoptimized()));
        let stmts = [
            b.constant(b.ty("i32"), "SIZE", b.binary(b.int(1), BinaryOp::Add, b.int(2))),
            b.var(b.ty("i32"), "n", Some(b.name("SIZE"))),
        ];
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (lowered, _) = ctx.in_frame(frame, |ctx| {
            let mut compiler = StmtCompiler::new(ctx);
            (compiler.compile(&stmts[0]).unwrap(), compiler.compile(&stmts[1]).unwrap())
        });
        assert!(lowered.0.is_empty());
        match &lowered.1[0] {
            CompiledStatement::VariableDeclaration { value: Some(value), .. } => {
                assert_eq!(value.as_literal(), Some(CompiledValue::I32(3)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn constants_need_known_values() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.constant(b.ty("i32"), "sp", b.cast(b.name("SP"), b.ty("i32")));
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, _) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(matches!(result, Err(CompilationError::NotConstant { .. })));
    }

    #[test]
    fn outermost_top_level_declarations_are_globals() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.var(b.ty("u8"), "counter", Some(b.int(3)));
        let (result, frame) = ctx.in_frame(Frame::top_level(), |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(frame.locals.is_empty());
        assert_eq!(ctx.decls.globals().len(), 1);
        match result.unwrap().as_slice() {
            [CompiledStatement::Assignment { target, value, .. }] => {
                assert!(matches!(target, AssignTarget::Global(_)));
                assert!(matches!(value.kind, ExprKind::Literal(CompiledValue::U8(3))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_generator_locals_add_no_state() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let state = ctx.decls.add_struct(CompiledStruct {
            name: "g$state".into(),
            file: FileId(0),
            span: Span::default(),
            template_params: Vec::new(),
            attributes: Vec::new(),
            fields: Some(vec![Field::new("resume", GeneralType::any_pointer(), Span::default())]),
            syntax: None,
            generator: false,
            synthesized: true,
        });
        let mut frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        frame.generator = Some(GeneratorContext {
            state,
            element: GeneralType::I32,
            params: Vec::new(),
        });
        let stmt = b.var(b.ty("i32"), "n", Some(b.int(1)));
        let (results, frame) = ctx.in_frame(frame, |ctx| {
            let mut compiler = StmtCompiler::new(ctx);
            (compiler.compile(&stmt), compiler.compile(&stmt))
        });
        assert!(matches!(
            results.0.unwrap().as_slice(),
            [CompiledStatement::Assignment { .. }]
        ));
        assert!(matches!(results.1, Err(CompilationError::DuplicateDefinition { .. })));
        assert_eq!(frame.locals[0].state_field, Some(1));
        assert_eq!(ctx.decls.structure(state).fields.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn temp_requires_a_pointer() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.var_with(VarModifiers::TEMP, b.ty("i32"), "n", Some(b.int(1)));
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, _) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(matches!(result, Err(CompilationError::TypeMismatch { .. })));
    }
}
