//! Expression lowering using bidirectional type checking.
//!
//! The [`ExprCompiler`] lowers AST expressions to [`CompiledExpr`] trees:
//! - `infer()` - synthesizes the type from the expression (bottom-up)
//! - `check()` - lowers against an expected type and applies implicit casts
//!   (top-down)
//!
//! The expected type also flows into literals, which adopt it when they can
//! represent their value, and into string literals, which pick stack or heap
//! storage from it.
//!
//! # Example
//!
//! ```ignore
//! let mut compiler = ExprCompiler::new(ctx);
//!
//! // Infer type of expression
//! let value = compiler.infer(&expr)?;
//!
//! // Check expression against expected type
//! let value = compiler.check(&expr, &GeneralType::I32)?;
//! ```

mod assignment;
mod binary;
mod calls;
mod cast;
mod identifiers;
mod lambda;
mod literals;
mod member;
mod unary;

pub use assignment::{Setter, assign, compile_assignment, compile_setter};
pub use binary::combine;
pub use calls::{allocator, deallocator, destructor, emit_call};
pub use identifiers::lookup_variable;
pub use literals::is_source_literal;

use corvid_core::{CompilationError, OptimizationFlags, Span};
use corvid_syntax::{Expr, TypeExpr};

use crate::context::CompilationContext;
use crate::eval;
use crate::ir::{CompiledExpr, ExprKind, StringAllocation};
use crate::overload::literal_fits;
use crate::registry::FunctionId;
use crate::types::{GeneralType, TypeResolver, can_cast_implicitly, static_length};

type Result<T> = std::result::Result<T, CompilationError>;

/// Lowers expressions of the innermost frame.
pub struct ExprCompiler<'a, 'ast> {
    /// Compilation session with declarations, diagnostics and the frame stack
    pub(crate) ctx: &'a mut CompilationContext<'ast>,
    /// The expression being lowered is a call whose value is discarded; the
    /// inliner then uses the statement form.
    statement_call: bool,
}

impl<'a, 'ast> ExprCompiler<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>) -> Self {
        Self {
            ctx,
            statement_call: false,
        }
    }

    /// Lower a call in statement position.
    pub fn for_statement(ctx: &'a mut CompilationContext<'ast>) -> Self {
        Self {
            ctx,
            statement_call: true,
        }
    }

    /// Synthesize the type from the expression.
    pub fn infer(&mut self, expr: &Expr<'ast>) -> Result<CompiledExpr> {
        self.compile(expr, None)
    }

    /// Lower `expr` so that its value has type `expected`.
    pub fn check(&mut self, expr: &Expr<'ast>, expected: &GeneralType) -> Result<CompiledExpr> {
        let value = self.compile(expr, Some(expected))?;
        self.coerce(value, expected)
    }

    /// Lower with an optional expected type; no cast is applied.
    pub fn compile(
        &mut self,
        expr: &Expr<'ast>,
        expected: Option<&GeneralType>,
    ) -> Result<CompiledExpr> {
        let statement_call = std::mem::take(&mut self.statement_call);
        match expr {
            Expr::Literal(lit) => literals::compile_literal(self, &lit.kind, expected, lit.span),
            Expr::Ident(ident) => identifiers::compile_ident(self, ident),
            Expr::Binary(bin) => binary::compile_binary(self, bin),
            Expr::Unary(un) => unary::compile_unary(self, un, expected),
            Expr::Paren(p) => self.compile(&p.expr, expected),
            Expr::Call(call) => calls::compile_call(self, call, statement_call),
            Expr::Field(field) => member::compile_field(self, field),
            Expr::Index(index) => member::compile_index(self, index),
            Expr::Cast(c) => cast::compile_cast(self, c),
            Expr::SizeOf(s) => cast::compile_sizeof(self, s),
            Expr::New(n) => calls::compile_new(self, n),
            Expr::Lambda(l) => lambda::compile_lambda(self, l),
        }
    }

    /// Apply the implicit conversion from `value` to `expected`.
    pub fn coerce(&mut self, value: CompiledExpr, expected: &GeneralType) -> Result<CompiledExpr> {
        if value.ty.same_as(expected) {
            return Ok(value);
        }

        if let (Some(literal), Some(target)) = (value.as_literal(), expected.as_builtin())
            && literal_fits(literal, target)
            && let Ok(retyped) = literal.cast(target)
        {
            return Ok(CompiledExpr::literal(retyped, expected.clone(), value.span));
        }

        match can_cast_implicitly(&value.ty, expected, Some(&value), &self.ctx.decls) {
            Ok(()) => Ok(match value.kind {
                ExprKind::String { value: text, allocation } => {
                    let allocation = if expected.is_pointer() {
                        allocation
                    } else {
                        StringAllocation::Stack
                    };
                    CompiledExpr::new(
                        ExprKind::String {
                            value: text,
                            allocation,
                        },
                        expected.clone(),
                        value.span,
                    )
                }
                _ => {
                    let span = value.span;
                    CompiledExpr::new(ExprKind::Cast(value.boxed()), expected.clone(), span)
                }
            }),
            Err(_) => Err(self.mismatch(expected, &value.ty, value.span)),
        }
    }

    pub(crate) fn mismatch(
        &self,
        expected: &GeneralType,
        got: &GeneralType,
        span: Span,
    ) -> CompilationError {
        CompilationError::TypeMismatch {
            message: format!(
                "expected '{}', got '{}'",
                expected.display(&self.ctx.decls),
                got.display(&self.ctx.decls)
            ),
            span,
        }
    }

    /// Resolve a type written inside the current body.
    ///
    /// Template bindings of the frame apply; array lengths may also name
    /// constants of the enclosing scopes.
    pub fn resolve_type<'t>(&self, ty: &TypeExpr<'t>) -> Result<GeneralType> {
        let ctx = &*self.ctx;
        let file = ctx.file();
        let bindings = ctx.frame().map(|f| f.bindings.clone()).unwrap_or_default();
        let frame = ctx.frame();
        let decls = &ctx.decls;
        let mut lengths = |expr: &Expr<'t>| {
            if let Some(ident) = expr.unparen().as_ident()
                && let Some(constant) = frame.and_then(|f| f.find_constant(ident.ident.name))
                && !constant.value.is_float()
            {
                return u32::try_from(constant.value.as_i128()).map_err(|_| CompilationError::Other {
                    message: format!("array length {} is out of range", constant.value.as_i128()),
                    span: expr.span(),
                });
            }
            static_length(expr, decls, file)
        };
        TypeResolver::new(decls, &ctx.settings, file)
            .with_bindings(&bindings)
            .resolve_with(ty, &mut lengths)
    }

    /// Replace a computable expression by its value.
    pub(crate) fn fold(&self, expr: CompiledExpr) -> CompiledExpr {
        let enabled = self.ctx.settings.optimizes(OptimizationFlags::STATEMENT_EVALUATING);
        if !enabled || expr.as_literal().is_some() {
            return expr;
        }
        match eval::try_compute(&expr, &self.ctx.settings) {
            Some(value) => CompiledExpr::literal(value, expr.ty, expr.span),
            None => expr,
        }
    }

    /// Record that the current file references `function`.
    pub(crate) fn reference(&mut self, function: FunctionId, span: Span) {
        let location = self.ctx.location(span);
        self.ctx.decls.function_mut(function).references.push(location);
    }
}

/// Type of `expr` without keeping anything the attempt produced.
pub fn find_statement_type<'ast>(
    ctx: &mut CompilationContext<'ast>,
    expr: &Expr<'ast>,
) -> Option<GeneralType> {
    ctx.speculate(|ctx| ExprCompiler::new(ctx).infer(expr).ok().map(|value| value.ty))
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{BuiltinType, CompiledValue, CompilerSettings, FileId};
    use corvid_syntax::{AstBuilder, BinaryOp};

    use super::*;
    use crate::context::CompilerInputs;
    use crate::decls::{Binding, BuiltinFunction, CompiledFunction, Parameter};
    use crate::registry::CallableKind;
    use crate::scope::Frame;

    fn context<'ast>() -> CompilationContext<'ast> {
        CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()))
    }

    #[test]
    fn check_adapts_literals_and_rejects_numeric_widening() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = context();
        let (results, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            let mut c = ExprCompiler::new(ctx);
            let byte = c.check(&b.int(200), &GeneralType::U8);
            let too_big = c.check(&b.int(300), &GeneralType::U8);
            (byte, too_big)
        });
        let byte = results.0.unwrap();
        assert_eq!(byte.as_literal(), Some(CompiledValue::U8(200)));
        assert!(matches!(results.1, Err(CompilationError::TypeMismatch { .. })));
    }

    #[test]
    fn folding_follows_settings() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let expr = b.binary(b.int(2), BinaryOp::Add, b.binary(b.int(3), BinaryOp::Mul, b.int(4)));

        let mut ctx = context();
        let (folded, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        assert_eq!(folded.unwrap().as_literal(), Some(CompiledValue::I32(14)));

        let mut ctx =
            CompilationContext::new(&CompilerInputs::new(CompilerSettings::unoptimized()));
        let (kept, _) = ctx.in_frame(Frame::top_level(), |ctx| ExprCompiler::new(ctx).infer(&expr));
        let kept = kept.unwrap();
        assert!(matches!(kept.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
        assert_eq!(kept.ty, GeneralType::Builtin(BuiltinType::I32));
    }

    #[test]
    fn statement_type_leaves_no_diagnostics() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = context();
        let (types, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            (
                find_statement_type(ctx, &b.name("missing")),
                find_statement_type(ctx, &b.float(1.5)),
            )
        });
        assert_eq!(types, (None, Some(GeneralType::F32)));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn statement_type_drops_references() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = context();
        let mut alloc = CompiledFunction::new(
            CallableKind::Function,
            "alloc",
            FileId(0),
            Span::default(),
            GeneralType::any_pointer(),
        );
        alloc.params = vec![Parameter::new("size", GeneralType::I32, Span::default())];
        alloc.binding = Binding::Builtin(BuiltinFunction::Alloc);
        let alloc = ctx.decls.add_function(alloc).unwrap();
        let functions = ctx.decls.function_count();

        let (ty, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            find_statement_type(ctx, &b.name("alloc"))
        });
        assert!(ty.is_some());
        assert!(ctx.decls.function(alloc).references.is_empty());
        assert_eq!(ctx.decls.function_count(), functions);

        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.name("alloc"))
        });
        assert!(value.is_ok());
        assert_eq!(ctx.decls.function(alloc).references.len(), 1);
    }
}
