//! Calls, construction and the allocation helpers.
//!
//! ## Algorithm
//!
//! A call is lowered in four steps:
//!
//! 1. the arguments are inferred without expected types
//! 2. overload resolution picks the callee (instantiating templates)
//! 3. [`finish_arguments`] converts each argument to its parameter type,
//!    fills omitted trailing arguments from parameter defaults and marks
//!    `ref` and `temp` arguments
//! 4. [`emit_call`] records the reference and, when enabled, evaluates the
//!    call at compile time or inlines the callee
//!
//! `obj.f(args)` is `f(obj, args)`; `T(args)` for a struct `T` without a
//! function of that name constructs `T` on the stack.

use corvid_core::{CompilationError, CompiledValue, OptimizationFlags, Span};
use corvid_syntax::{CallExpr, Expr, NewExpr};
use tracing::trace;

use super::{ExprCompiler, Result, is_source_literal, lookup_variable, member};
use crate::context::CompilationContext;
use crate::decls::Parameter;
use crate::eval;
use crate::function_compiler::compile_function_body;
use crate::inline;
use crate::ir::{Cleanup, CompiledArgument, CompiledExpr, ExprKind};
use crate::overload::{
    FunctionQuery, QueryArgument, QueryAttribute, find_function, try_find_function,
};
use crate::registry::{CallableKind, FunctionId};
use crate::types::{GeneralType, TypeResolver, size_of};

/// Lower a call expression.
pub fn compile_call<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    call: &CallExpr<'ast>,
    statement: bool,
) -> Result<CompiledExpr> {
    let span = call.span;
    match call.callee.unparen() {
        Expr::Field(field) => {
            let object = compiler.infer(&field.object)?;
            let name = field.field.name;
            if has_function_field(compiler, &object, name) {
                let callee = member::field_of(compiler, object, name, field.span)?;
                return indirect_call(compiler, callee, call.args, span);
            }
            let mut values = vec![(object, false)];
            values.extend(lower_arguments(compiler, call.args)?);
            call_named(compiler, name, &[], values, span, statement)
        }
        Expr::Ident(ident) => {
            let name = ident.ident.name;
            if ident.type_args.is_empty()
                && let Some(callee) = lookup_variable(compiler, name, ident.span)?
            {
                return indirect_call(compiler, callee, call.args, span);
            }
            let type_args = ident
                .type_args
                .iter()
                .map(|ty| compiler.resolve_type(ty))
                .collect::<Result<Vec<_>>>()?;
            if !has_function(compiler.ctx, name)
                && let Some(ty) = type_named(compiler, name, &type_args, ident.span)
            {
                let object = CompiledExpr::new(ExprKind::StackInstance, ty.clone(), span);
                return construct(compiler, ty, object, call.args, span);
            }
            let values = lower_arguments(compiler, call.args)?;
            call_named(compiler, name, &type_args, values, span, statement)
        }
        _ => {
            let callee = compiler.infer(&call.callee)?;
            indirect_call(compiler, callee, call.args, span)
        }
    }
}

/// Infer every argument, remembering which ones are source literals.
fn lower_arguments<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    args: &[Expr<'ast>],
) -> Result<Vec<(CompiledExpr, bool)>> {
    args.iter()
        .map(|arg| Ok((compiler.infer(arg)?, is_source_literal(arg))))
        .collect()
}

fn has_function(ctx: &CompilationContext<'_>, name: &str) -> bool {
    ctx.decls
        .functions_named(name)
        .iter()
        .any(|id| ctx.decls.function(*id).kind == CallableKind::Function)
}

fn has_function_field(compiler: &ExprCompiler<'_, '_>, object: &CompiledExpr, name: &str) -> bool {
    let Some((id, type_args, _)) = object.ty.struct_or_pointee() else {
        return false;
    };
    compiler
        .ctx
        .decls
        .struct_fields(id, type_args)
        .is_some_and(|fields| fields.iter().any(|f| f.name == name && f.ty.as_function().is_some()))
}

/// The type a callee name denotes, if any.
fn type_named(
    compiler: &ExprCompiler<'_, '_>,
    name: &str,
    type_args: &[GeneralType],
    span: Span,
) -> Option<GeneralType> {
    let ctx = &*compiler.ctx;
    let bindings = ctx.frame().map(|f| f.bindings.clone()).unwrap_or_default();
    TypeResolver::new(&ctx.decls, &ctx.settings, ctx.file())
        .with_bindings(&bindings)
        .resolve_name(name, type_args.to_vec(), span)
        .ok()
}

/// Resolve and emit a call to a named function.
fn call_named(
    compiler: &mut ExprCompiler<'_, '_>,
    name: &str,
    type_args: &[GeneralType],
    values: Vec<(CompiledExpr, bool)>,
    span: Span,
    statement: bool,
) -> Result<CompiledExpr> {
    let file = compiler.ctx.file();
    let found = {
        let args: Vec<QueryArgument<'_>> = values
            .iter()
            .map(|(e, literal)| QueryArgument::of(e, *literal))
            .collect();
        let query =
            FunctionQuery::new(CallableKind::Function, name, file, &args).with_type_args(type_args);
        find_function(compiler.ctx, &query, span)?
    };
    let values = values.into_iter().map(|(e, _)| e).collect();
    let arguments = finish_arguments(compiler, found.function, 0, values, span)?;
    emit_call(compiler, found.function, arguments, span, statement)
}

/// Call through a function-typed value.
fn indirect_call<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    callee: CompiledExpr,
    args: &[Expr<'ast>],
    span: Span,
) -> Result<CompiledExpr> {
    let Some((return_type, params, _)) = callee.ty.as_function() else {
        return Err(CompilationError::TypeMismatch {
            message: format!("'{}' is not callable", callee.ty.display(&compiler.ctx.decls)),
            span,
        });
    };
    let return_type = return_type.clone();
    let params = params.to_vec();
    if params.len() != args.len() {
        return Err(CompilationError::ArgumentCountMismatch {
            name: callee.ty.display(&compiler.ctx.decls).to_string(),
            expected: params.len(),
            got: args.len(),
            span,
        });
    }
    let mut arguments = Vec::with_capacity(args.len());
    for (arg, param) in args.iter().zip(&params) {
        arguments.push(CompiledArgument::value(compiler.check(arg, param)?));
    }
    Ok(CompiledExpr::new(
        ExprKind::IndirectCall {
            callee: callee.boxed(),
            arguments,
        },
        return_type,
        span,
    ))
}

// ==========================================================================
// Arguments
// ==========================================================================

/// Convert `args` to the parameters of `function` starting at
/// `first_param`, filling defaults for omitted trailing parameters.
pub(crate) fn finish_arguments(
    compiler: &mut ExprCompiler<'_, '_>,
    function: FunctionId,
    first_param: usize,
    args: Vec<CompiledExpr>,
    span: Span,
) -> Result<Vec<CompiledArgument>> {
    let callee = compiler.ctx.decls.function(function);
    let callee_file = callee.file;
    let name = callee.name.clone();
    let params = callee.params.get(first_param..).unwrap_or_default().to_vec();
    if args.len() > params.len() {
        return Err(CompilationError::ArgumentCountMismatch {
            name,
            expected: params.len(),
            got: args.len(),
            span,
        });
    }

    let given = args.len();
    let mut arguments = Vec::with_capacity(params.len());
    let mut args = args.into_iter();
    for param in &params {
        let value = match args.next() {
            Some(value) if param.is_ref() => {
                if !value.ty.same_as(&param.ty) {
                    return Err(compiler.mismatch(&param.ty, &value.ty, value.span));
                }
                value
            }
            Some(value) => compiler.coerce(value, &param.ty)?,
            None => {
                let Some(default) = param.default else {
                    return Err(CompilationError::ArgumentCountMismatch {
                        name,
                        expected: params.len(),
                        got: given,
                        span,
                    });
                };
                let ty = param.ty.clone();
                compiler.ctx.with_detached_scopes(|ctx| {
                    ctx.with_file(callee_file, |ctx| ExprCompiler::new(ctx).check(default, &ty))
                })?
            }
        };
        arguments.push(argument(compiler, param, value, span)?);
    }
    Ok(arguments)
}

fn argument(
    compiler: &mut ExprCompiler<'_, '_>,
    param: &Parameter<'_>,
    value: CompiledExpr,
    span: Span,
) -> Result<CompiledArgument> {
    if param.is_ref() {
        if !value.is_lvalue() {
            return Err(CompilationError::NotAnLvalue { span: value.span });
        }
        return Ok(CompiledArgument {
            value,
            by_reference: true,
            cleanup: None,
        });
    }
    let cleanup = if param.is_temp() && value.ty.is_pointer() && is_fresh_heap_value(&value) {
        Some(Cleanup {
            destructor: destructor(compiler.ctx, &value.ty, span)?,
            deallocator: deallocator(compiler.ctx, &value.ty, span)?,
        })
    } else {
        None
    };
    Ok(CompiledArgument {
        value,
        by_reference: false,
        cleanup,
    })
}

/// Heap storage created by the argument expression itself.
fn is_fresh_heap_value(value: &CompiledExpr) -> bool {
    match &value.kind {
        ExprKind::String { allocation, .. } => {
            matches!(allocation, crate::ir::StringAllocation::Heap { .. })
        }
        ExprKind::NewInstance { .. } => true,
        ExprKind::Construct { object, .. } => matches!(object.kind, ExprKind::NewInstance { .. }),
        ExprKind::Cast(inner) => is_fresh_heap_value(inner),
        _ => false,
    }
}

// ==========================================================================
// Emission
// ==========================================================================

/// Emit a call to a resolved callable.
///
/// With function evaluation enabled a call whose arguments are all literals
/// is replaced by its result; with inlining enabled (or `#inline` on the
/// callee) a call in expression position is replaced by the callee body.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn emit_call(
    compiler: &mut ExprCompiler<'_, '_>,
    function: FunctionId,
    arguments: Vec<CompiledArgument>,
    span: Span,
    statement: bool,
) -> Result<CompiledExpr> {
    compiler.reference(function, span);
    let callee = compiler.ctx.decls.function(function);
    let return_type = callee.return_type.clone();
    let forced_inline = callee.inline;
    let settings = &compiler.ctx.settings;

    let literal_args: Option<Vec<CompiledValue>> = arguments
        .iter()
        .map(|a| if a.by_reference || a.cleanup.is_some() { None } else { a.value.as_literal() })
        .collect();
    let evaluate = settings.optimizes(OptimizationFlags::FUNCTION_EVALUATING)
        && return_type.is_numeric()
        && literal_args.is_some();
    let inline = settings.optimizes(OptimizationFlags::FUNCTION_INLINING) || forced_inline;

    if evaluate || inline {
        compile_function_body(compiler.ctx, function);
    }
    if evaluate
        && let Some(values) = literal_args
        && let Some(value) = eval::try_evaluate(compiler.ctx, function, &values)
    {
        let name = compiler.ctx.decls.function(function).name.clone();
        trace!(function = %name, "call evaluated");
        compiler
            .ctx
            .optimization_notice(format!("call to '{name}' evaluated at compile time"), span);
        return Ok(CompiledExpr::literal(value, return_type, span));
    }

    let call = CompiledExpr::new(ExprKind::Call { function, arguments }, return_type, span);
    if !statement
        && inline
        && let Some(inlined) = inline::inline_expression(compiler.ctx, &call)
    {
        return Ok(inlined);
    }
    Ok(call)
}

fn reference(ctx: &mut CompilationContext<'_>, function: FunctionId, span: Span) {
    let location = ctx.location(span);
    ctx.decls.function_mut(function).references.push(location);
}

// ==========================================================================
// Allocation
// ==========================================================================

/// The `#builtin("alloc")` function for a block of `size` bytes.
pub fn allocator(ctx: &mut CompilationContext<'_>, size: u32, span: Span) -> Result<FunctionId> {
    let kind = ctx.settings.size_of_type;
    let value = CompiledValue::from_integer(kind, size as i128)
        .map_err(|e| CompilationError::other(e.to_string(), span))?;
    let size_expr = CompiledExpr::literal(value, GeneralType::Builtin(kind), span);
    let file = ctx.file();
    let found = {
        let args = [QueryArgument::Literal(&size_expr)];
        let attribute = QueryAttribute {
            name: "builtin",
            argument: Some("alloc"),
        };
        let query = FunctionQuery::by_attribute(CallableKind::Function, attribute, file, &args);
        find_function(ctx, &query, span)?
    };
    reference(ctx, found.function, span);
    Ok(found.function)
}

/// The `#builtin("free")` function accepting `ty`, if one is declared.
pub fn deallocator(
    ctx: &mut CompilationContext<'_>,
    ty: &GeneralType,
    span: Span,
) -> Result<Option<FunctionId>> {
    let file = ctx.file();
    let found = {
        let args = [QueryArgument::Type(ty)];
        let attribute = QueryAttribute {
            name: "builtin",
            argument: Some("free"),
        };
        let query = FunctionQuery::by_attribute(CallableKind::Function, attribute, file, &args);
        try_find_function(ctx, &query, span)?
    };
    Ok(found.map(|found| {
        reference(ctx, found.function, span);
        found.function
    }))
}

/// The destructor of the struct `ty` points to, if it has one.
pub fn destructor(
    ctx: &mut CompilationContext<'_>,
    ty: &GeneralType,
    span: Span,
) -> Result<Option<FunctionId>> {
    if ty.pointee().and_then(GeneralType::as_struct).is_none() {
        return Ok(None);
    }
    let file = ctx.file();
    let found = {
        let args = [QueryArgument::Type(ty)];
        let query = FunctionQuery::new(CallableKind::GeneralFunction, "destructor", file, &args);
        try_find_function(ctx, &query, span)?
    };
    Ok(found.map(|found| {
        reference(ctx, found.function, span);
        found.function
    }))
}

// ==========================================================================
// Construction
// ==========================================================================

/// Lower `new T(args)`: heap storage, then construction.
pub fn compile_new<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    new: &NewExpr<'ast>,
) -> Result<CompiledExpr> {
    let span = new.span;
    let ty = compiler.resolve_type(&new.ty)?;
    let size = size_of(&ty, &compiler.ctx.decls, &compiler.ctx.settings)
        .map_err(|e| CompilationError::other(e.to_string(), span))?;
    let allocator = allocator(compiler.ctx, size, span)?;
    let object = CompiledExpr::new(
        ExprKind::NewInstance { allocator, size },
        GeneralType::pointer_to(ty.clone()),
        span,
    );
    construct(compiler, ty, object, new.args, span)
}

/// Run the best constructor of `ty` on `object`.
///
/// Structs without constructors take no arguments; other types take at most
/// one, the initial value.
fn construct<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    ty: GeneralType,
    object: CompiledExpr,
    args: &[Expr<'ast>],
    span: Span,
) -> Result<CompiledExpr> {
    let result_type = object.ty.clone();
    let Some((id, _)) = ty.as_struct() else {
        let arguments = match args {
            [] => Vec::new(),
            [value] => vec![CompiledArgument::value(compiler.check(value, &ty)?)],
            _ => {
                return Err(CompilationError::ArgumentCountMismatch {
                    name: ty.display(&compiler.ctx.decls).to_string(),
                    expected: 1,
                    got: args.len(),
                    span,
                });
            }
        };
        return Ok(CompiledExpr::new(
            ExprKind::Construct {
                constructor: None,
                object: object.boxed(),
                arguments,
            },
            result_type,
            span,
        ));
    };

    let name = compiler.ctx.decls.structure(id).name.clone();
    let has_constructor = compiler.ctx.decls.functions_named(&name).iter().any(|f| {
        let f = compiler.ctx.decls.function(*f);
        f.kind == CallableKind::Constructor && f.owner == Some(id)
    });
    if !has_constructor {
        if !args.is_empty() {
            return Err(CompilationError::ArgumentCountMismatch {
                name,
                expected: 0,
                got: args.len(),
                span,
            });
        }
        return Ok(CompiledExpr::new(
            ExprKind::Construct {
                constructor: None,
                object: object.boxed(),
                arguments: Vec::new(),
            },
            result_type,
            span,
        ));
    }

    let values = lower_arguments(compiler, args)?;
    let file = compiler.ctx.file();
    let found = {
        let mut query_args = vec![QueryArgument::This(&ty)];
        query_args.extend(values.iter().map(|(e, literal)| QueryArgument::of(e, *literal)));
        let query = FunctionQuery::new(CallableKind::Constructor, &name, file, &query_args);
        find_function(compiler.ctx, &query, span)?
    };
    compiler.reference(found.function, span);
    let values = values.into_iter().map(|(e, _)| e).collect();
    let arguments = finish_arguments(compiler, found.function, 1, values, span)?;
    Ok(CompiledExpr::new(
        ExprKind::Construct {
            constructor: Some(found.function),
            object: object.boxed(),
            arguments,
        },
        result_type,
        span,
    ))
}
