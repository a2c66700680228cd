//! Call-site inlining of small function bodies.
//!
//! A call in expression position is replaced by the callee's single
//! `return expr;` with parameters substituted by the argument expressions.
//! A call in statement position may also take a single statement body that
//! neither escapes nor touches callee locals. Every argument is classified
//! by [`Complexity`]; substituting it must neither duplicate nor drop work.
//! A refusal leaves the call in place and is recorded as a diagnostic.

use corvid_core::Span;
use tracing::trace;

use crate::context::CompilationContext;
use crate::decls::BodyState;
use crate::ir::visit::{
    contains_escape, parameter_uses, substitute_parameters, substitute_statement,
    uses_frame_storage, writes_parameter,
};
use crate::ir::{CompiledArgument, CompiledExpr, CompiledStatement, ExprKind};

/// Cost of evaluating an argument expression more or fewer times than the
/// call would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Complexity {
    /// Constants: free to duplicate or drop.
    None,
    /// Storage reads: cheap, but the value may change between uses.
    Volatile,
    /// Computations without side effects.
    Complex,
    /// Side effects or allocation.
    Unsupported,
}

/// Classify an argument expression.
pub fn complexity(expr: &CompiledExpr) -> Complexity {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::SizeOf { .. }
        | ExprKind::FunctionAddress(_)
        | ExprKind::LabelAddress(_) => Complexity::None,
        ExprKind::Local(_)
        | ExprKind::Parameter(_)
        | ExprKind::Global(_)
        | ExprKind::Capture(_)
        | ExprKind::Register(_) => Complexity::Volatile,
        ExprKind::Cast(inner) => complexity(inner),
        ExprKind::AddressOf(inner) => complexity(inner).max(Complexity::Volatile),
        ExprKind::Dereference(inner) => complexity(inner).max(Complexity::Complex),
        ExprKind::Unary { operand, .. } => complexity(operand).max(Complexity::Complex),
        ExprKind::Field { object, .. } => complexity(object).max(Complexity::Complex),
        ExprKind::Index { object, index } => {
            complexity(object).max(complexity(index)).max(Complexity::Complex)
        }
        ExprKind::Binary { left, right, .. } => {
            complexity(left).max(complexity(right)).max(Complexity::Complex)
        }
        ExprKind::String { .. }
        | ExprKind::Call { .. }
        | ExprKind::IndirectCall { .. }
        | ExprKind::NewInstance { .. }
        | ExprKind::StackInstance
        | ExprKind::Construct { .. }
        | ExprKind::Lambda { .. } => Complexity::Unsupported,
    }
}

/// Inline a call used as a value.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn inline_expression(
    ctx: &mut CompilationContext<'_>,
    call: &CompiledExpr,
) -> Option<CompiledExpr> {
    let candidate = Candidate::of(ctx, call)?;
    let (stmt, value) = match candidate.body.as_slice() {
        [stmt] => match stmt {
            CompiledStatement::Return { value: Some(value), .. } => (stmt.clone(), value.clone()),
            _ => return candidate.refuse(ctx, "its body is not a single returned expression"),
        },
        _ => return candidate.refuse(ctx, "its body is not a single returned expression"),
    };
    let arguments = match candidate.substitutable(&stmt) {
        Ok(arguments) => arguments,
        Err(reason) => return candidate.refuse(ctx, &reason),
    };

    let mut inlined = substitute_parameters(&value, &arguments);
    inlined.ty = call.ty.clone();
    inlined.span = call.span;
    inlined.save_value = call.save_value;
    candidate.accept(ctx);
    Some(inlined)
}

/// Inline a call whose value is discarded.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn inline_statement(
    ctx: &mut CompilationContext<'_>,
    call: &CompiledExpr,
) -> Option<Vec<CompiledStatement>> {
    let candidate = Candidate::of(ctx, call)?;
    let stmt = match candidate.body.as_slice() {
        [] => None,
        [CompiledStatement::Return { value: None, .. }] => None,
        [CompiledStatement::Return { value: Some(value), .. }] => {
            Some(CompiledStatement::Expression(value.clone().discarded()))
        }
        [stmt] if !contains_escape(stmt) => Some(stmt.clone()),
        [_] => return candidate.refuse(ctx, "its body transfers control"),
        _ => return candidate.refuse(ctx, "its body has more than one statement"),
    };
    let Some(stmt) = stmt else {
        let check = CompiledStatement::Block(Default::default());
        if let Err(reason) = candidate.substitutable(&check) {
            return candidate.refuse(ctx, &reason);
        }
        candidate.accept(ctx);
        return Some(Vec::new());
    };
    let arguments = match candidate.substitutable(&stmt) {
        Ok(arguments) => arguments,
        Err(reason) => return candidate.refuse(ctx, &reason),
    };
    let Some(inlined) = substitute_statement(&stmt, &arguments) else {
        return candidate.refuse(ctx, "its body cannot be moved to the call site");
    };
    candidate.accept(ctx);
    Some(vec![inlined])
}

/// A compiled callee and the call's arguments.
struct Candidate {
    name: String,
    forced: bool,
    span: Span,
    body: Vec<CompiledStatement>,
    arguments: Vec<CompiledArgument>,
}

impl Candidate {
    fn of(ctx: &mut CompilationContext<'_>, call: &CompiledExpr) -> Option<Self> {
        let ExprKind::Call { function, arguments } = &call.kind else {
            return None;
        };
        let callee = ctx.decls.function(*function);
        let name = callee.name.clone();
        let forced = callee.inline;
        let body = match (&callee.state, &callee.body) {
            (BodyState::Compiled, Some(body)) if body.captures.is_empty() => {
                body.block.stmts.clone()
            }
            (BodyState::Compiled, Some(_)) => {
                let candidate = Self {
                    name,
                    forced,
                    span: call.span,
                    body: Vec::new(),
                    arguments: Vec::new(),
                };
                return candidate.refuse(ctx, "it captures variables");
            }
            _ => return None,
        };
        Some(Self {
            name,
            forced,
            span: call.span,
            body,
            arguments: arguments.clone(),
        })
    }

    /// Argument expressions to substitute into `stmt`, or why they cannot be.
    fn substitutable(&self, stmt: &CompiledStatement) -> Result<Vec<CompiledExpr>, String> {
        if uses_frame_storage(stmt) {
            return Err("its body uses local variables".into());
        }
        let mut values = Vec::with_capacity(self.arguments.len());
        for (index, argument) in self.arguments.iter().enumerate() {
            let position = index + 1;
            if argument.by_reference {
                return Err(format!("argument {position} is passed by reference"));
            }
            if argument.cleanup.is_some() {
                return Err(format!("argument {position} is released after the call"));
            }
            let index = index as u32;
            if writes_parameter(stmt, index) {
                return Err(format!("parameter {position} is written"));
            }
            let uses = parameter_uses(stmt, index);
            match complexity(&argument.value) {
                Complexity::Unsupported => {
                    return Err(format!("argument {position} has side effects"));
                }
                Complexity::Volatile | Complexity::Complex if uses > 1 => {
                    return Err(format!("argument {position} would be evaluated {uses} times"));
                }
                Complexity::Complex if uses == 0 => {
                    return Err(format!("argument {position} would not be evaluated"));
                }
                _ => {}
            }
            values.push(argument.value.clone());
        }
        Ok(values)
    }

    fn accept(&self, ctx: &mut CompilationContext<'_>) {
        trace!(function = %self.name, "call inlined");
        ctx.optimization_notice(format!("call to '{}' inlined", self.name), self.span);
    }

    fn refuse<T>(&self, ctx: &mut CompilationContext<'_>, reason: &str) -> Option<T> {
        trace!(function = %self.name, reason, "inlining refused");
        let message = format!("cannot inline '{}': {reason}", self.name);
        if self.forced {
            ctx.warning(message, self.span);
        } else {
            ctx.failed_optimization(message, self.span);
        }
        None
    }
}
