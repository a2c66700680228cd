//! Evaluation of whole function bodies.
//!
//! Each call gets a transient activation holding its parameters and locals.
//! Only scalar parameters and locals are modelled; any read or write of other
//! storage, any call that is not itself evaluable and any `goto` abort the
//! attempt. Recursion and loops are bounded so evaluation always terminates.

use corvid_core::{BuiltinType, CompiledValue, CompilerSettings};
use tracing::trace;

use super::{Environment, compute};
use crate::context::CompilationContext;
use crate::decls::{Binding, BodyState};
use crate::ir::{AssignTarget, CompiledBlock, CompiledExpr, CompiledStatement, ExprKind};
use crate::registry::{Declarations, FunctionId};

const MAX_CALL_DEPTH: u32 = 8;
const MAX_WHILE_ITERATIONS: u32 = 64;
const MAX_FOR_ITERATIONS: u32 = 5048;

/// Run `function` on literal arguments and return its result.
///
/// The function must already be compiled. `None` means the call stays a
/// runtime call.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn try_evaluate(
    ctx: &CompilationContext<'_>,
    function: FunctionId,
    args: &[CompiledValue],
) -> Option<CompiledValue> {
    let interpreter = Interpreter {
        decls: &ctx.decls,
        settings: &ctx.settings,
    };
    let value = interpreter.call(function, args, 0);
    trace!(
        function = %ctx.decls.function(function).name,
        evaluated = value.is_some(),
        "evaluation attempt"
    );
    value
}

struct Interpreter<'c, 'ast> {
    decls: &'c Declarations<'ast>,
    settings: &'c CompilerSettings,
}

/// Outcome of a statement.
enum Flow {
    Next,
    Break,
    Return(Option<CompiledValue>),
}

/// Storage of one call.
struct Activation<'i, 'c, 'ast> {
    interpreter: &'i Interpreter<'c, 'ast>,
    depth: u32,
    params: Vec<CompiledValue>,
    locals: Vec<Option<CompiledValue>>,
    /// Scalar kind of each local; `None` for storage that cannot be modelled.
    local_kinds: Vec<Option<BuiltinType>>,
}

impl<'c, 'ast> Interpreter<'c, 'ast> {
    fn call(
        &self,
        function: FunctionId,
        args: &[CompiledValue],
        depth: u32,
    ) -> Option<CompiledValue> {
        if depth >= MAX_CALL_DEPTH {
            return None;
        }
        let callee = self.decls.function(function);
        if callee.binding != Binding::Source
            || callee.state != BodyState::Compiled
            || args.len() != callee.params.len()
        {
            return None;
        }
        let body = callee.body.as_ref()?;
        if !body.captures.is_empty() {
            return None;
        }
        let result_kind = callee.return_type.as_builtin().filter(|kind| kind.is_numeric())?;

        let params = args
            .iter()
            .zip(&callee.params)
            .map(|(value, param)| param.ty.as_builtin().and_then(|kind| value.cast(kind).ok()))
            .collect::<Option<Vec<_>>>()?;
        let mut activation = Activation {
            interpreter: self,
            depth,
            params,
            locals: vec![None; body.locals.len()],
            local_kinds: body.locals.iter().map(|local| local.ty.as_builtin()).collect(),
        };
        match activation.block(&body.block)? {
            Flow::Return(Some(value)) => value.cast(result_kind).ok(),
            _ => None,
        }
    }
}

impl Activation<'_, '_, '_> {
    fn block(&mut self, block: &CompiledBlock) -> Option<Flow> {
        for stmt in &block.stmts {
            match self.statement(stmt)? {
                Flow::Next => {}
                flow => return Some(flow),
            }
        }
        Some(Flow::Next)
    }

    fn statements(&mut self, stmts: &[CompiledStatement]) -> Option<Flow> {
        for stmt in stmts {
            match self.statement(stmt)? {
                Flow::Next => {}
                flow => return Some(flow),
            }
        }
        Some(Flow::Next)
    }

    fn statement(&mut self, stmt: &CompiledStatement) -> Option<Flow> {
        match stmt {
            CompiledStatement::Block(block) => self.block(block),
            CompiledStatement::Expression(expr) => {
                self.value(expr)?;
                Some(Flow::Next)
            }
            CompiledStatement::VariableDeclaration { variable, value, .. } => {
                let index = variable.0 as usize;
                let kind = (*self.local_kinds.get(index)?)?;
                let value = match value {
                    Some(value) => Some(self.value(value)?.cast(kind).ok()?),
                    None => None,
                };
                *self.locals.get_mut(index)? = value;
                Some(Flow::Next)
            }
            CompiledStatement::Assignment { target, value, .. } => {
                let value = self.value(value)?;
                match target {
                    AssignTarget::Local(id) => {
                        let index = id.0 as usize;
                        let kind = (*self.local_kinds.get(index)?)?;
                        *self.locals.get_mut(index)? = Some(value.cast(kind).ok()?);
                    }
                    AssignTarget::Parameter(index) => {
                        let slot = self.params.get_mut(*index as usize)?;
                        *slot = value.cast(slot.kind()).ok()?;
                    }
                    _ => return None,
                }
                Some(Flow::Next)
            }
            CompiledStatement::Return { value, .. } => {
                let value = match value {
                    Some(value) => Some(self.value(value)?),
                    None => None,
                };
                Some(Flow::Return(value))
            }
            CompiledStatement::Break(_) => Some(Flow::Break),
            CompiledStatement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.value(condition)?.is_truthy() {
                    self.block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.block(else_branch)
                } else {
                    Some(Flow::Next)
                }
            }
            CompiledStatement::While { condition, body, .. } => {
                let mut iterations = 0;
                while self.value(condition)?.is_truthy() {
                    iterations += 1;
                    if iterations > MAX_WHILE_ITERATIONS {
                        return None;
                    }
                    match self.block(body)? {
                        Flow::Next => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Some(flow),
                    }
                }
                Some(Flow::Next)
            }
            CompiledStatement::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                if let flow @ (Flow::Break | Flow::Return(_)) = self.statements(init)? {
                    return Some(flow);
                }
                let mut iterations = 0;
                loop {
                    if let Some(condition) = condition
                        && !self.value(condition)?.is_truthy()
                    {
                        break;
                    }
                    iterations += 1;
                    if iterations > MAX_FOR_ITERATIONS {
                        return None;
                    }
                    match self.block(body)? {
                        Flow::Next => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Some(flow),
                    }
                    self.statements(step)?;
                }
                Some(Flow::Next)
            }
            CompiledStatement::Goto { .. }
            | CompiledStatement::Label { .. }
            | CompiledStatement::Delete { .. } => None,
        }
    }

    fn value(&mut self, expr: &CompiledExpr) -> Option<CompiledValue> {
        let settings = self.interpreter.settings;
        compute(expr, settings, self)
    }
}

impl Environment for Activation<'_, '_, '_> {
    fn read(&mut self, expr: &CompiledExpr) -> Option<CompiledValue> {
        match &expr.kind {
            ExprKind::Local(id) => *self.locals.get(id.0 as usize)?,
            ExprKind::Parameter(index) => self.params.get(*index as usize).copied(),
            ExprKind::Call { function, arguments } => {
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    if argument.by_reference || argument.cleanup.is_some() {
                        return None;
                    }
                    values.push(self.value(&argument.value)?);
                }
                self.interpreter.call(*function, &values, self.depth + 1)
            }
            _ => None,
        }
    }
}
