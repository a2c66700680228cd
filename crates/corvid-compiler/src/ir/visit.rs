//! Walkers and rewriters over the compiled tree.

use super::{
    AssignTarget, CompiledArgument, CompiledBlock, CompiledExpr, CompiledStatement, ExprKind,
};

/// Visit `expr` and every sub-expression, parents first.
pub fn walk_expr<'a>(expr: &'a CompiledExpr, f: &mut dyn FnMut(&'a CompiledExpr)) {
    f(expr);
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::String { .. }
        | ExprKind::Local(_)
        | ExprKind::Parameter(_)
        | ExprKind::Global(_)
        | ExprKind::Capture(_)
        | ExprKind::Register(_)
        | ExprKind::FunctionAddress(_)
        | ExprKind::LabelAddress(_)
        | ExprKind::SizeOf { .. }
        | ExprKind::NewInstance { .. }
        | ExprKind::StackInstance => {}
        ExprKind::Field { object, .. } => walk_expr(object, f),
        ExprKind::Index { object, index } => {
            walk_expr(object, f);
            walk_expr(index, f);
        }
        ExprKind::AddressOf(inner) | ExprKind::Dereference(inner) | ExprKind::Cast(inner) => {
            walk_expr(inner, f)
        }
        ExprKind::Call { arguments, .. } => {
            for arg in arguments {
                walk_expr(&arg.value, f);
            }
        }
        ExprKind::IndirectCall { callee, arguments } => {
            walk_expr(callee, f);
            for arg in arguments {
                walk_expr(&arg.value, f);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, f),
        ExprKind::Construct { object, arguments, .. } => {
            walk_expr(object, f);
            for arg in arguments {
                walk_expr(&arg.value, f);
            }
        }
        ExprKind::Lambda { captures, .. } => {
            for capture in captures {
                walk_expr(capture, f);
            }
        }
    }
}

fn walk_target<'a>(target: &'a AssignTarget, f: &mut dyn FnMut(&'a CompiledExpr)) {
    match target {
        AssignTarget::Local(_)
        | AssignTarget::Parameter(_)
        | AssignTarget::Global(_)
        | AssignTarget::Capture(_) => {}
        AssignTarget::Field { object, .. } => walk_expr(object, f),
        AssignTarget::Index { object, index } => {
            walk_expr(object, f);
            walk_expr(index, f);
        }
        AssignTarget::Dereference(pointer) => walk_expr(pointer, f),
    }
}

/// Visit every expression of a statement, including nested statements.
pub fn walk_statement_exprs<'a>(stmt: &'a CompiledStatement, f: &mut dyn FnMut(&'a CompiledExpr)) {
    match stmt {
        CompiledStatement::Block(block) => walk_block_exprs(block, f),
        CompiledStatement::Expression(expr) => walk_expr(expr, f),
        CompiledStatement::VariableDeclaration { value, .. }
        | CompiledStatement::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(value, f);
            }
        }
        CompiledStatement::Assignment { target, value, .. } => {
            walk_target(target, f);
            walk_expr(value, f);
        }
        CompiledStatement::Break(_) | CompiledStatement::Label { .. } => {}
        CompiledStatement::Goto { target, .. } => walk_expr(target, f),
        CompiledStatement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            walk_expr(condition, f);
            walk_block_exprs(then_branch, f);
            if let Some(else_branch) = else_branch {
                walk_block_exprs(else_branch, f);
            }
        }
        CompiledStatement::While { condition, body, .. } => {
            walk_expr(condition, f);
            walk_block_exprs(body, f);
        }
        CompiledStatement::For {
            init,
            condition,
            step,
            body,
            ..
        } => {
            for s in init {
                walk_statement_exprs(s, f);
            }
            if let Some(condition) = condition {
                walk_expr(condition, f);
            }
            for s in step {
                walk_statement_exprs(s, f);
            }
            walk_block_exprs(body, f);
        }
        CompiledStatement::Delete { value, .. } => walk_expr(value, f),
    }
}

pub fn walk_block_exprs<'a>(block: &'a CompiledBlock, f: &mut dyn FnMut(&'a CompiledExpr)) {
    for stmt in &block.stmts {
        walk_statement_exprs(stmt, f);
    }
}

/// Visit every statement, parents first.
pub fn walk_statements<'a>(stmt: &'a CompiledStatement, f: &mut dyn FnMut(&'a CompiledStatement)) {
    f(stmt);
    match stmt {
        CompiledStatement::Block(block) => {
            for s in &block.stmts {
                walk_statements(s, f);
            }
        }
        CompiledStatement::If {
            then_branch,
            else_branch,
            ..
        } => {
            for s in &then_branch.stmts {
                walk_statements(s, f);
            }
            if let Some(else_branch) = else_branch {
                for s in &else_branch.stmts {
                    walk_statements(s, f);
                }
            }
        }
        CompiledStatement::While { body, .. } => {
            for s in &body.stmts {
                walk_statements(s, f);
            }
        }
        CompiledStatement::For { init, step, body, .. } => {
            for s in init.iter().chain(step).chain(&body.stmts) {
                walk_statements(s, f);
            }
        }
        _ => {}
    }
}

// ==========================================================================
// Queries
// ==========================================================================

/// Number of reads of parameter `index` in `expr`.
pub fn parameter_uses_in_expr(expr: &CompiledExpr, index: u32) -> usize {
    let mut count = 0;
    walk_expr(expr, &mut |e| {
        if matches!(e.kind, ExprKind::Parameter(i) if i == index) {
            count += 1;
        }
    });
    count
}

/// Number of uses of parameter `index` in `stmt`, assignments included.
pub fn parameter_uses(stmt: &CompiledStatement, index: u32) -> usize {
    let mut count = 0;
    walk_statement_exprs(stmt, &mut |e| {
        if matches!(e.kind, ExprKind::Parameter(i) if i == index) {
            count += 1;
        }
    });
    walk_statements(stmt, &mut |s| {
        if let CompiledStatement::Assignment {
            target: AssignTarget::Parameter(i),
            ..
        } = s
            && *i == index
        {
            count += 1;
        }
    });
    count
}

fn is_parameter(expr: &CompiledExpr, index: u32) -> bool {
    matches!(expr.kind, ExprKind::Parameter(i) if i == index)
}

/// Whether parameter `index` may be written: assigned, address taken or
/// passed by reference.
pub fn writes_parameter(stmt: &CompiledStatement, index: u32) -> bool {
    let mut written = false;
    walk_statements(stmt, &mut |s| {
        if let CompiledStatement::Assignment {
            target: AssignTarget::Parameter(i),
            ..
        } = s
            && *i == index
        {
            written = true;
        }
    });
    walk_statement_exprs(stmt, &mut |e| match &e.kind {
        ExprKind::AddressOf(inner) if is_parameter(inner, index) => written = true,
        ExprKind::Call { arguments, .. }
        | ExprKind::IndirectCall { arguments, .. }
        | ExprKind::Construct { arguments, .. } => {
            if arguments.iter().any(|a| a.by_reference && is_parameter(&a.value, index)) {
                written = true;
            }
        }
        _ => {}
    });
    written
}

/// Whether the statement transfers control: return, break, goto or a label.
pub fn contains_escape(stmt: &CompiledStatement) -> bool {
    let mut escapes = false;
    walk_statements(stmt, &mut |s| {
        if matches!(
            s,
            CompiledStatement::Return { .. }
                | CompiledStatement::Break(_)
                | CompiledStatement::Goto { .. }
                | CompiledStatement::Label { .. }
        ) {
            escapes = true;
        }
    });
    escapes
}

/// Whether any expression refers to frame-bound storage: locals, captures
/// or local labels.
pub fn uses_frame_storage(stmt: &CompiledStatement) -> bool {
    let mut uses = false;
    walk_statement_exprs(stmt, &mut |e| {
        if matches!(
            e.kind,
            ExprKind::Local(_)
                | ExprKind::Capture(_)
                | ExprKind::LabelAddress(super::LabelRef::Local(_))
        ) {
            uses = true;
        }
    });
    uses
}

// ==========================================================================
// Rewriting
// ==========================================================================

/// Rebuild `expr` bottom-up, letting `replace` substitute any node.
///
/// `replace` is tried on each node before its children; returning `Some`
/// stops descent into that node.
pub fn map_expr(
    expr: &CompiledExpr,
    replace: &mut dyn FnMut(&CompiledExpr) -> Option<CompiledExpr>,
) -> CompiledExpr {
    if let Some(replaced) = replace(expr) {
        return replaced;
    }
    let kind = match &expr.kind {
        ExprKind::Field {
            object,
            index,
            through_pointer,
        } => ExprKind::Field {
            object: map_expr(object, replace).boxed(),
            index: *index,
            through_pointer: *through_pointer,
        },
        ExprKind::Index { object, index } => ExprKind::Index {
            object: map_expr(object, replace).boxed(),
            index: map_expr(index, replace).boxed(),
        },
        ExprKind::AddressOf(inner) => ExprKind::AddressOf(map_expr(inner, replace).boxed()),
        ExprKind::Dereference(inner) => ExprKind::Dereference(map_expr(inner, replace).boxed()),
        ExprKind::Cast(inner) => ExprKind::Cast(map_expr(inner, replace).boxed()),
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: map_expr(left, replace).boxed(),
            right: map_expr(right, replace).boxed(),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: map_expr(operand, replace).boxed(),
        },
        ExprKind::Call { function, arguments } => ExprKind::Call {
            function: *function,
            arguments: map_arguments(arguments, replace),
        },
        ExprKind::IndirectCall { callee, arguments } => ExprKind::IndirectCall {
            callee: map_expr(callee, replace).boxed(),
            arguments: map_arguments(arguments, replace),
        },
        ExprKind::Construct {
            constructor,
            object,
            arguments,
        } => ExprKind::Construct {
            constructor: *constructor,
            object: map_expr(object, replace).boxed(),
            arguments: map_arguments(arguments, replace),
        },
        ExprKind::Lambda { function, captures } => ExprKind::Lambda {
            function: *function,
            captures: captures.iter().map(|c| map_expr(c, replace)).collect(),
        },
        other => other.clone(),
    };
    CompiledExpr {
        kind,
        ty: expr.ty.clone(),
        save_value: expr.save_value,
        span: expr.span,
    }
}

fn map_arguments(
    arguments: &[CompiledArgument],
    replace: &mut dyn FnMut(&CompiledExpr) -> Option<CompiledExpr>,
) -> Vec<CompiledArgument> {
    arguments
        .iter()
        .map(|a| CompiledArgument {
            value: map_expr(&a.value, replace),
            by_reference: a.by_reference,
            cleanup: a.cleanup.clone(),
        })
        .collect()
}

/// Replace parameter reads by the given argument expressions.
pub fn substitute_parameters(expr: &CompiledExpr, arguments: &[CompiledExpr]) -> CompiledExpr {
    map_expr(expr, &mut |e| match e.kind {
        ExprKind::Parameter(i) => arguments.get(i as usize).map(|arg| CompiledExpr {
            save_value: e.save_value,
            span: e.span,
            ..arg.clone()
        }),
        _ => None,
    })
}

fn substitute_target(target: &AssignTarget, arguments: &[CompiledExpr]) -> Option<AssignTarget> {
    let sub = |e: &CompiledExpr| substitute_parameters(e, arguments).boxed();
    Some(match target {
        AssignTarget::Parameter(i) => AssignTarget::from_expr(arguments.get(*i as usize)?)?,
        AssignTarget::Field {
            object,
            index,
            through_pointer,
        } => AssignTarget::Field {
            object: sub(object),
            index: *index,
            through_pointer: *through_pointer,
        },
        AssignTarget::Index { object, index } => AssignTarget::Index {
            object: sub(object),
            index: sub(index),
        },
        AssignTarget::Dereference(pointer) => AssignTarget::Dereference(sub(pointer)),
        other => other.clone(),
    })
}

/// Substitute parameters inside an escape-free statement.
///
/// Returns `None` for statement shapes that cannot be moved to a call site.
pub fn substitute_statement(
    stmt: &CompiledStatement,
    arguments: &[CompiledExpr],
) -> Option<CompiledStatement> {
    let sub = |e: &CompiledExpr| substitute_parameters(e, arguments);
    let block = |b: &CompiledBlock| -> Option<CompiledBlock> {
        Some(CompiledBlock {
            stmts: b
                .stmts
                .iter()
                .map(|s| substitute_statement(s, arguments))
                .collect::<Option<_>>()?,
            span: b.span,
        })
    };
    Some(match stmt {
        CompiledStatement::Block(b) => CompiledStatement::Block(block(b)?),
        CompiledStatement::Expression(e) => CompiledStatement::Expression(sub(e)),
        CompiledStatement::Assignment { target, value, span } => CompiledStatement::Assignment {
            target: substitute_target(target, arguments)?,
            value: sub(value),
            span: *span,
        },
        CompiledStatement::If {
            condition,
            then_branch,
            else_branch,
            span,
        } => CompiledStatement::If {
            condition: sub(condition),
            then_branch: block(then_branch)?,
            else_branch: match else_branch {
                Some(e) => Some(block(e)?),
                None => None,
            },
            span: *span,
        },
        CompiledStatement::While { condition, body, span } => CompiledStatement::While {
            condition: sub(condition),
            body: block(body)?,
            span: *span,
        },
        CompiledStatement::Delete {
            value,
            destructor,
            deallocator,
            span,
        } => CompiledStatement::Delete {
            value: sub(value),
            destructor: *destructor,
            deallocator: *deallocator,
            span: *span,
        },
        CompiledStatement::VariableDeclaration { .. }
        | CompiledStatement::For { .. }
        | CompiledStatement::Return { .. }
        | CompiledStatement::Break(_)
        | CompiledStatement::Goto { .. }
        | CompiledStatement::Label { .. } => return None,
    })
}

#[cfg(test)]
mod tests {
    use corvid_core::{CompiledValue, Span};
    use corvid_syntax::BinaryOp;

    use super::*;
    use crate::types::GeneralType;

    fn param(i: u32) -> CompiledExpr {
        CompiledExpr::new(ExprKind::Parameter(i), GeneralType::I32, Span::default())
    }

    fn add(l: CompiledExpr, r: CompiledExpr) -> CompiledExpr {
        CompiledExpr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: l.boxed(),
                right: r.boxed(),
            },
            GeneralType::I32,
            Span::default(),
        )
    }

    #[test]
    fn counts_parameter_reads() {
        let expr = add(param(0), add(param(0), param(1)));
        assert_eq!(parameter_uses_in_expr(&expr, 0), 2);
        assert_eq!(parameter_uses_in_expr(&expr, 1), 1);
        assert_eq!(parameter_uses_in_expr(&expr, 2), 0);
    }

    #[test]
    fn substitutes_parameters() {
        let expr = add(param(0), param(1));
        let one = CompiledExpr::literal(CompiledValue::I32(1), GeneralType::I32, Span::default());
        let two = CompiledExpr::literal(CompiledValue::I32(2), GeneralType::I32, Span::default());
        let result = substitute_parameters(&expr, &[one.clone(), two.clone()]);
        assert_eq!(result, add(one, two));
    }

    #[test]
    fn detects_escapes() {
        let ret = CompiledStatement::Return {
            value: None,
            span: Span::default(),
        };
        let nested = CompiledStatement::If {
            condition: param(0),
            then_branch: CompiledBlock::new(vec![ret], Span::default()),
            else_branch: None,
            span: Span::default(),
        };
        assert!(contains_escape(&nested));
        assert!(!contains_escape(&CompiledStatement::Expression(param(0))));
    }

    #[test]
    fn assignment_to_parameter_is_a_write() {
        let stmt = CompiledStatement::Assignment {
            target: AssignTarget::Parameter(0),
            value: param(1),
            span: Span::default(),
        };
        assert!(writes_parameter(&stmt, 0));
        assert!(!writes_parameter(&stmt, 1));
        assert_eq!(parameter_uses(&stmt, 0), 1);
    }
}
