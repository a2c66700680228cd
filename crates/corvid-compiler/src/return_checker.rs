//! Return path verification for non-void functions.
//!
//! A block returns on every path when its last statement does: a `return`,
//! a nested block that returns, an `if` whose branches both return, or a
//! `while` loop with a constant true condition and no `break`.

use crate::ir::{CompiledBlock, CompiledStatement};

/// Whether every path through `block` ends in a `return`.
pub fn all_paths_return(block: &CompiledBlock) -> bool {
    block.stmts.last().is_some_and(statement_returns)
}

fn statement_returns(stmt: &CompiledStatement) -> bool {
    match stmt {
        CompiledStatement::Return { .. } => true,
        CompiledStatement::Block(block) => all_paths_return(block),
        CompiledStatement::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => all_paths_return(then_branch) && all_paths_return(else_branch),
        CompiledStatement::While { condition, body, .. } => {
            condition.as_literal().is_some_and(|value| value.is_truthy()) && !breaks(body)
        }
        _ => false,
    }
}

/// `break` statements that leave the loop owning `block`.
fn breaks(block: &CompiledBlock) -> bool {
    block.stmts.iter().any(|stmt| match stmt {
        CompiledStatement::Break(_) => true,
        CompiledStatement::Block(inner) => breaks(inner),
        CompiledStatement::If {
            then_branch,
            else_branch,
            ..
        } => breaks(then_branch) || else_branch.as_ref().is_some_and(breaks),
        _ => false,
    })
}
