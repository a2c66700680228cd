//! The compiled statement tree.
//!
//! Statements carry no value; expressions carry their resolved type, a
//! `save_value` flag and their span. The node set is closed; every pass over
//! the tree is an exhaustive `match` in [`visit`] or in the pass itself.

pub mod visit;

use std::fmt;

use corvid_core::{CompiledValue, Span};
use corvid_syntax::{BinaryOp, UnaryOp};

use crate::registry::{FunctionId, GlobalId};
use crate::scope::VariableId;
use crate::types::GeneralType;

/// A sequence of statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledBlock {
    pub stmts: Vec<CompiledStatement>,
    pub span: Span,
}

impl CompiledBlock {
    pub fn new(stmts: Vec<CompiledStatement>, span: Span) -> Self {
        Self { stmts, span }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// A statement without value.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledStatement {
    Block(CompiledBlock),
    /// An expression evaluated for its effects.
    Expression(CompiledExpr),
    VariableDeclaration {
        variable: VariableId,
        value: Option<CompiledExpr>,
        span: Span,
    },
    Assignment {
        target: AssignTarget,
        value: CompiledExpr,
        span: Span,
    },
    Return {
        value: Option<CompiledExpr>,
        span: Span,
    },
    Break(Span),
    /// Jump to a label address.
    Goto {
        target: CompiledExpr,
        span: Span,
    },
    Label {
        label: LabelRef,
        span: Span,
    },
    If {
        condition: CompiledExpr,
        then_branch: CompiledBlock,
        else_branch: Option<CompiledBlock>,
        span: Span,
    },
    While {
        condition: CompiledExpr,
        body: CompiledBlock,
        span: Span,
    },
    For {
        init: Vec<CompiledStatement>,
        condition: Option<CompiledExpr>,
        step: Vec<CompiledStatement>,
        body: CompiledBlock,
        span: Span,
    },
    /// Run the destructor (if any) on the value, then release it through the
    /// deallocator (if any).
    Delete {
        value: CompiledExpr,
        destructor: Option<FunctionId>,
        deallocator: Option<FunctionId>,
        span: Span,
    },
}

impl CompiledStatement {
    pub fn span(&self) -> Span {
        match self {
            Self::Block(b) => b.span,
            Self::Expression(e) => e.span,
            Self::VariableDeclaration { span, .. }
            | Self::Assignment { span, .. }
            | Self::Return { span, .. }
            | Self::Goto { span, .. }
            | Self::Label { span, .. }
            | Self::If { span, .. }
            | Self::While { span, .. }
            | Self::For { span, .. }
            | Self::Delete { span, .. } => *span,
            Self::Break(span) => *span,
        }
    }
}

/// Where an assignment stores its value.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Local(VariableId),
    Parameter(u32),
    Global(GlobalId),
    Capture(u32),
    Field {
        object: Box<CompiledExpr>,
        index: u32,
        through_pointer: bool,
    },
    /// Builtin array indexing.
    Index {
        object: Box<CompiledExpr>,
        index: Box<CompiledExpr>,
    },
    Dereference(Box<CompiledExpr>),
}

impl AssignTarget {
    /// The getter reading the same storage.
    pub fn as_expr(&self, ty: GeneralType, span: Span) -> CompiledExpr {
        let kind = match self {
            Self::Local(id) => ExprKind::Local(*id),
            Self::Parameter(i) => ExprKind::Parameter(*i),
            Self::Global(id) => ExprKind::Global(*id),
            Self::Capture(i) => ExprKind::Capture(*i),
            Self::Field {
                object,
                index,
                through_pointer,
            } => ExprKind::Field {
                object: object.clone(),
                index: *index,
                through_pointer: *through_pointer,
            },
            Self::Index { object, index } => ExprKind::Index {
                object: object.clone(),
                index: index.clone(),
            },
            Self::Dereference(pointer) => ExprKind::Dereference(pointer.clone()),
        };
        CompiledExpr::new(kind, ty, span)
    }

    /// The target addressed by a storage getter, if it is one.
    pub fn from_expr(expr: &CompiledExpr) -> Option<Self> {
        Some(match &expr.kind {
            ExprKind::Local(id) => Self::Local(*id),
            ExprKind::Parameter(i) => Self::Parameter(*i),
            ExprKind::Global(id) => Self::Global(*id),
            ExprKind::Capture(i) => Self::Capture(*i),
            ExprKind::Field {
                object,
                index,
                through_pointer,
            } => {
                if !*through_pointer && !object.is_lvalue() {
                    return None;
                }
                Self::Field {
                    object: object.clone(),
                    index: *index,
                    through_pointer: *through_pointer,
                }
            }
            ExprKind::Index { object, index } => Self::Index {
                object: object.clone(),
                index: index.clone(),
            },
            ExprKind::Dereference(pointer) => Self::Dereference(pointer.clone()),
            _ => return None,
        })
    }
}

/// Label reference: in the current frame or top-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelRef {
    Local(u32),
    Global(u32),
}

/// Machine register pseudo-identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Instruction pointer
    Ip,
    /// Stack pointer
    Sp,
    /// Base pointer
    Bp,
}

impl Register {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "IP" => Some(Self::Ip),
            "SP" => Some(Self::Sp),
            "BP" => Some(Self::Bp),
            _ => None,
        }
    }
}

/// Where a string literal's buffer lives.
#[derive(Debug, Clone, PartialEq)]
pub enum StringAllocation {
    /// A character array value.
    Stack,
    /// A heap buffer obtained from the `alloc` builtin.
    Heap { allocator: FunctionId },
}

/// Runs after a call returns for arguments passed to `temp` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Cleanup {
    pub destructor: Option<FunctionId>,
    pub deallocator: Option<FunctionId>,
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledArgument {
    pub value: CompiledExpr,
    /// `ref` parameter: the callee receives the storage address.
    pub by_reference: bool,
    pub cleanup: Option<Cleanup>,
}

impl CompiledArgument {
    pub fn value(value: CompiledExpr) -> Self {
        Self {
            value,
            by_reference: false,
            cleanup: None,
        }
    }
}

/// An expression producing a value.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    pub kind: ExprKind,
    pub ty: GeneralType,
    /// Whether the produced value is consumed.
    pub save_value: bool,
    pub span: Span,
}

impl CompiledExpr {
    pub fn new(kind: ExprKind, ty: GeneralType, span: Span) -> Self {
        Self {
            kind,
            ty,
            save_value: true,
            span,
        }
    }

    pub fn literal(value: CompiledValue, ty: GeneralType, span: Span) -> Self {
        Self::new(ExprKind::Literal(value), ty, span)
    }

    pub fn as_literal(&self) -> Option<CompiledValue> {
        match self.kind {
            ExprKind::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Storage that can be assigned or passed by reference.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Local(_)
            | ExprKind::Parameter(_)
            | ExprKind::Global(_)
            | ExprKind::Capture(_)
            | ExprKind::Index { .. }
            | ExprKind::Dereference(_) => true,
            ExprKind::Field {
                object,
                through_pointer,
                ..
            } => *through_pointer || object.is_lvalue(),
            _ => false,
        }
    }

    /// Value not consumed.
    pub fn discarded(mut self) -> Self {
        self.save_value = false;
        self
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(CompiledValue),
    /// String literal without the terminating null.
    String {
        value: String,
        allocation: StringAllocation,
    },
    Local(VariableId),
    Parameter(u32),
    Global(GlobalId),
    /// Captured variable of the enclosing lambda frame.
    Capture(u32),
    Register(Register),
    Field {
        object: Box<CompiledExpr>,
        index: u32,
        through_pointer: bool,
    },
    /// Builtin indexing of an array or a pointer to an array.
    Index {
        object: Box<CompiledExpr>,
        index: Box<CompiledExpr>,
    },
    AddressOf(Box<CompiledExpr>),
    Dereference(Box<CompiledExpr>),
    Call {
        function: FunctionId,
        arguments: Vec<CompiledArgument>,
    },
    /// Call through a function-typed value.
    IndirectCall {
        callee: Box<CompiledExpr>,
        arguments: Vec<CompiledArgument>,
    },
    FunctionAddress(FunctionId),
    LabelAddress(LabelRef),
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    /// `-`, `!` and `~`.
    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpr>,
    },
    /// Conversion to the node's type.
    Cast(Box<CompiledExpr>),
    SizeOf {
        of: GeneralType,
        size: u32,
    },
    /// Uninitialized heap storage from `allocator`; typed as a pointer.
    NewInstance {
        allocator: FunctionId,
        size: u32,
    },
    /// Uninitialized stack storage of the node's type.
    StackInstance,
    /// Runs `constructor` on the object's address and yields the object.
    Construct {
        constructor: Option<FunctionId>,
        object: Box<CompiledExpr>,
        arguments: Vec<CompiledArgument>,
    },
    /// Closure value: the lambda function plus its captured values.
    Lambda {
        function: FunctionId,
        captures: Vec<CompiledExpr>,
    },
}

impl fmt::Display for LabelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(i) => write!(f, "label#{i}"),
            Self::Global(i) => write!(f, "global-label#{i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: u32) -> CompiledExpr {
        CompiledExpr::new(ExprKind::Local(VariableId(id)), GeneralType::I32, Span::default())
    }

    #[test]
    fn lvalues() {
        assert!(local(0).is_lvalue());
        let literal =
            CompiledExpr::literal(CompiledValue::I32(1), GeneralType::I32, Span::default());
        assert!(!literal.is_lvalue());

        let field_of_call = CompiledExpr::new(
            ExprKind::Field {
                object: CompiledExpr::new(
                    ExprKind::Call {
                        function: FunctionId(0),
                        arguments: vec![],
                    },
                    GeneralType::I32,
                    Span::default(),
                )
                .boxed(),
                index: 0,
                through_pointer: false,
            },
            GeneralType::I32,
            Span::default(),
        );
        assert!(!field_of_call.is_lvalue());
        assert!(AssignTarget::from_expr(&field_of_call).is_none());
    }

    #[test]
    fn assign_target_round_trips_storage() {
        let target = AssignTarget::from_expr(&local(3)).unwrap();
        assert_eq!(target, AssignTarget::Local(VariableId(3)));
        assert_eq!(target.as_expr(GeneralType::I32, Span::default()), local(3));
    }
}
