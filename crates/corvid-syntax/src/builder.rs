//! Programmatic AST construction.
//!
//! The compiler consumes trees produced by an external parser. Hosts that
//! generate code, and the test suites, build trees directly with
//! [`AstBuilder`]. Every node receives a distinct span so diagnostics stay
//! distinguishable.

use std::cell::Cell;

use bumpalo::Bump;
use corvid_core::{FileId, Span};

use crate::ast::*;

/// Arena-backed AST constructor for one file.
pub struct AstBuilder<'ast> {
    arena: &'ast Bump,
    file: FileId,
    line: Cell<u32>,
}

impl<'ast> AstBuilder<'ast> {
    pub fn new(arena: &'ast Bump, file: FileId) -> Self {
        Self {
            arena,
            file,
            line: Cell::new(0),
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file
    }

    /// A fresh span on the next line.
    pub fn span(&self) -> Span {
        let line = self.line.get() + 1;
        self.line.set(line);
        Span::new(line, 1, 1)
    }

    pub fn alloc<T>(&self, value: T) -> &'ast T {
        self.arena.alloc(value)
    }

    pub fn slice<T: Copy>(&self, values: &[T]) -> &'ast [T] {
        self.arena.alloc_slice_copy(values)
    }

    pub fn str(&self, value: &str) -> &'ast str {
        self.arena.alloc_str(value)
    }

    pub fn ident(&self, name: &str) -> Ident<'ast> {
        Ident::new(self.str(name), self.span())
    }

    // ==========================================================================
    // Types
    // ==========================================================================

    /// A named type: `i32`, `Point`.
    pub fn ty(&self, name: &str) -> TypeExpr<'ast> {
        self.generic_ty(name, &[])
    }

    /// A named type with template arguments: `List<u8>`.
    pub fn generic_ty(&self, name: &str, args: &[TypeExpr<'ast>]) -> TypeExpr<'ast> {
        TypeExpr::Named {
            name: self.ident(name),
            type_args: self.slice(args),
        }
    }

    pub fn pointer(&self, to: TypeExpr<'ast>) -> TypeExpr<'ast> {
        TypeExpr::Pointer {
            to: self.alloc(to),
            span: self.span(),
        }
    }

    pub fn array(&self, of: TypeExpr<'ast>, length: Option<Expr<'ast>>) -> TypeExpr<'ast> {
        TypeExpr::Array {
            of: self.alloc(of),
            length: length.map(|l| self.alloc(l)),
            span: self.span(),
        }
    }

    pub fn fn_ty(&self, return_type: TypeExpr<'ast>, params: &[TypeExpr<'ast>]) -> TypeExpr<'ast> {
        TypeExpr::Function {
            return_type: self.alloc(return_type),
            params: self.slice(params),
            span: self.span(),
        }
    }

    pub fn inferred(&self) -> TypeExpr<'ast> {
        TypeExpr::Inferred(self.span())
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn literal(&self, kind: LiteralKind<'ast>) -> Expr<'ast> {
        Expr::Literal(self.literal_expr(kind))
    }

    pub fn literal_expr(&self, kind: LiteralKind<'ast>) -> LiteralExpr<'ast> {
        LiteralExpr {
            kind,
            span: self.span(),
        }
    }

    pub fn int(&self, value: i64) -> Expr<'ast> {
        self.literal(LiteralKind::Int(value))
    }

    pub fn float(&self, value: f32) -> Expr<'ast> {
        self.literal(LiteralKind::Float(value))
    }

    pub fn char(&self, value: char) -> Expr<'ast> {
        self.literal(LiteralKind::Char(value as u16))
    }

    pub fn boolean(&self, value: bool) -> Expr<'ast> {
        self.literal(LiteralKind::Bool(value))
    }

    pub fn string(&self, value: &str) -> Expr<'ast> {
        self.literal(LiteralKind::String(self.str(value)))
    }

    pub fn name(&self, name: &str) -> Expr<'ast> {
        self.name_with_args(name, &[])
    }

    /// An identifier with explicit template arguments: `max<i32>`.
    pub fn name_with_args(&self, name: &str, type_args: &[TypeExpr<'ast>]) -> Expr<'ast> {
        let ident = self.ident(name);
        Expr::Ident(IdentExpr {
            ident,
            type_args: self.slice(type_args),
            span: ident.span,
        })
    }

    pub fn binary(&self, left: Expr<'ast>, op: BinaryOp, right: Expr<'ast>) -> Expr<'ast> {
        Expr::Binary(self.alloc(BinaryExpr {
            left,
            op,
            right,
            span: self.span(),
        }))
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr<'ast>) -> Expr<'ast> {
        Expr::Unary(self.alloc(UnaryExpr {
            op,
            operand,
            span: self.span(),
        }))
    }

    pub fn call(&self, callee: Expr<'ast>, args: &[Expr<'ast>]) -> Expr<'ast> {
        Expr::Call(self.alloc(CallExpr {
            callee,
            args: self.slice(args),
            span: self.span(),
        }))
    }

    /// Call a function by name.
    pub fn call_named(&self, name: &str, args: &[Expr<'ast>]) -> Expr<'ast> {
        let callee = self.name(name);
        self.call(callee, args)
    }

    /// `object.method(args)`
    pub fn method_call(&self, object: Expr<'ast>, method: &str, args: &[Expr<'ast>]) -> Expr<'ast> {
        let callee = self.field(object, method);
        self.call(callee, args)
    }

    pub fn field(&self, object: Expr<'ast>, field: &str) -> Expr<'ast> {
        Expr::Field(self.alloc(FieldExpr {
            object,
            field: self.ident(field),
            span: self.span(),
        }))
    }

    pub fn index(&self, object: Expr<'ast>, index: Expr<'ast>) -> Expr<'ast> {
        Expr::Index(self.alloc(IndexExpr {
            object,
            index,
            span: self.span(),
        }))
    }

    pub fn cast(&self, expr: Expr<'ast>, target: TypeExpr<'ast>) -> Expr<'ast> {
        Expr::Cast(self.alloc(CastExpr {
            expr,
            target,
            span: self.span(),
        }))
    }

    pub fn size_of(&self, ty: TypeExpr<'ast>) -> Expr<'ast> {
        Expr::SizeOf(self.alloc(SizeOfExpr {
            ty,
            span: self.span(),
        }))
    }

    pub fn new_instance(&self, ty: TypeExpr<'ast>, args: &[Expr<'ast>]) -> Expr<'ast> {
        Expr::New(self.alloc(NewExpr {
            ty,
            args: self.slice(args),
            span: self.span(),
        }))
    }

    pub fn lambda(
        &self,
        params: &[ParamDecl<'ast>],
        return_type: Option<TypeExpr<'ast>>,
        body: &[Stmt<'ast>],
    ) -> Expr<'ast> {
        Expr::Lambda(self.alloc(LambdaExpr {
            params: self.slice(params),
            return_type,
            body: self.block(body),
            span: self.span(),
        }))
    }

    pub fn paren(&self, expr: Expr<'ast>) -> Expr<'ast> {
        Expr::Paren(self.alloc(ParenExpr {
            expr,
            span: self.span(),
        }))
    }

    pub fn address_of(&self, operand: Expr<'ast>) -> Expr<'ast> {
        self.unary(UnaryOp::AddressOf, operand)
    }

    pub fn deref(&self, operand: Expr<'ast>) -> Expr<'ast> {
        self.unary(UnaryOp::Deref, operand)
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    pub fn block(&self, stmts: &[Stmt<'ast>]) -> Block<'ast> {
        Block {
            stmts: self.slice(stmts),
            span: self.span(),
        }
    }

    pub fn block_stmt(&self, stmts: &[Stmt<'ast>]) -> Stmt<'ast> {
        Stmt::Block(self.block(stmts))
    }

    pub fn expr_stmt(&self, expr: Expr<'ast>) -> Stmt<'ast> {
        Stmt::Expr(ExprStmt {
            expr,
            span: self.span(),
        })
    }

    pub fn var_with(
        &self,
        modifiers: VarModifiers,
        ty: TypeExpr<'ast>,
        name: &str,
        init: Option<Expr<'ast>>,
    ) -> Stmt<'ast> {
        Stmt::VarDecl(self.alloc(VarDeclStmt {
            attributes: &[],
            modifiers,
            ty,
            name: self.ident(name),
            init,
            span: self.span(),
        }))
    }

    /// `T name = init;`
    pub fn var(&self, ty: TypeExpr<'ast>, name: &str, init: Option<Expr<'ast>>) -> Stmt<'ast> {
        self.var_with(VarModifiers::empty(), ty, name, init)
    }

    /// `const T name = init;`
    pub fn constant(&self, ty: TypeExpr<'ast>, name: &str, init: Expr<'ast>) -> Stmt<'ast> {
        self.var_with(VarModifiers::CONST, ty, name, Some(init))
    }

    /// A variable declaration carrying attributes, e.g. an external constant.
    pub fn var_with_attributes(
        &self,
        attributes: &[Attribute<'ast>],
        modifiers: VarModifiers,
        ty: TypeExpr<'ast>,
        name: &str,
        init: Option<Expr<'ast>>,
    ) -> Stmt<'ast> {
        Stmt::VarDecl(self.alloc(VarDeclStmt {
            attributes: self.slice(attributes),
            modifiers,
            ty,
            name: self.ident(name),
            init,
            span: self.span(),
        }))
    }

    pub fn assign(&self, target: Expr<'ast>, value: Expr<'ast>) -> Stmt<'ast> {
        self.assign_op(target, AssignOp::Assign, Some(value))
    }

    pub fn assign_op(
        &self,
        target: Expr<'ast>,
        op: AssignOp,
        value: Option<Expr<'ast>>,
    ) -> Stmt<'ast> {
        Stmt::Assign(self.alloc(AssignStmt {
            target,
            op,
            value,
            span: self.span(),
        }))
    }

    pub fn increment(&self, target: Expr<'ast>) -> Stmt<'ast> {
        self.assign_op(target, AssignOp::Increment, None)
    }

    pub fn ret(&self, value: Option<Expr<'ast>>) -> Stmt<'ast> {
        Stmt::Return(ReturnStmt {
            value,
            span: self.span(),
        })
    }

    pub fn brk(&self) -> Stmt<'ast> {
        Stmt::Break(self.span())
    }

    pub fn goto(&self, label: &str) -> Stmt<'ast> {
        Stmt::Goto(GotoStmt {
            target: self.name(label),
            span: self.span(),
        })
    }

    pub fn label(&self, name: &str) -> Stmt<'ast> {
        Stmt::Label(LabelStmt {
            name: self.ident(name),
            span: self.span(),
        })
    }

    pub fn if_stmt(
        &self,
        condition: Expr<'ast>,
        then_branch: Stmt<'ast>,
        else_branch: Option<Stmt<'ast>>,
    ) -> Stmt<'ast> {
        Stmt::If(self.alloc(IfStmt {
            condition,
            then_branch,
            else_branch,
            span: self.span(),
        }))
    }

    pub fn while_stmt(&self, condition: Expr<'ast>, body: Stmt<'ast>) -> Stmt<'ast> {
        Stmt::While(self.alloc(WhileStmt {
            condition,
            body,
            span: self.span(),
        }))
    }

    pub fn for_stmt(
        &self,
        init: Option<Stmt<'ast>>,
        condition: Option<Expr<'ast>>,
        step: Option<Stmt<'ast>>,
        body: Stmt<'ast>,
    ) -> Stmt<'ast> {
        Stmt::For(self.alloc(ForStmt {
            init,
            condition,
            step,
            body,
            span: self.span(),
        }))
    }

    pub fn yield_stmt(&self, value: Expr<'ast>) -> Stmt<'ast> {
        Stmt::Yield(YieldStmt {
            value,
            span: self.span(),
        })
    }

    pub fn delete(&self, value: Expr<'ast>) -> Stmt<'ast> {
        Stmt::Delete(DeleteStmt {
            value,
            span: self.span(),
        })
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    pub fn attribute(&self, name: &str, args: &[LiteralKind<'ast>]) -> Attribute<'ast> {
        let args: Vec<_> = args.iter().map(|kind| self.literal_expr(*kind)).collect();
        Attribute {
            name: self.ident(name),
            args: self.slice(&args),
            span: self.span(),
        }
    }

    /// `#name("value")`
    pub fn attribute_str(&self, name: &str, value: &str) -> Attribute<'ast> {
        self.attribute(name, &[LiteralKind::String(self.str(value))])
    }

    pub fn param(&self, ty: TypeExpr<'ast>, name: &str) -> ParamDecl<'ast> {
        self.param_with(ParamModifiers::empty(), ty, name, None)
    }

    pub fn param_with(
        &self,
        modifiers: ParamModifiers,
        ty: TypeExpr<'ast>,
        name: &str,
        default: Option<Expr<'ast>>,
    ) -> ParamDecl<'ast> {
        ParamDecl {
            modifiers,
            ty,
            name: self.ident(name),
            default,
            span: self.span(),
        }
    }

    /// A function declaration with a body.
    pub fn function(
        &self,
        return_type: TypeExpr<'ast>,
        name: &str,
        params: &[ParamDecl<'ast>],
        body: &[Stmt<'ast>],
    ) -> FunctionDecl<'ast> {
        FunctionDecl {
            body: Some(self.block(body)),
            ..self.prototype(return_type, name, params)
        }
    }

    /// A function declaration without a body.
    pub fn prototype(
        &self,
        return_type: TypeExpr<'ast>,
        name: &str,
        params: &[ParamDecl<'ast>],
    ) -> FunctionDecl<'ast> {
        FunctionDecl {
            attributes: &[],
            private: false,
            return_type,
            name: self.ident(name),
            template_params: &[],
            params: self.slice(params),
            body: None,
            span: self.span(),
        }
    }

    /// Attach attributes to a function declaration.
    pub fn with_attributes(
        &self,
        decl: FunctionDecl<'ast>,
        attributes: &[Attribute<'ast>],
    ) -> FunctionDecl<'ast> {
        FunctionDecl {
            attributes: self.slice(attributes),
            ..decl
        }
    }

    /// Turn a function declaration into a template over `params`.
    pub fn with_template(&self, decl: FunctionDecl<'ast>, params: &[&str]) -> FunctionDecl<'ast> {
        let params: Vec<_> = params.iter().map(|p| self.ident(p)).collect();
        FunctionDecl {
            template_params: self.slice(&params),
            ..decl
        }
    }

    pub fn field_decl(&self, ty: TypeExpr<'ast>, name: &str) -> StructMember<'ast> {
        StructMember::Field(FieldDecl {
            private: false,
            ty,
            name: self.ident(name),
            span: self.span(),
        })
    }

    pub fn structure(&self, name: &str, members: &[StructMember<'ast>]) -> StructDecl<'ast> {
        StructDecl {
            attributes: &[],
            name: self.ident(name),
            template_params: &[],
            members: self.slice(members),
            span: self.span(),
        }
    }

    pub fn generic_structure(
        &self,
        name: &str,
        template_params: &[&str],
        attributes: &[Attribute<'ast>],
        members: &[StructMember<'ast>],
    ) -> StructDecl<'ast> {
        let params: Vec<_> = template_params.iter().map(|p| self.ident(p)).collect();
        StructDecl {
            attributes: self.slice(attributes),
            name: self.ident(name),
            template_params: self.slice(&params),
            members: self.slice(members),
            span: self.span(),
        }
    }

    pub fn alias(
        &self,
        name: &str,
        target: TypeExpr<'ast>,
        attributes: &[Attribute<'ast>],
    ) -> AliasDecl<'ast> {
        AliasDecl {
            attributes: self.slice(attributes),
            name: self.ident(name),
            target,
            span: self.span(),
        }
    }

    // ==========================================================================
    // Items
    // ==========================================================================

    pub fn fn_item(&self, decl: FunctionDecl<'ast>) -> Item<'ast> {
        Item::Function(self.alloc(decl))
    }

    pub fn operator_item(&self, decl: FunctionDecl<'ast>) -> Item<'ast> {
        Item::Operator(self.alloc(decl))
    }

    pub fn struct_item(&self, decl: StructDecl<'ast>) -> Item<'ast> {
        Item::Struct(self.alloc(decl))
    }

    pub fn alias_item(&self, decl: AliasDecl<'ast>) -> Item<'ast> {
        Item::Alias(self.alloc(decl))
    }

    pub fn stmt_item(&self, stmt: Stmt<'ast>) -> Item<'ast> {
        Item::Statement(self.alloc(stmt))
    }

    pub fn file(&self, path: &str, items: &[Item<'ast>]) -> ParsedFile<'ast> {
        ParsedFile {
            file: self.file,
            path: self.str(path),
            items: self.slice(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_distinct() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let first = b.int(1);
        let second = b.int(2);
        assert_ne!(first.span(), second.span());
    }

    #[test]
    fn builds_function_items() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(3));
        let body = [b.ret(Some(b.binary(b.name("a"), BinaryOp::Add, b.int(1))))];
        let decl = b.function(b.ty("i32"), "inc", &[b.param(b.ty("i32"), "a")], &body);
        let file = b.file("main.cv", &[b.fn_item(decl)]);

        assert_eq!(file.file, FileId(3));
        match file.items[0] {
            Item::Function(f) => {
                assert_eq!(f.name.name, "inc");
                assert_eq!(f.params.len(), 1);
                assert_eq!(f.body.map(|b| b.stmts.len()), Some(1));
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn attribute_string_argument() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let attr = b.attribute_str("external", "puts");
        assert_eq!(attr.string_arg(), Some("puts"));
        assert!(find_attribute(&[attr], "external").is_some());
    }
}
