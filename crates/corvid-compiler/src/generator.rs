//! Generator lowering.
//!
//! A `#generator` struct template `G<T>` is rewritten into
//!
//! ```text
//! struct G<T> { any* state; fn(any*, T*) -> u8 function; }
//! G(G<T>* this, any* state, fn(any*, T*) -> u8 function)   // stores both
//! u8 next(G<T> this, T* out) { return this.function(this.state, out); }
//! ```
//!
//! A function returning `G<T>` whose body contains `yield` is split into a
//! resumable body function and a setup body:
//!
//! ```text
//! struct f$state { any* resume; <parameters>; <locals>; }
//!
//! u8 f$body(any* state, T* out) {
//!     if (state.resume != 0) goto state.resume;
//!     ...                        // yield v => *out = v; resume = &L; return 1; L:
//!     return 0;
//! }
//!
//! G<T> f(<parameters>) {
//!     f$state* s = alloc(sizeof(f$state));
//!     s.resume = 0; s.<parameters> = <parameters>;
//!     return G<T>(s, &f$body);
//! }
//! ```

use corvid_core::{CompilationError, CompiledValue, Span};
use corvid_syntax::{Block, ParamModifiers, Stmt, StructDecl, StructMember, find_attribute};
use tracing::debug;

use crate::context::CompilationContext;
use crate::decls::{
    Binding, BodyState, BuiltinFunction, CompiledFunction, CompiledStruct, Field, FunctionBody,
    Parameter, Synthesized, ThisForm,
};
use crate::expr::allocator;
use crate::ir::{
    AssignTarget, CompiledArgument, CompiledBlock, CompiledExpr, CompiledStatement, ExprKind,
    LabelRef,
};
use crate::overload::{FunctionQuery, QueryArgument, find_function};
use crate::registry::{CallableKind, FunctionId, StructId};
use crate::scope::{Frame, FrameKind, FrameParameter, GeneratorContext, LocalVariable, VariableId};
use crate::stmt::StmtCompiler;
use crate::types::{GeneralType, size_of};

type Result<T> = std::result::Result<T, CompilationError>;

/// Field of a generator struct holding the state object.
const STATE_FIELD: u32 = 0;
/// Field of a generator struct holding the body function.
const FUNCTION_FIELD: u32 = 1;

fn invalid(message: impl Into<String>, span: Span) -> CompilationError {
    CompilationError::InvalidGenerator {
        message: message.into(),
        span,
    }
}

/// `fn(any*, T*) -> u8`
pub fn body_function_type(element: GeneralType) -> GeneralType {
    GeneralType::function(
        GeneralType::U8,
        vec![GeneralType::any_pointer(), GeneralType::pointer_to(element)],
        false,
    )
}

// ==========================================================================
// Generator structs
// ==========================================================================

/// Validate a `#generator` struct and replace its fields by the generator
/// shape.
pub fn prepare_generator_struct(ctx: &mut CompilationContext<'_>, id: StructId) -> Result<()> {
    let structure = ctx.decls.structure(id);
    let Some(decl) = structure.syntax else {
        return Err(CompilationError::internal("generator struct without syntax"));
    };
    validate(decl)?;
    let element = GeneralType::Generic(structure.template_params[0].clone());
    let span = decl.span;
    ctx.decls.structure_mut(id).fields = Some(vec![
        Field::new("state", GeneralType::any_pointer(), span),
        Field::new("function", body_function_type(element), span),
    ]);
    Ok(())
}

fn validate(decl: &StructDecl<'_>) -> Result<()> {
    let span = decl.span;
    let [param] = decl.template_params else {
        return Err(invalid("a generator takes exactly one template parameter", span));
    };
    let mut next = None;
    for member in decl.members {
        match member {
            StructMember::Field(f) => {
                return Err(invalid("a generator cannot declare fields", f.span));
            }
            StructMember::Constructor(f) => {
                return Err(invalid("a generator cannot declare constructors", f.span));
            }
            StructMember::General(kind, f) => {
                let message = format!("a generator cannot declare a {}", kind.name());
                return Err(invalid(message, f.span));
            }
            StructMember::Method(f) => {
                if next.replace(f).is_some() {
                    return Err(invalid("a generator declares exactly one method", f.span));
                }
            }
        }
    }
    let Some(next) = next else {
        return Err(invalid("missing #builtin(\"next\") method", span));
    };
    let is_next =
        find_attribute(next.attributes, "builtin").and_then(|a| a.string_arg()) == Some("next");
    if !is_next {
        return Err(invalid("the method must be #builtin(\"next\")", next.span));
    }
    if next.body.is_some() {
        return Err(invalid("'next' cannot have a body", next.span));
    }
    if next.return_type.simple_name() != Some("u8") {
        return Err(invalid("'next' must return u8", next.return_type.span()));
    }
    let takes_element_pointer = match next.params {
        [out] => {
            matches!(
                out.ty,
                corvid_syntax::TypeExpr::Pointer { to, .. } if to.simple_name() == Some(param.name)
            ) && out.modifiers.is_empty()
        }
        _ => false,
    };
    if !takes_element_pointer {
        let message = format!("'next' must take a single '{}*' parameter", param.name);
        return Err(invalid(message, next.span));
    }
    Ok(())
}

/// Synthesize the constructor and the `next` bodies of a registered
/// generator struct.
pub fn finish_generator_struct(ctx: &mut CompilationContext<'_>, id: StructId) {
    let structure = ctx.decls.structure(id);
    let name = structure.name.clone();
    let file = structure.file;
    let span = structure.span;
    let template_params = structure.template_params.clone();
    let element = GeneralType::Generic(template_params[0].clone());
    let self_type = GeneralType::structure(id, vec![element.clone()]);

    let mut constructor = CompiledFunction::new(
        CallableKind::Constructor,
        name.clone(),
        file,
        span,
        GeneralType::VOID,
    );
    constructor.params = vec![
        Parameter::new("this", GeneralType::pointer_to(self_type), span)
            .with_modifiers(ParamModifiers::THIS),
        Parameter::new("state", GeneralType::any_pointer(), span),
        Parameter::new("function", body_function_type(element), span),
    ];
    constructor.template_params = template_params;
    constructor.owner = Some(id);
    constructor.this_form = Some(ThisForm::Pointer);
    constructor.synthesized = Some(Synthesized::GeneratorConstructor);
    if ctx.decls.add_function(constructor).is_err() {
        ctx.report(CompilationError::DuplicateDefinition { name, span });
        return;
    }

    let next_methods: Vec<FunctionId> = ctx
        .decls
        .functions()
        .filter(|(_, f)| {
            f.owner == Some(id) && f.binding == Binding::Builtin(BuiltinFunction::Next)
        })
        .map(|(fid, _)| fid)
        .collect();
    for fid in next_methods {
        let method = ctx.decls.function_mut(fid);
        method.binding = Binding::Source;
        method.synthesized = Some(Synthesized::GeneratorNext);
    }
    debug!(generator = %ctx.decls.structure(id).name, "generator struct synthesized");
}

/// Body of a generator constructor instance: store state and function.
pub fn constructor_body(ctx: &CompilationContext<'_>, id: FunctionId) -> Result<FunctionBody> {
    let function = ctx.decls.function(id);
    let [this, state, body_fn] = function.params.as_slice() else {
        return Err(CompilationError::internal("generator constructor shape"));
    };
    let span = function.span;
    let this_expr = CompiledExpr::new(ExprKind::Parameter(0), this.ty.clone(), span);
    let store = |index: u32, param: u32, ty: &GeneralType| CompiledStatement::Assignment {
        target: AssignTarget::Field {
            object: this_expr.clone().boxed(),
            index,
            through_pointer: true,
        },
        value: CompiledExpr::new(ExprKind::Parameter(param), ty.clone(), span),
        span,
    };
    let block = CompiledBlock::new(
        vec![store(STATE_FIELD, 1, &state.ty), store(FUNCTION_FIELD, 2, &body_fn.ty)],
        span,
    );
    Ok(FunctionBody {
        block,
        ..FunctionBody::default()
    })
}

/// Body of a `next` instance: forward to the stored body function.
pub fn next_body(ctx: &CompilationContext<'_>, id: FunctionId) -> Result<FunctionBody> {
    let function = ctx.decls.function(id);
    let span = function.span;
    let (Some(this), Some(out)) = (function.params.first(), function.params.get(1)) else {
        return Err(CompilationError::internal("generator next shape"));
    };
    let Some((generator, type_args, through_pointer)) = this.ty.struct_or_pointee() else {
        return Err(CompilationError::internal("generator next receiver"));
    };
    let Some(fields) = ctx.decls.struct_fields(generator, type_args) else {
        return Err(CompilationError::internal("generator fields missing"));
    };
    let this_expr = CompiledExpr::new(ExprKind::Parameter(0), this.ty.clone(), span);
    let field = |index: u32| {
        CompiledExpr::new(
            ExprKind::Field {
                object: this_expr.clone().boxed(),
                index,
                through_pointer,
            },
            fields[index as usize].ty.clone(),
            span,
        )
    };
    let call = CompiledExpr::new(
        ExprKind::IndirectCall {
            callee: field(FUNCTION_FIELD).boxed(),
            arguments: vec![
                CompiledArgument::value(field(STATE_FIELD)),
                CompiledArgument::value(CompiledExpr::new(
                    ExprKind::Parameter(1),
                    out.ty.clone(),
                    span,
                )),
            ],
        },
        GeneralType::U8,
        span,
    );
    Ok(FunctionBody {
        block: CompiledBlock::new(
            vec![CompiledStatement::Return {
                value: Some(call),
                span,
            }],
            span,
        ),
        ..FunctionBody::default()
    })
}

// ==========================================================================
// Implementing functions
// ==========================================================================

/// Whether `function` returns a generator instance and yields.
pub fn is_generator_function(
    ctx: &CompilationContext<'_>,
    function: &CompiledFunction<'_>,
) -> bool {
    let returns_generator = function
        .return_type
        .as_struct()
        .is_some_and(|(id, _)| ctx.decls.structure(id).generator);
    returns_generator
        && function
            .syntax
            .and_then(|s| s.body)
            .is_some_and(|body| block_yields(&body))
}

fn block_yields(block: &Block<'_>) -> bool {
    block.stmts.iter().any(stmt_yields)
}

fn stmt_yields(stmt: &Stmt<'_>) -> bool {
    match stmt {
        Stmt::Yield(_) => true,
        Stmt::Block(b) => block_yields(b),
        Stmt::If(s) => {
            stmt_yields(&s.then_branch) || s.else_branch.as_ref().is_some_and(stmt_yields)
        }
        Stmt::While(s) => stmt_yields(&s.body),
        Stmt::For(s) => stmt_yields(&s.body),
        _ => false,
    }
}

/// Lower a generator function: build the state struct, compile the
/// resumable body function and return the setup body of `id`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_generator_function(
    ctx: &mut CompilationContext<'_>,
    id: FunctionId,
) -> Result<FunctionBody> {
    let function = ctx.decls.function(id).clone();
    let span = function.span;
    let Some(source) = function.syntax.and_then(|s| s.body) else {
        return Err(CompilationError::internal("generator function without body"));
    };
    let Some(element) = function
        .return_type
        .as_struct()
        .and_then(|(_, args)| args.first().cloned())
    else {
        return Err(invalid("generator instance has no element type", span));
    };

    let mut fields = vec![Field::new("resume", GeneralType::any_pointer(), span)];
    let mut params = Vec::with_capacity(function.params.len());
    for param in &function.params {
        params.push((param.name.clone(), param.ty.clone(), fields.len() as u32));
        fields.push(Field::new(param.name.clone(), param.ty.clone(), param.span));
    }
    let state = ctx.decls.add_struct(CompiledStruct {
        name: format!("{}$state", function.name),
        file: function.file,
        span,
        template_params: Vec::new(),
        attributes: Vec::new(),
        fields: Some(fields),
        syntax: None,
        generator: false,
        synthesized: true,
    });
    let generator = GeneratorContext {
        state,
        element: element.clone(),
        params,
    };

    let mut body_fn = CompiledFunction::new(
        CallableKind::Function,
        format!("{}$body", function.name),
        function.file,
        span,
        GeneralType::U8,
    );
    body_fn.params = vec![
        Parameter::new("$state", GeneralType::any_pointer(), span),
        Parameter::new("$out", GeneralType::pointer_to(element.clone()), span),
    ];
    body_fn.owner = function.owner;
    body_fn.synthesized = Some(Synthesized::GeneratorBody { implementing: id });
    body_fn.state = BodyState::Compiling;
    let frame_params = body_fn
        .params
        .iter()
        .map(|p| FrameParameter {
            name: p.name.clone(),
            ty: p.ty.clone(),
            modifiers: p.modifiers,
        })
        .collect();
    let body_id = ctx.decls.add_function_unchecked(body_fn);

    let mut frame = Frame::new(FrameKind::Function, Some(body_id), Some(GeneralType::U8));
    frame.params = frame_params;
    frame.bindings = function.bindings();
    frame.owner = function.owner;
    let prologue = resume_jump(ctx, &generator, span);
    frame.generator = Some(generator);
    let (block, frame) = ctx.in_frame(frame, |ctx| StmtCompiler::new(ctx).compile_block(&source));
    let body = CompiledBlock::new(
        vec![prologue, CompiledStatement::Block(block), return_status(0, span)],
        span,
    );
    let location = ctx.location(span);
    let compiled = ctx.decls.function_mut(body_id);
    compiled.body = Some(FunctionBody {
        block: body,
        locals: frame.locals,
        labels: frame.labels,
        captures: frame.captures,
    });
    compiled.state = BodyState::Compiled;
    compiled.references.push(location);
    debug!(function = %function.name, state = ?state, "generator body lowered");

    setup_body(ctx, &function, state, body_id, element)
}

/// `if (state.resume != 0) goto state.resume;`
fn resume_jump(
    ctx: &CompilationContext<'_>,
    generator: &GeneratorContext,
    span: Span,
) -> CompiledStatement {
    let resume = state_field(
        generator,
        GeneratorContext::RESUME_FIELD,
        GeneralType::any_pointer(),
        span,
    );
    let pointer_integer = ctx.settings.pointer_integer();
    let zero = CompiledExpr::literal(
        CompiledValue::from_bool(false, pointer_integer),
        GeneralType::Builtin(pointer_integer),
        span,
    );
    let condition = CompiledExpr::new(
        ExprKind::Binary {
            op: corvid_syntax::BinaryOp::NotEqual,
            left: resume.clone().boxed(),
            right: zero.boxed(),
        },
        GeneralType::Builtin(ctx.settings.boolean_type),
        span,
    );
    CompiledStatement::If {
        condition,
        then_branch: CompiledBlock::new(
            vec![CompiledStatement::Goto {
                target: resume,
                span,
            }],
            span,
        ),
        else_branch: None,
        span,
    }
}

fn return_status(status: u8, span: Span) -> CompiledStatement {
    CompiledStatement::Return {
        value: Some(CompiledExpr::literal(CompiledValue::U8(status), GeneralType::U8, span)),
        span,
    }
}

/// Allocate and fill the state object, then construct the generator.
fn setup_body(
    ctx: &mut CompilationContext<'_>,
    function: &CompiledFunction<'_>,
    state: StructId,
    body: FunctionId,
    element: GeneralType,
) -> Result<FunctionBody> {
    let span = function.span;
    let state_type = GeneralType::structure(state, Vec::new());
    let state_pointer = GeneralType::pointer_to(state_type.clone());
    let size = size_of(&state_type, &ctx.decls, &ctx.settings)
        .map_err(|e| invalid(e.to_string(), span))?;
    let alloc = allocator(ctx, size, span)?;

    let local = CompiledExpr::new(ExprKind::Local(VariableId(0)), state_pointer.clone(), span);
    let store = |index: u32, value: CompiledExpr| CompiledStatement::Assignment {
        target: AssignTarget::Field {
            object: local.clone().boxed(),
            index,
            through_pointer: true,
        },
        value,
        span,
    };

    let mut stmts = vec![CompiledStatement::VariableDeclaration {
        variable: VariableId(0),
        value: Some(CompiledExpr::new(
            ExprKind::NewInstance { allocator: alloc, size },
            state_pointer.clone(),
            span,
        )),
        span,
    }];
    let null = CompiledExpr::new(
        ExprKind::Cast(
            CompiledExpr::literal(
                CompiledValue::from_bool(false, ctx.settings.pointer_integer()),
                GeneralType::Builtin(ctx.settings.pointer_integer()),
                span,
            )
            .boxed(),
        ),
        GeneralType::any_pointer(),
        span,
    );
    stmts.push(store(GeneratorContext::RESUME_FIELD, null));
    for (i, param) in function.params.iter().enumerate() {
        let value = CompiledExpr::new(ExprKind::Parameter(i as u32), param.ty.clone(), span);
        stmts.push(store(i as u32 + 1, value));
    }

    let generator_type = function.return_type.clone();
    let any_pointer = GeneralType::any_pointer();
    let fn_type = body_function_type(element);
    let Some((generator, _)) = generator_type.as_struct() else {
        return Err(CompilationError::internal("generator return type"));
    };
    let generator_name = ctx.decls.structure(generator).name.clone();
    let query_args = [
        QueryArgument::This(&generator_type),
        QueryArgument::Type(&any_pointer),
        QueryArgument::Type(&fn_type),
    ];
    let query = FunctionQuery::new(
        CallableKind::Constructor,
        &generator_name,
        function.file,
        &query_args,
    );
    let constructor = find_function(ctx, &query, span)?.function;
    let location = ctx.location(span);
    ctx.decls.function_mut(constructor).references.push(location);

    let construct = CompiledExpr::new(
        ExprKind::Construct {
            constructor: Some(constructor),
            object: CompiledExpr::new(ExprKind::StackInstance, generator_type.clone(), span)
                .boxed(),
            arguments: vec![
                CompiledArgument::value(CompiledExpr::new(
                    ExprKind::Cast(local.clone().boxed()),
                    any_pointer,
                    span,
                )),
                CompiledArgument::value(CompiledExpr::new(
                    ExprKind::FunctionAddress(body),
                    fn_type,
                    span,
                )),
            ],
        },
        generator_type,
        span,
    );
    stmts.push(CompiledStatement::Return {
        value: Some(construct),
        span,
    });

    Ok(FunctionBody {
        block: CompiledBlock::new(stmts, span),
        locals: vec![LocalVariable {
            name: "$state".into(),
            ty: state_pointer,
            span,
            temp: false,
            state_field: None,
        }],
        labels: Vec::new(),
        captures: Vec::new(),
    })
}

// ==========================================================================
// Helpers for lowering inside a generator body
// ==========================================================================

/// The state object, typed as a pointer to the state struct.
pub fn state_pointer(generator: &GeneratorContext, span: Span) -> CompiledExpr {
    let raw = CompiledExpr::new(
        ExprKind::Parameter(GeneratorContext::STATE_PARAM),
        GeneralType::any_pointer(),
        span,
    );
    CompiledExpr::new(
        ExprKind::Cast(raw.boxed()),
        GeneralType::pointer_to(generator.state_type()),
        span,
    )
}

pub fn state_field(
    generator: &GeneratorContext,
    index: u32,
    ty: GeneralType,
    span: Span,
) -> CompiledExpr {
    CompiledExpr::new(
        ExprKind::Field {
            object: state_pointer(generator, span).boxed(),
            index,
            through_pointer: true,
        },
        ty,
        span,
    )
}

/// Storage read of a local of `frame`, following generator state fields.
pub fn local_expr(frame: &Frame, id: VariableId, span: Span) -> CompiledExpr {
    let variable = frame.variable(id);
    match (&frame.generator, variable.state_field) {
        (Some(generator), Some(field)) => state_field(generator, field, variable.ty.clone(), span),
        _ => CompiledExpr::new(ExprKind::Local(id), variable.ty.clone(), span),
    }
}

/// Append a field for a generator local to the state struct.
pub fn add_state_local(
    ctx: &mut CompilationContext<'_>,
    name: &str,
    ty: &GeneralType,
    span: Span,
) -> Option<u32> {
    let state = ctx.frame()?.generator.as_ref()?.state;
    let fields = ctx.decls.structure_mut(state).fields.get_or_insert_with(Vec::new);
    let index = fields.len() as u32;
    fields.push(Field::new(format!("{name}#{index}"), ty.clone(), span));
    Some(index)
}

/// `yield v;`: store, remember the resume point, report an element.
pub fn lower_yield(
    ctx: &mut CompilationContext<'_>,
    value: CompiledExpr,
    span: Span,
) -> Result<Vec<CompiledStatement>> {
    let Some(frame) = ctx.frame_mut() else {
        return Err(invalid("yield outside of a generator", span));
    };
    let Some(generator) = frame.generator.clone() else {
        return Err(invalid("yield outside of a generator", span));
    };
    let label = frame.add_label("$resume", span);
    let out = CompiledExpr::new(
        ExprKind::Parameter(GeneratorContext::OUT_PARAM),
        GeneralType::pointer_to(generator.element.clone()),
        span,
    );
    Ok(vec![
        CompiledStatement::Assignment {
            target: AssignTarget::Dereference(out.boxed()),
            value,
            span,
        },
        CompiledStatement::Assignment {
            target: AssignTarget::Field {
                object: state_pointer(&generator, span).boxed(),
                index: GeneratorContext::RESUME_FIELD,
                through_pointer: true,
            },
            value: CompiledExpr::new(
                ExprKind::LabelAddress(LabelRef::Local(label)),
                GeneralType::any_pointer(),
                span,
            ),
            span,
        },
        return_status(1, span),
        CompiledStatement::Label {
            label: LabelRef::Local(label),
            span,
        },
    ])
}

/// `return;` inside a generator body reports exhaustion.
pub fn lower_return(span: Span) -> CompiledStatement {
    return_status(0, span)
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::FileId;
    use corvid_syntax::AstBuilder;

    use super::*;

    #[test]
    fn validation_rejects_fields() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let next = b.with_attributes(
            b.prototype(b.ty("u8"), "next", &[b.param(b.pointer(b.ty("T")), "out")]),
            &[b.attribute_str("builtin", "next")],
        );
        let ok = b.generic_structure("Gen", &["T"], &[], &[StructMember::Method(next)]);
        assert!(validate(&ok).is_ok());

        let with_field = b.generic_structure(
            "Gen",
            &["T"],
            &[],
            &[StructMember::Method(next), b.field_decl(b.ty("i32"), "x")],
        );
        assert!(matches!(validate(&with_field), Err(CompilationError::InvalidGenerator { .. })));
    }

    #[test]
    fn validation_checks_next_signature() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let wrong_return = b.with_attributes(
            b.prototype(b.ty("i32"), "next", &[b.param(b.pointer(b.ty("T")), "out")]),
            &[b.attribute_str("builtin", "next")],
        );
        let decl = b.generic_structure("Gen", &["T"], &[], &[StructMember::Method(wrong_return)]);
        assert!(validate(&decl).is_err());

        let two_params = b.generic_structure("Gen", &["T", "U"], &[], &[]);
        assert!(validate(&two_params).is_err());
    }
}
