//! Whole-program scenarios
//!
//! Each test builds a small program with [`AstBuilder`], runs the full
//! pipeline through [`corvid::compile`] and inspects the declarations,
//! bodies and diagnostics it produced.

use corvid::syntax::{BinaryOp, StructMember};
use corvid::types::{can_cast_explicitly, can_cast_implicitly, size_of};
use corvid::{
    AstBuilder, Bump, CompiledStatement, CompiledValue, CompilerInputs, CompilerResult,
    CompilerSettings, Declarations, ExprKind, FileId, GeneralType, ParsedFile, Severity, compile,
};

fn constant(result: &CompilerResult<'_>, name: &str) -> Option<CompiledValue> {
    result.constants().iter().find(|c| c.name == name).map(|c| c.value)
}

fn exported<'a>(
    b: &AstBuilder<'a>,
    decl: corvid::syntax::FunctionDecl<'a>,
) -> corvid::syntax::Item<'a> {
    b.fn_item(b.with_attributes(decl, &[b.attribute("export", &[])]))
}

// ==========================================================================
// Constant folding and evaluation
// ==========================================================================

#[test]
fn test_constant_expressions_fold() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let value = b.binary(b.int(2), BinaryOp::Add, b.binary(b.int(3), BinaryOp::Mul, b.int(4)));
    let files = [b.file("main.cv", &[b.stmt_item(b.constant(b.ty("i32"), "X", value))])];

    let result = compile(&files, &CompilerInputs::default());
    assert!(result.is_success());
    assert_eq!(constant(&result, "X"), Some(CompiledValue::I32(14)));
    assert!(result.top_level().stmts.is_empty());
}

#[test]
fn test_logical_or_short_circuits() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let division = b.paren(b.binary(b.int(1), BinaryOp::Div, b.int(0)));
    let value = b.binary(b.boolean(true), BinaryOp::LogicalOr, division);
    let files = [b.file("main.cv", &[b.stmt_item(b.constant(b.ty("u8"), "B", value))])];

    let result = compile(&files, &CompilerInputs::default());
    assert_eq!(result.diagnostics.count(Severity::Critical), 0);
    assert_eq!(constant(&result, "B"), Some(CompiledValue::U8(1)));
}

#[test]
fn test_calls_on_literals_are_evaluated() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let body = [
        b.var(b.ty("i32"), "total", Some(b.int(0))),
        b.for_stmt(
            Some(b.var(b.ty("i32"), "i", Some(b.int(1)))),
            Some(b.binary(b.name("i"), BinaryOp::LessEqual, b.name("n"))),
            Some(b.increment(b.name("i"))),
            b.block_stmt(&[b.assign(
                b.name("total"),
                b.binary(b.name("total"), BinaryOp::Add, b.name("i")),
            )]),
        ),
        b.ret(Some(b.name("total"))),
    ];
    let sum = b.function(b.ty("i32"), "sum", &[b.param(b.ty("i32"), "n")], &body);
    let files = [b.file(
        "main.cv",
        &[
            b.fn_item(sum),
            b.stmt_item(b.constant(b.ty("i32"), "TOTAL", b.call_named("sum", &[b.int(10)]))),
        ],
    )];

    let result = compile(&files, &CompilerInputs::default());
    assert!(result.is_success());
    assert_eq!(constant(&result, "TOTAL"), Some(CompiledValue::I32(55)));
    assert_eq!(result.diagnostics.count(Severity::OptimizationNotice), 1);
}

// ==========================================================================
// Inlining
// ==========================================================================

fn caller_of<'a>(
    b: &AstBuilder<'a>,
    callee: &str,
    operand: corvid::syntax::Expr<'a>,
) -> ParsedFile<'a> {
    let callee_decl = b.function(
        b.ty("i32"),
        callee,
        &[b.param(b.ty("i32"), "a")],
        &[b.ret(Some(b.binary(b.name("a"), BinaryOp::Mul, operand)))],
    );
    let main = b.function(
        b.ty("i32"),
        "main",
        &[b.param(b.ty("i32"), "v")],
        &[b.ret(Some(b.call_named(callee, &[b.name("v")])))],
    );
    b.file("main.cv", &[b.fn_item(callee_decl), exported(b, main)])
}

#[test]
fn test_single_use_argument_is_inlined() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let files = [caller_of(&b, "double", b.int(2))];

    let result = compile(&files, &CompilerInputs::default());
    assert!(result.is_success());
    assert_eq!(result.diagnostics.count(Severity::OptimizationNotice), 1);

    let body = result.body_of("main").expect("main is compiled");
    match body.block.stmts.as_slice() {
        [CompiledStatement::Return { value: Some(value), .. }] => {
            assert!(matches!(value.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("unexpected body {other:?}"),
    }
}

#[test]
fn test_duplicated_volatile_argument_blocks_inlining() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let files = [caller_of(&b, "square", b.name("a"))];

    let result = compile(&files, &CompilerInputs::default());
    assert!(result.is_success());
    assert_eq!(result.diagnostics.count(Severity::OptimizationNotice), 0);
    assert_eq!(result.diagnostics.count(Severity::FailedOptimization), 1);

    let body = result.body_of("main").expect("main is compiled");
    let [CompiledStatement::Return { value: Some(value), .. }] = body.block.stmts.as_slice() else {
        panic!("unexpected body {:?}", body.block.stmts);
    };
    assert!(matches!(value.kind, ExprKind::Call { .. }));
}

#[test]
fn test_unoptimized_settings_keep_calls() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let files = [caller_of(&b, "double", b.int(2))];

    let result = compile(&files, &CompilerInputs::new(CompilerSettings::unoptimized()));
    assert!(result.is_success());
    assert_eq!(result.diagnostics.count(Severity::OptimizationNotice), 0);
    assert_eq!(result.bodies().count(), 2);
}

// ==========================================================================
// Declarations and diagnostics
// ==========================================================================

#[test]
fn test_struct_size_has_no_padding() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let packed = b.structure(
        "Packed",
        &[
            b.field_decl(b.ty("u8"), "a"),
            b.field_decl(b.ty("i16"), "b"),
            b.field_decl(b.ty("i32"), "c"),
        ],
    );
    let files = [b.file(
        "main.cv",
        &[
            b.struct_item(packed),
            b.stmt_item(b.constant(b.ty("i32"), "SIZE", b.size_of(b.ty("Packed")))),
        ],
    )];

    let result = compile(&files, &CompilerInputs::default());
    assert!(result.is_success());
    assert_eq!(constant(&result, "SIZE"), Some(CompiledValue::I32(7)));

    let (id, _) = result.structs().find(|(_, s)| s.name == "Packed").expect("struct is registered");
    let ty = GeneralType::structure(id, Vec::new());
    assert_eq!(size_of(&ty, result.declarations(), &CompilerSettings::default()).ok(), Some(7));
}

#[test]
fn test_duplicate_signature_is_one_critical() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let first = b.prototype(b.ty("void"), "f", &[b.param(b.ty("i32"), "x")]);
    let second = b.prototype(b.ty("void"), "f", &[b.param(b.ty("i32"), "y")]);
    let files = [b.file("main.cv", &[b.fn_item(first), b.fn_item(second)])];

    let result = compile(&files, &CompilerInputs::default());
    assert!(!result.is_success());
    assert_eq!(result.diagnostics.count(Severity::Critical), 1);
    assert_eq!(result.functions().count(), 1);
    assert_eq!(result.registration.duplicates, 1);
}

#[test]
fn test_unused_functions_get_a_hint() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let helper = b.function(b.ty("void"), "helper", &[], &[]);
    let files = [b.file("main.cv", &[b.fn_item(helper)])];

    let result = compile(&files, &CompilerInputs::default());
    assert!(result.is_success());
    assert!(result.body_of("helper").is_none());
    let hints: Vec<_> = result.diagnostics.iter_severity(Severity::Hint).collect();
    assert_eq!(hints.len(), 1);
    assert!(hints[0].message.contains("helper"));
}

// ==========================================================================
// Generators
// ==========================================================================

#[test]
fn test_generator_function_becomes_a_state_machine() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena, FileId(0));
    let next = b.with_attributes(
        b.prototype(b.ty("u8"), "next", &[b.param(b.pointer(b.ty("T")), "out")]),
        &[b.attribute_str("builtin", "next")],
    );
    let generator = b.generic_structure(
        "Gen",
        &["T"],
        &[b.attribute("generator", &[])],
        &[StructMember::Method(next)],
    );
    let alloc = b.with_attributes(
        b.prototype(b.pointer(b.ty("any")), "alloc", &[b.param(b.ty("i32"), "size")]),
        &[b.attribute_str("builtin", "alloc")],
    );
    let numbers = b.function(
        b.generic_ty("Gen", &[b.ty("i32")]),
        "numbers",
        &[],
        &[b.yield_stmt(b.int(1)), b.yield_stmt(b.int(2))],
    );
    let files = [b.file(
        "main.cv",
        &[b.struct_item(generator), b.fn_item(alloc), exported(&b, numbers)],
    )];

    let result = compile(&files, &CompilerInputs::default());

    let (_, state) = result
        .structs()
        .find(|(_, s)| s.name == "numbers$state")
        .expect("state struct is synthesized");
    assert_eq!(state.fields.as_ref().map(Vec::len), Some(1));

    let (_, _, body) = result
        .bodies()
        .find(|(_, f, _)| f.name == "numbers$body")
        .expect("resumable body is synthesized");
    let [
        CompiledStatement::If { .. },
        CompiledStatement::Block(inner),
        CompiledStatement::Return { .. },
    ] = body.block.stmts.as_slice()
    else {
        panic!("unexpected body {:?}", body.block.stmts);
    };
    let labels = inner
        .stmts
        .iter()
        .filter(|s| matches!(s, CompiledStatement::Label { .. }))
        .count();
    assert_eq!(labels, 2);
    assert_eq!(body.labels.len(), 2);
}

// ==========================================================================
// Types
// ==========================================================================

#[test]
fn test_cast_rules() {
    let decls = Declarations::default();
    let settings = CompilerSettings::default();
    let i32_ty = GeneralType::I32;
    let u8_ty = GeneralType::U8;

    assert!(can_cast_implicitly(&i32_ty, &i32_ty, None, &decls).is_ok());
    assert!(can_cast_implicitly(&i32_ty, &u8_ty, None, &decls).is_err());
    assert!(can_cast_explicitly(&i32_ty, &u8_ty, &settings, &decls).is_ok());

    let pointer = GeneralType::pointer_to(i32_ty.clone());
    assert!(can_cast_implicitly(&pointer, &pointer, None, &decls).is_ok());
}
