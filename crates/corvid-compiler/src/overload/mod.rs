//! Overload resolution for functions, operators, constructors and general
//! functions.
//!
//! ## Algorithm
//!
//! 1. Collect candidates of the queried kind whose identifier matches (or,
//!    for attribute queries, that carry the attribute)
//! 2. Check the argument count, filling missing arguments from defaults
//! 3. Infer template arguments by unification
//! 4. Score every argument; a rejected argument rejects the candidate with
//!    a note
//! 5. Rank through [`RankedMatch`]: lowest badness wins, ties are broken by
//!    the relevant file only
//! 6. Instantiate the winner if it is a template
//!
//! ## Badness
//!
//! | argument | cost |
//! |---|---|
//! | exact type | 0 |
//! | implicit cast | 1 |
//! | integer literal retyped to another integer that holds it | 1 |
//! | integer literal used as float | 2 |
//! | constructor receiver passed as value instead of pointer | 1 |
//! | each inferred template argument | 1 |

mod ranking;
mod unify;

pub use ranking::{Perfectus, RankOutcome, Ranked, RankedMatch};
pub use unify::unify;

use corvid_core::{BuiltinType, CompilationError, CompiledValue, FileId, Span};
use tracing::trace;

use crate::context::CompilationContext;
use crate::decls::{CompiledFunction, Synthesized};
use crate::ir::CompiledExpr;
use crate::registry::{CallableKind, Declarations, FunctionId};
use crate::template::instantiate;
use crate::types::{Bindings, GeneralType, can_cast_implicitly};

type Result<T> = std::result::Result<T, CompilationError>;

/// One argument of a query.
#[derive(Debug, Clone, Copy)]
pub enum QueryArgument<'q> {
    /// A value of a known type.
    Type(&'q GeneralType),
    /// A lowered expression.
    Expr(&'q CompiledExpr),
    /// A lowered source literal; integer literals may adapt to the parameter.
    Literal(&'q CompiledExpr),
    /// Implicit receiver of a constructor: the constructed value, or a
    /// pointer to it.
    This(&'q GeneralType),
}

impl<'q> QueryArgument<'q> {
    /// Classify a lowered argument.
    pub fn of(expr: &'q CompiledExpr, literal: bool) -> Self {
        if literal && expr.as_literal().is_some() {
            Self::Literal(expr)
        } else {
            Self::Expr(expr)
        }
    }

    pub fn ty(&self) -> &'q GeneralType {
        match *self {
            Self::Type(ty) | Self::This(ty) => ty,
            Self::Expr(expr) | Self::Literal(expr) => &expr.ty,
        }
    }

    fn expr(&self) -> Option<&'q CompiledExpr> {
        match *self {
            Self::Expr(expr) | Self::Literal(expr) => Some(expr),
            _ => None,
        }
    }
}

/// Attribute filter for queries without identifier: `#builtin("alloc")`.
#[derive(Debug, Clone, Copy)]
pub struct QueryAttribute<'q> {
    pub name: &'q str,
    pub argument: Option<&'q str>,
}

/// A request to find the best callable.
#[derive(Debug, Clone, Copy)]
pub struct FunctionQuery<'q> {
    pub kind: CallableKind,
    /// `None` matches by [`FunctionQuery::attribute`] only.
    pub identifier: Option<&'q str>,
    /// Candidates declared here win ties.
    pub relevant_file: FileId,
    pub return_type: Option<&'q GeneralType>,
    pub arguments: &'q [QueryArgument<'q>],
    pub attribute: Option<QueryAttribute<'q>>,
    /// Explicit template arguments, in declaration order.
    pub type_args: &'q [GeneralType],
}

impl<'q> FunctionQuery<'q> {
    pub fn new(
        kind: CallableKind,
        identifier: &'q str,
        relevant_file: FileId,
        arguments: &'q [QueryArgument<'q>],
    ) -> Self {
        Self {
            kind,
            identifier: Some(identifier),
            relevant_file,
            return_type: None,
            arguments,
            attribute: None,
            type_args: &[],
        }
    }

    /// Query by attribute only.
    pub fn by_attribute(
        kind: CallableKind,
        attribute: QueryAttribute<'q>,
        relevant_file: FileId,
        arguments: &'q [QueryArgument<'q>],
    ) -> Self {
        Self {
            kind,
            identifier: None,
            relevant_file,
            return_type: None,
            arguments,
            attribute: Some(attribute),
            type_args: &[],
        }
    }

    pub fn with_return_type(mut self, return_type: &'q GeneralType) -> Self {
        self.return_type = Some(return_type);
        self
    }

    pub fn with_type_args(mut self, type_args: &'q [GeneralType]) -> Self {
        self.type_args = type_args;
        self
    }

    fn name(&self) -> String {
        match (self.identifier, self.attribute) {
            (Some(name), _) => name.to_string(),
            (None, Some(attribute)) => match attribute.argument {
                Some(arg) => format!("#{}(\"{arg}\")", attribute.name),
                None => format!("#{}", attribute.name),
            },
            (None, None) => "<anonymous>".to_string(),
        }
    }
}

/// The chosen callable.
#[derive(Debug, Clone)]
pub struct FunctionQueryResult {
    /// The callable to call; a concrete instance when a template was chosen.
    pub function: FunctionId,
    /// Template arguments by parameter name; empty for plain functions.
    pub bindings: Bindings,
    pub badness: u32,
    pub perfectus: Perfectus,
    /// Missing trailing arguments must be filled from parameter defaults.
    pub used_defaults: bool,
}

/// A candidate that passed every check.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub function: FunctionId,
    pub bindings: Bindings,
    pub used_defaults: bool,
}

/// Rank every candidate of `query` without instantiating anything.
pub fn rank_candidates(
    ctx: &CompilationContext<'_>,
    query: &FunctionQuery<'_>,
) -> RankOutcome<Candidate> {
    let decls = &ctx.decls;
    let mut ranked = RankedMatch::new(query.relevant_file);

    let ids: Vec<FunctionId> = match query.identifier {
        Some(name) => decls.functions_named(name).to_vec(),
        None => decls.functions().map(|(id, _)| id).collect(),
    };
    for id in ids {
        let function = decls.function(id);
        if function.kind != query.kind || !is_lookup_candidate(function) {
            continue;
        }
        if query.identifier.is_none() && !has_queried_attribute(function, query.attribute) {
            continue;
        }
        match score(decls, function, query) {
            Ok((badness, bindings, used_defaults)) => ranked.accept(
                Candidate {
                    function: id,
                    bindings,
                    used_defaults,
                },
                function.file,
                badness,
            ),
            Err(reason) => ranked.reject(format!("{}: {reason}", signature(decls, function))),
        }
    }
    ranked.finish()
}

/// Resolve `query` to one callable, instantiating templates on demand.
///
/// Failures carry one note per rejected candidate.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn find_function(
    ctx: &mut CompilationContext<'_>,
    query: &FunctionQuery<'_>,
    span: Span,
) -> Result<FunctionQueryResult> {
    match rank_candidates(ctx, query) {
        RankOutcome::Found(found) => Ok(select(ctx, found)),
        RankOutcome::Ambiguous(tied) => Err(ambiguity(ctx, query, &tied, span)),
        RankOutcome::NotFound(notes) => Err(CompilationError::NoMatchingOverload {
            name: query.name(),
            args: argument_list(&ctx.decls, query.arguments),
            notes,
            span,
        }),
    }
}

/// Like [`find_function`], but `Ok(None)` when nothing matched, so callers
/// can fall back to builtin rules. Ambiguity is still an error.
pub fn try_find_function(
    ctx: &mut CompilationContext<'_>,
    query: &FunctionQuery<'_>,
    span: Span,
) -> Result<Option<FunctionQueryResult>> {
    match rank_candidates(ctx, query) {
        RankOutcome::Found(found) => Ok(Some(select(ctx, found))),
        RankOutcome::Ambiguous(tied) => Err(ambiguity(ctx, query, &tied, span)),
        RankOutcome::NotFound(_) => Ok(None),
    }
}

/// Turn a ranked candidate into a result, instantiating templates.
pub fn select(ctx: &mut CompilationContext<'_>, found: Ranked<Candidate>) -> FunctionQueryResult {
    let Ranked {
        item,
        badness,
        perfectus,
    } = found;
    let template = ctx.decls.function(item.function);
    let function = if template.is_template() {
        let type_args: Vec<GeneralType> = template
            .template_params
            .iter()
            .map(|name| item.bindings.get(name).cloned().unwrap_or(GeneralType::ANY))
            .collect();
        instantiate(ctx, item.function, &type_args)
    } else {
        item.function
    };
    trace!(chosen = ?function, badness, "resolved overload");
    FunctionQueryResult {
        function,
        bindings: item.bindings,
        badness,
        perfectus,
        used_defaults: item.used_defaults,
    }
}

fn ambiguity(
    ctx: &CompilationContext<'_>,
    query: &FunctionQuery<'_>,
    tied: &[Ranked<Candidate>],
    span: Span,
) -> CompilationError {
    let candidates = tied
        .iter()
        .map(|r| signature(&ctx.decls, ctx.decls.function(r.item.function)))
        .collect::<Vec<_>>()
        .join(", ");
    CompilationError::AmbiguousOverload {
        name: query.name(),
        candidates,
        span,
    }
}

// ==========================================================================
// Scoring
// ==========================================================================

/// Callables reached by name; instances are reached through their template.
fn is_lookup_candidate(function: &CompiledFunction<'_>) -> bool {
    function.instance_of.is_none()
        && !matches!(
            function.synthesized,
            Some(Synthesized::GeneratorBody { .. } | Synthesized::Lambda)
        )
}

fn has_queried_attribute(
    function: &CompiledFunction<'_>,
    attribute: Option<QueryAttribute<'_>>,
) -> bool {
    let Some(attribute) = attribute else {
        return false;
    };
    function.attributes.iter().any(|a| {
        a.name == attribute.name && attribute.argument.is_none_or(|arg| a.string_arg() == Some(arg))
    })
}

/// Badness of `function` for `query`, or why it does not match.
fn score(
    decls: &Declarations<'_>,
    function: &CompiledFunction<'_>,
    query: &FunctionQuery<'_>,
) -> std::result::Result<(u32, Bindings, bool), String> {
    let args = query.arguments;
    let params = &function.params;
    if args.len() > params.len() {
        return Err(format!("expects at most {} argument(s), got {}", params.len(), args.len()));
    }
    let used_defaults = args.len() < params.len();
    if let Some(missing) = params[args.len()..].iter().find(|p| p.default.is_none()) {
        return Err(format!("no value for parameter '{}'", missing.name));
    }

    let mut bindings = Bindings::default();
    let mut badness = 0;
    if !query.type_args.is_empty() {
        if !function.is_template() || query.type_args.len() > function.template_params.len() {
            return Err(format!(
                "takes {} type argument(s), got {}",
                function.template_params.len(),
                query.type_args.len()
            ));
        }
        for (name, ty) in function.template_params.iter().zip(query.type_args) {
            bindings.insert(name.clone(), ty.clone());
        }
    }

    if function.is_template() {
        let explicit = bindings.len();
        for (i, (arg, param)) in args.iter().zip(params).enumerate() {
            let arg_ty = match arg {
                QueryArgument::This(ty) if param.ty.is_pointer() && !ty.is_pointer() => {
                    GeneralType::pointer_to((*ty).clone())
                }
                other => other.ty().clone(),
            };
            unify(&param.ty, &arg_ty, &mut bindings)
                .map_err(|reason| format!("argument {}: {reason}", i + 1))?;
        }
        if let Some(unbound) = function
            .template_params
            .iter()
            .find(|p| !bindings.contains_key(*p))
        {
            return Err(format!("cannot infer template argument '{unbound}'"));
        }
        badness += (bindings.len() - explicit) as u32;
    }

    for (i, (arg, param)) in args.iter().zip(params).enumerate() {
        let param_ty = param.ty.substitute(&bindings);
        badness += argument_badness(decls, arg, &param_ty)
            .map_err(|reason| format!("argument {}: {reason}", i + 1))?;
    }

    if let Some(expected) = query.return_type {
        let actual = function.return_type.substitute(&bindings);
        if !actual.same_as(expected) {
            return Err(format!(
                "returns '{}', expected '{}'",
                actual.display(decls),
                expected.display(decls)
            ));
        }
    }
    Ok((badness, bindings, used_defaults))
}

/// Cost of passing `arg` to a parameter of type `param`.
pub fn argument_badness(
    decls: &Declarations<'_>,
    arg: &QueryArgument<'_>,
    param: &GeneralType,
) -> std::result::Result<u32, String> {
    let ty = arg.ty();
    if ty.same_as(param) {
        return Ok(0);
    }
    match arg {
        QueryArgument::This(_) => {
            if GeneralType::pointer_to(ty.clone()).same_as(param) {
                Ok(1)
            } else {
                Err(format!(
                    "receiver '{}' does not match '{}'",
                    ty.display(decls),
                    param.display(decls)
                ))
            }
        }
        QueryArgument::Literal(expr) => match (expr.as_literal(), param.as_builtin()) {
            (Some(value), Some(target)) if literal_fits(value, target) => {
                Ok(if target.is_float() && !value.is_float() { 2 } else { 1 })
            }
            _ => implicit(decls, ty, param, Some(expr)),
        },
        _ => implicit(decls, ty, param, arg.expr()),
    }
}

fn implicit(
    decls: &Declarations<'_>,
    ty: &GeneralType,
    param: &GeneralType,
    value: Option<&CompiledExpr>,
) -> std::result::Result<u32, String> {
    can_cast_implicitly(ty, param, value, decls)
        .map(|()| 1)
        .map_err(|e| e.to_string())
}

/// Whether a literal can be retyped to `target` without changing its value.
pub fn literal_fits(value: CompiledValue, target: BuiltinType) -> bool {
    if value.is_float() {
        return target.is_float();
    }
    target.is_numeric() && CompiledValue::fits(value.as_i128(), target)
}

// ==========================================================================
// Rendering
// ==========================================================================

/// `name(T1, T2) -> R`
pub fn signature(decls: &Declarations<'_>, function: &CompiledFunction<'_>) -> String {
    let params = function
        .params
        .iter()
        .map(|p| p.ty.display(decls).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({params}) -> {}", function.name, function.return_type.display(decls))
}

fn argument_list(decls: &Declarations<'_>, arguments: &[QueryArgument<'_>]) -> String {
    arguments
        .iter()
        .map(|a| a.ty().display(decls).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompilerInputs;
    use crate::decls::Parameter;
    use crate::ir::ExprKind;
    use crate::registry::StructId;

    fn function(name: &str, file: u32, params: &[GeneralType]) -> CompiledFunction<'static> {
        let mut f = CompiledFunction::new(
            CallableKind::Function,
            name,
            FileId(file),
            Span::default(),
            GeneralType::VOID,
        );
        f.params = params
            .iter()
            .enumerate()
            .map(|(i, ty)| Parameter::new(format!("p{i}"), ty.clone(), Span::default()))
            .collect();
        f
    }

    fn int_literal(value: i32) -> CompiledExpr {
        CompiledExpr::literal(CompiledValue::I32(value), GeneralType::I32, Span::default())
    }

    #[test]
    fn integer_literal_prefers_integer_overload() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let int = ctx.decls.add_function(function("f", 0, &[GeneralType::I32])).unwrap();
        ctx.decls.add_function(function("f", 0, &[GeneralType::F32])).unwrap();

        let one = int_literal(1);
        let args = [QueryArgument::Literal(&one)];
        let query = FunctionQuery::new(CallableKind::Function, "f", FileId(0), &args);
        let result = find_function(&mut ctx, &query, Span::default()).unwrap();
        assert_eq!(result.function, int);
        assert_eq!(result.badness, 0);
    }

    #[test]
    fn literal_retyping_costs() {
        let decls = Declarations::default();
        let one = int_literal(1);
        let arg = QueryArgument::Literal(&one);
        assert_eq!(argument_badness(&decls, &arg, &GeneralType::U8), Ok(1));
        assert_eq!(argument_badness(&decls, &arg, &GeneralType::F32), Ok(2));
        let big = int_literal(300);
        assert!(argument_badness(&decls, &QueryArgument::Literal(&big), &GeneralType::U8).is_err());
        // Non-literal values never adapt.
        assert!(argument_badness(&decls, &QueryArgument::Expr(&one), &GeneralType::U8).is_err());
    }

    #[test]
    fn equal_badness_in_other_files_is_ambiguous() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        ctx.decls.add_function(function("g", 1, &[GeneralType::I32])).unwrap();
        ctx.decls.add_function(function("g", 2, &[GeneralType::I32])).unwrap();

        let one = int_literal(1);
        let args = [QueryArgument::Literal(&one)];
        let query = FunctionQuery::new(CallableKind::Function, "g", FileId(0), &args);
        for _ in 0..2 {
            assert!(matches!(
                find_function(&mut ctx, &query, Span::default()),
                Err(CompilationError::AmbiguousOverload { .. })
            ));
        }

        let local = FunctionQuery::new(CallableKind::Function, "g", FileId(2), &args);
        let chosen = find_function(&mut ctx, &local, Span::default()).unwrap();
        assert_eq!(ctx.decls.function(chosen.function).file, FileId(2));
        assert_eq!(chosen.perfectus, Perfectus::File);
    }

    #[test]
    fn rejected_candidates_leave_notes() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        ctx.decls
            .add_function(function("h", 0, &[GeneralType::I32, GeneralType::I32]))
            .unwrap();
        let one = int_literal(1);
        let args = [QueryArgument::Literal(&one)];
        let query = FunctionQuery::new(CallableKind::Function, "h", FileId(0), &args);
        match find_function(&mut ctx, &query, Span::default()) {
            Err(CompilationError::NoMatchingOverload { notes, .. }) => {
                assert_eq!(notes.len(), 1);
                assert!(notes[0].contains("no value for parameter 'p1'"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn templates_are_inferred_and_instantiated() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let t = GeneralType::Generic("T".into());
        let mut template = function("id", 0, &[t.clone()]);
        template.template_params = vec!["T".into()];
        template.return_type = t;
        let template = ctx.decls.add_function(template).unwrap();

        let value = CompiledExpr::new(
            ExprKind::Parameter(0),
            GeneralType::F32,
            Span::default(),
        );
        let args = [QueryArgument::Expr(&value)];
        let query = FunctionQuery::new(CallableKind::Function, "id", FileId(0), &args);
        let result = find_function(&mut ctx, &query, Span::default()).unwrap();
        assert_ne!(result.function, template);
        assert_eq!(result.badness, 1);
        assert_eq!(ctx.decls.function(result.function).return_type, GeneralType::F32);

        let again = find_function(&mut ctx, &query, Span::default()).unwrap();
        assert_eq!(again.function, result.function);
    }

    #[test]
    fn constructor_receiver_value_costs_one() {
        let decls = Declarations::default();
        let s = GeneralType::structure(StructId(0), vec![]);
        let ptr = GeneralType::pointer_to(s.clone());
        assert_eq!(argument_badness(&decls, &QueryArgument::This(&ptr), &ptr), Ok(0));
        assert_eq!(argument_badness(&decls, &QueryArgument::This(&s), &ptr), Ok(1));
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let inputs = CompilerInputs::default();
        let arena = bumpalo::Bump::new();
        let b = corvid_syntax::AstBuilder::new(&arena, FileId(0));
        let default: &corvid_syntax::Expr<'_> = arena.alloc(b.int(3));
        let mut ctx = CompilationContext::new(&inputs);
        let mut f = function("k", 0, &[GeneralType::I32, GeneralType::I32]);
        f.params[1].default = Some(default);
        ctx.decls.add_function(f).unwrap();

        let one = int_literal(1);
        let args = [QueryArgument::Literal(&one)];
        let query = FunctionQuery::new(CallableKind::Function, "k", FileId(0), &args);
        assert!(find_function(&mut ctx, &query, Span::default()).unwrap().used_defaults);
    }
}
