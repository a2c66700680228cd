//! Corvid semantic compiler
//!
//! Turns parsed files into a type-checked, overload-resolved and partially
//! optimized compiled statement tree.
//!
//! ## Architecture
//!
//! - **Registration**: structs, aliases and callables with complete
//!   signatures; generator structs are validated and rewritten
//! - **Compilation**: top-level statements, then every reachable body in
//!   passes until no new body or template instance appears
//!
//! ## Modules
//!
//! - [`attributes`]: attribute values, placement rules and host tables
//! - [`context`]: the compilation session shared by every lowering call
//! - [`decls`] and [`registry`]: compiled declarations and their lookup tables
//! - [`types`]: the structural type system, casts and sizes
//! - [`overload`]: multi-criteria overload ranking and template unification
//! - [`expr`] and [`stmt`]: lowering from syntax to the compiled tree in [`ir`]
//! - [`eval`]: bounded compile-time evaluation
//! - [`inline`]: call-site inlining
//! - [`generator`]: generator structs and resumable bodies
//! - [`passes`]: the registration and compilation passes

pub mod attributes;
pub mod context;
pub mod decls;
pub mod eval;
pub mod expr;
pub mod function_compiler;
pub mod generator;
pub mod inline;
pub mod ir;
pub mod overload;
pub mod passes;
pub mod registry;
mod return_checker;
pub mod scope;
pub mod stmt;
pub mod template;
pub mod types;

pub use attributes::{
    AttributePlacement, AttributeValue, CompiledAttribute, ExternalConstant, ExternalFunction,
    LiteralType, UserAttribute,
};
pub use context::{CompilationContext, CompilerInputs};
pub use decls::{BodyState, CompiledAlias, CompiledFunction, CompiledStruct, FunctionBody};
pub use expr::ExprCompiler;
pub use ir::{CompiledBlock, CompiledExpr, CompiledStatement, ExprKind};
pub use passes::{CompilationOutput, CompilationPass, RegistrationOutput, RegistrationPass};
pub use registry::{
    AliasId, CallableKind, Declarations, FunctionId, GlobalConstant, GlobalId, GlobalVariable,
    StructId,
};
pub use scope::{LabelInfo, LocalVariable};
pub use stmt::StmtCompiler;
pub use types::GeneralType;

pub use corvid_core::{CompilationError, Diagnostics, Severity};

use corvid_syntax::ParsedFile;
use tracing::debug;

/// Everything a code generator needs from one compilation.
#[derive(Debug)]
pub struct CompilerResult<'ast> {
    declarations: Declarations<'ast>,
    pub registration: RegistrationOutput,
    pub compilation: CompilationOutput,
    pub diagnostics: Diagnostics,
}

impl<'ast> CompilerResult<'ast> {
    /// No critical diagnostic was reported.
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_critical()
    }

    pub fn declarations(&self) -> &Declarations<'ast> {
        &self.declarations
    }

    pub fn structs(&self) -> impl Iterator<Item = (StructId, &CompiledStruct<'ast>)> {
        self.declarations.structs()
    }

    pub fn aliases(&self) -> impl Iterator<Item = (AliasId, &CompiledAlias)> {
        self.declarations.aliases()
    }

    /// Callables of one kind, templates included.
    pub fn callables(
        &self,
        kind: CallableKind,
    ) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>)> {
        self.declarations.functions().filter(move |(_, f)| f.kind == kind)
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>)> {
        self.callables(CallableKind::Function)
    }

    pub fn operators(&self) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>)> {
        self.callables(CallableKind::Operator)
    }

    pub fn constructors(&self) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>)> {
        self.callables(CallableKind::Constructor)
    }

    pub fn general_functions(&self) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>)> {
        self.callables(CallableKind::GeneralFunction)
    }

    pub fn globals(&self) -> &[GlobalVariable] {
        self.declarations.globals()
    }

    pub fn constants(&self) -> &[GlobalConstant] {
        self.declarations.constants()
    }

    /// Top-level statements of every file, in file order.
    pub fn top_level(&self) -> &CompiledBlock {
        &self.compilation.top_level
    }

    /// Realized bodies: source declarations, template instances, lambdas and
    /// synthesized functions.
    pub fn bodies(
        &self,
    ) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>, &FunctionBody)> {
        self.declarations
            .functions()
            .filter_map(|(id, f)| f.body.as_ref().map(|body| (id, f, body)))
    }

    /// Compiled body of the first function called `name`.
    pub fn body_of(&self, name: &str) -> Option<&FunctionBody> {
        let id = self.declarations.functions_named(name).first()?;
        self.declarations.function(*id).body.as_ref()
    }
}

/// Compile `files` with the given host inputs.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile<'ast>(files: &[ParsedFile<'ast>], inputs: &CompilerInputs) -> CompilerResult<'ast> {
    let mut ctx = CompilationContext::new(inputs);
    let registration = RegistrationPass::new(&mut ctx, files).run();
    let compilation = CompilationPass::new(&mut ctx, files).run();
    let (declarations, diagnostics) = ctx.finish();
    debug!(
        diagnostics = diagnostics.len(),
        critical = diagnostics.has_critical(),
        "compilation complete"
    );
    CompilerResult {
        declarations,
        registration,
        compilation,
        diagnostics,
    }
}
