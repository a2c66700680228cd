//! Registration pass - turn declaration syntax into typed declarations.
//!
//! Runs before any body is lowered and fills [`Declarations`] in this order:
//!
//! 1. Structs are registered with placeholder fields, so field types may
//!    reference any struct of any file
//! 2. Aliases are resolved, retrying until no alias makes progress
//! 3. Struct fields are resolved; generator structs are validated and
//!    rewritten
//! 4. Functions, operators, constructors and general functions are
//!    registered with complete signatures
//!
//! Errors abort only the declaration they occur in.
//!
//! [`Declarations`]: crate::registry::Declarations

use corvid_core::{CompilationError, FileId};
use corvid_syntax::{
    FunctionDecl, GeneralKind, Item, ParamModifiers, ParsedFile, StructDecl, StructMember,
};
use tracing::debug;

use crate::attributes::{
    apply_alias_attributes, apply_callable_attributes, apply_struct_attributes, compile_attributes,
};
use crate::context::CompilationContext;
use crate::decls::{CompiledAlias, CompiledFunction, CompiledStruct, Field, Parameter, ThisForm};
use crate::generator;
use crate::registry::{CallableKind, DuplicateSignature, StructId};
use crate::types::{GeneralType, TypeResolver};

type Result<T> = std::result::Result<T, CompilationError>;

/// Counts reported by the registration pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOutput {
    pub structs_registered: usize,
    pub aliases_registered: usize,
    pub functions_registered: usize,
    /// Declarations dropped because their signature already existed.
    pub duplicates: usize,
}

/// Where a struct member gets its receiver.
#[derive(Clone, Copy)]
struct Member {
    owner: StructId,
    general: Option<GeneralKind>,
}

pub struct RegistrationPass<'a, 'ast> {
    ctx: &'a mut CompilationContext<'ast>,
    files: &'a [ParsedFile<'ast>],
    output: RegistrationOutput,
    /// Struct ids in source order, paired with their syntax.
    structs: Vec<(StructId, &'ast StructDecl<'ast>)>,
}

impl<'a, 'ast> RegistrationPass<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>, files: &'a [ParsedFile<'ast>]) -> Self {
        Self {
            ctx,
            files,
            output: RegistrationOutput::default(),
            structs: Vec::new(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> RegistrationOutput {
        debug!(files = self.files.len(), "registration started");
        self.register_structs();
        self.register_aliases();
        self.resolve_fields();
        self.register_callables();
        for (id, _) in self.structs.clone() {
            if self.ctx.decls.structure(id).generator {
                generator::finish_generator_struct(self.ctx, id);
            }
        }
        debug!(
            structs = self.output.structs_registered,
            aliases = self.output.aliases_registered,
            functions = self.output.functions_registered,
            duplicates = self.output.duplicates,
            "registration finished"
        );
        self.output
    }

    // ==========================================================================
    // Structs
    // ==========================================================================

    fn register_structs(&mut self) {
        for file in self.files {
            self.ctx.set_file(file.file);
            for decl in file.structs() {
                let name = decl.name.name;
                if self.name_taken(name, file.file) {
                    self.ctx.report(CompilationError::DuplicateDefinition {
                        name: name.to_string(),
                        span: decl.name.span,
                    });
                    continue;
                }
                let template_params: Vec<String> =
                    decl.template_params.iter().map(|p| p.name.to_string()).collect();
                let attributes = compile_attributes(decl.attributes);
                let generator =
                    apply_struct_attributes(self.ctx, &attributes, !template_params.is_empty());
                let id = self.ctx.decls.add_struct(CompiledStruct {
                    name: name.to_string(),
                    file: file.file,
                    span: decl.span,
                    template_params,
                    attributes,
                    fields: None,
                    syntax: Some(decl),
                    generator,
                    synthesized: false,
                });
                self.structs.push((id, decl));
                self.output.structs_registered += 1;
            }
        }
    }

    /// Whether a struct or alias of this name already exists in `file`.
    fn name_taken(&self, name: &str, file: FileId) -> bool {
        self.ctx
            .decls
            .structs()
            .any(|(_, s)| s.name == name && s.file == file && !s.synthesized)
            || self.ctx.decls.aliases().any(|(_, a)| a.name == name && a.file == file)
    }

    fn resolve_fields(&mut self) {
        for (id, decl) in self.structs.clone() {
            let file = self.ctx.decls.structure(id).file;
            self.ctx.set_file(file);
            if self.ctx.decls.structure(id).generator {
                if let Err(err) = generator::prepare_generator_struct(self.ctx, id) {
                    self.ctx.report(err);
                    self.ctx.decls.structure_mut(id).generator = false;
                    self.ctx.decls.structure_mut(id).fields = Some(Vec::new());
                }
                continue;
            }
            let fields = self.struct_fields(id, decl);
            self.ctx.decls.structure_mut(id).fields = Some(fields);
        }
    }

    /// Resolve the fields of one struct; a broken field is reported and
    /// skipped.
    fn struct_fields(&mut self, id: StructId, decl: &'ast StructDecl<'ast>) -> Vec<Field> {
        let generics = self.ctx.decls.structure(id).template_params.clone();
        let mut fields: Vec<Field> = Vec::new();
        for field in decl.fields() {
            if fields.iter().any(|f| f.name == field.name.name) {
                self.ctx.report(CompilationError::DuplicateDefinition {
                    name: field.name.name.to_string(),
                    span: field.name.span,
                });
                continue;
            }
            let resolved = TypeResolver::new(&self.ctx.decls, &self.ctx.settings, self.ctx.file())
                .with_generics(&generics)
                .resolve(&field.ty);
            match resolved {
                Ok(ty) if ty.is_void() => self.ctx.report(CompilationError::other(
                    format!("field '{}' cannot be void", field.name.name),
                    field.span,
                )),
                Ok(ty) => fields.push(Field {
                    name: field.name.name.to_string(),
                    ty,
                    private: field.private,
                    span: field.span,
                }),
                Err(err) => self.ctx.report(err),
            }
        }
        fields
    }

    // ==========================================================================
    // Aliases
    // ==========================================================================

    fn register_aliases(&mut self) {
        let mut pending = Vec::new();
        for file in self.files {
            for decl in file.aliases() {
                pending.push((file.file, decl));
            }
        }

        loop {
            let before = pending.len();
            let mut failed = Vec::new();
            let mut last_errors = Vec::new();
            for (file, decl) in pending {
                self.ctx.set_file(file);
                let resolved = TypeResolver::new(&self.ctx.decls, &self.ctx.settings, file)
                    .resolve(&decl.target);
                match resolved {
                    Ok(target) => self.add_alias(file, decl, target),
                    Err(err) => {
                        failed.push((file, decl));
                        last_errors.push((file, err));
                    }
                }
            }
            pending = failed;
            if pending.is_empty() {
                break;
            }
            if pending.len() == before {
                for (file, err) in last_errors {
                    self.ctx.with_file(file, |ctx| ctx.report(err));
                }
                break;
            }
        }
    }

    fn add_alias(
        &mut self,
        file: FileId,
        decl: &'ast corvid_syntax::AliasDecl<'ast>,
        target: GeneralType,
    ) {
        let name = decl.name.name;
        if self.name_taken(name, file) {
            self.ctx.report(CompilationError::DuplicateDefinition {
                name: name.to_string(),
                span: decl.name.span,
            });
            return;
        }
        let attributes = compile_attributes(decl.attributes);
        let literal = apply_alias_attributes(self.ctx, &attributes, &target);
        self.ctx.decls.add_alias(CompiledAlias {
            name: name.to_string(),
            file,
            span: decl.span,
            target,
            attributes,
            literal,
        });
        self.output.aliases_registered += 1;
    }

    // ==========================================================================
    // Callables
    // ==========================================================================

    fn register_callables(&mut self) {
        for file in self.files {
            self.ctx.set_file(file.file);
            for item in file.items {
                match item {
                    Item::Function(decl) => self.register(CallableKind::Function, decl, None, None),
                    Item::Operator(decl) => self.register(CallableKind::Operator, decl, None, None),
                    Item::Struct(decl) => self.register_members(decl),
                    Item::Alias(_) | Item::Statement(_) => {}
                }
            }
        }
    }

    fn register_members(&mut self, decl: &'ast StructDecl<'ast>) {
        let Some(owner) = self
            .structs
            .iter()
            .find(|(_, syntax)| std::ptr::eq(*syntax, decl))
            .map(|(id, _)| *id)
        else {
            // Dropped as a duplicate.
            return;
        };
        for member in decl.members {
            match member {
                StructMember::Field(_) => {}
                StructMember::Method(f) => {
                    let member = Some(Member { owner, general: None });
                    self.register(CallableKind::Function, f, member, Some(ThisForm::Reference));
                    self.register(CallableKind::Function, f, member, Some(ThisForm::Pointer));
                }
                StructMember::Constructor(f) => {
                    let member = Some(Member { owner, general: None });
                    self.register(CallableKind::Constructor, f, member, Some(ThisForm::Pointer));
                }
                StructMember::General(kind, f) => {
                    let member = Some(Member {
                        owner,
                        general: Some(*kind),
                    });
                    let kind = CallableKind::GeneralFunction;
                    self.register(kind, f, member, Some(ThisForm::Reference));
                    self.register(kind, f, member, Some(ThisForm::Pointer));
                }
            }
        }
    }

    fn register(
        &mut self,
        kind: CallableKind,
        decl: &'ast FunctionDecl<'ast>,
        member: Option<Member>,
        form: Option<ThisForm>,
    ) {
        let function = match self.build(kind, decl, member, form) {
            Ok(function) => function,
            Err(err) => {
                self.ctx.report(err);
                return;
            }
        };
        let name = function.name.clone();
        match self.ctx.decls.add_function(function) {
            Ok(_) => self.output.functions_registered += 1,
            Err(DuplicateSignature(_)) => {
                // Both receiver forms collide together; report once.
                if form != Some(ThisForm::Pointer) || kind == CallableKind::Constructor {
                    self.ctx.report(CompilationError::DuplicateDefinition {
                        name,
                        span: decl.name.span,
                    });
                }
                self.output.duplicates += 1;
            }
        }
    }

    /// Build the typed declaration of one callable.
    fn build(
        &mut self,
        kind: CallableKind,
        decl: &'ast FunctionDecl<'ast>,
        member: Option<Member>,
        form: Option<ThisForm>,
    ) -> Result<CompiledFunction<'ast>> {
        let file = self.ctx.file();
        let mut generics: Vec<String> = Vec::new();
        let mut receiver = None;
        if let Some(Member { owner, .. }) = member {
            let owner_decl = self.ctx.decls.structure(owner);
            generics.extend(owner_decl.template_params.iter().cloned());
            let self_type = GeneralType::structure(
                owner,
                owner_decl
                    .template_params
                    .iter()
                    .map(|p| GeneralType::Generic(p.clone()))
                    .collect(),
            );
            receiver = Some(self_type);
        }
        for param in decl.template_params {
            if generics.iter().any(|g| g == param.name) {
                return Err(CompilationError::DuplicateDefinition {
                    name: param.name.to_string(),
                    span: param.span,
                });
            }
            generics.push(param.name.to_string());
        }

        let resolver =
            TypeResolver::new(&self.ctx.decls, &self.ctx.settings, file).with_generics(&generics);
        let name = match (kind, member) {
            (CallableKind::Constructor, Some(m)) => self.ctx.decls.structure(m.owner).name.clone(),
            (CallableKind::GeneralFunction, Some(Member { general: Some(g), .. })) => {
                g.name().to_string()
            }
            _ => decl.name.name.to_string(),
        };
        let mut return_type = match kind {
            CallableKind::Constructor => GeneralType::VOID,
            _ => resolver.resolve(&decl.return_type)?,
        };

        let mut params = Vec::with_capacity(decl.params.len() + 1);
        if let (Some(self_type), Some(form)) = (receiver, form) {
            let (ty, modifiers) = match form {
                ThisForm::Reference => (self_type, ParamModifiers::THIS | ParamModifiers::REF),
                ThisForm::Pointer => (GeneralType::pointer_to(self_type), ParamModifiers::THIS),
            };
            params.push(Parameter::new("this", ty, decl.name.span).with_modifiers(modifiers));
        }
        let mut temp_warnings = Vec::new();
        for param in decl.params {
            if params.iter().any(|p: &Parameter<'_>| p.name == param.name.name) {
                return Err(CompilationError::DuplicateDefinition {
                    name: param.name.name.to_string(),
                    span: param.name.span,
                });
            }
            let ty = resolver.resolve(&param.ty)?;
            if ty.is_void() {
                return Err(CompilationError::other(
                    format!("parameter '{}' cannot be void", param.name.name),
                    param.span,
                ));
            }
            if param.modifiers.contains(ParamModifiers::TEMP) && !ty.is_pointer() {
                temp_warnings.push((param.name.name, param.span));
            }
            params.push(Parameter {
                name: param.name.name.to_string(),
                ty,
                modifiers: param.modifiers,
                default: param.default.as_ref(),
                span: param.span,
            });
        }
        for (param, span) in temp_warnings {
            self.ctx
                .warning(format!("'temp' has no effect on non-pointer parameter '{param}'"), span);
        }

        let destructor = member.and_then(|m| m.general) == Some(GeneralKind::Destructor);
        if destructor && !return_type.is_void() {
            self.ctx.error("destructors return void", decl.return_type.span());
            return_type = GeneralType::VOID;
        }
        if let Some(defaulted) = params.iter().position(|p| p.default.is_some())
            && let Some(required) = params[defaulted..].iter().find(|p| p.default.is_none())
        {
            return Err(CompilationError::other(
                format!("parameter '{}' follows a parameter with a default value", required.name),
                required.span,
            ));
        }

        let mut function = CompiledFunction::new(kind, name, file, decl.span, return_type);
        function.params = params;
        function.template_params = generics;
        function.attributes = compile_attributes(decl.attributes);
        function.owner = member.map(|m| m.owner);
        function.general = member.and_then(|m| m.general);
        function.this_form = form;
        function.private = decl.private;
        function.syntax = Some(decl);
        apply_callable_attributes(self.ctx, &mut function);
        Ok(function)
    }
}

/// Run the registration pass over `files`.
pub fn register<'ast>(
    ctx: &mut CompilationContext<'ast>,
    files: &[ParsedFile<'ast>],
) -> RegistrationOutput {
    RegistrationPass::new(ctx, files).run()
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::Severity;
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::CompilerInputs;

    #[test]
    fn duplicate_signatures_keep_the_first() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let f1 = b.prototype(b.ty("void"), "f", &[b.param(b.ty("i32"), "x")]);
        let f2 = b.prototype(b.ty("void"), "f", &[b.param(b.ty("i32"), "y")]);
        let file = b.file("a.cv", &[b.fn_item(f1), b.fn_item(f2)]);

        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let files = [file];
        let output = register(&mut ctx, &files);
        assert_eq!(output.functions_registered, 1);
        assert_eq!(output.duplicates, 1);
        assert_eq!(ctx.diagnostics.count(Severity::Critical), 1);
        assert_eq!(ctx.decls.functions_named("f").len(), 1);
    }

    #[test]
    fn methods_get_both_receiver_forms() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let method = b.prototype(b.ty("i32"), "get", &[]);
        let point = b.structure(
            "Point",
            &[
                b.field_decl(b.ty("i32"), "x"),
                corvid_syntax::StructMember::Method(method),
            ],
        );
        let file = b.file("a.cv", &[b.struct_item(point)]);

        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let files = [file];
        register(&mut ctx, &files);

        let forms: Vec<_> = ctx
            .decls
            .functions_named("get")
            .iter()
            .map(|id| ctx.decls.function(*id).this_form)
            .collect();
        assert_eq!(forms, vec![Some(ThisForm::Reference), Some(ThisForm::Pointer)]);
        let pointer_form = ctx.decls.function(ctx.decls.functions_named("get")[1]);
        assert!(pointer_form.params[0].ty.is_pointer());
    }

    #[test]
    fn forward_struct_references_and_alias_chains() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let node = b.structure("Node", &[b.field_decl(b.pointer(b.ty("Other")), "next")]);
        let other = b.structure("Other", &[b.field_decl(b.ty("size"), "n")]);
        let size = b.alias("size", b.ty("word"), &[]);
        let word = b.alias("word", b.ty("u32"), &[]);
        let file = b.file(
            "a.cv",
            &[b.struct_item(node), b.struct_item(other), b.alias_item(size), b.alias_item(word)],
        );

        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let files = [file];
        let output = register(&mut ctx, &files);
        assert_eq!(output.aliases_registered, 2);
        assert!(!ctx.diagnostics.has_failures(), "{}", ctx.diagnostics);
        let other_id = ctx.decls.find_struct("Other", FileId(0)).found().unwrap();
        let fields = ctx.decls.struct_fields(other_id, &[]).unwrap();
        assert!(fields[0].ty.same_as(&GeneralType::Builtin(corvid_core::BuiltinType::U32)));
    }

    #[test]
    fn temp_on_value_parameter_warns() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let f = b.prototype(
            b.ty("void"),
            "consume",
            &[b.param_with(ParamModifiers::TEMP, b.ty("i32"), "x", None)],
        );
        let file = b.file("a.cv", &[b.fn_item(f)]);
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let files = [file];
        register(&mut ctx, &files);
        assert_eq!(ctx.diagnostics.count(Severity::Warning), 1);
    }
}
