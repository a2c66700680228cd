//! Declaration storage.
//!
//! [`Declarations`] owns every compiled struct, alias, callable, global
//! variable, global constant and global label, addressed by typed ids.
//! Name lookups that can hit several files go through the shared
//! [`RankedMatch`](crate::overload::RankedMatch).

use std::fmt;

use corvid_core::{CompiledValue, FileId, Span};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;

use crate::decls::{CompiledAlias, CompiledFunction, CompiledStruct, Field};
use crate::overload::{RankOutcome, RankedMatch};
use crate::types::{Bindings, GeneralType};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Index of a compiled struct.
    StructId,
    "struct"
);
id_type!(
    /// Index of a compiled alias.
    AliasId,
    "alias"
);
id_type!(
    /// Index of a compiled callable of any kind.
    FunctionId,
    "fn"
);
id_type!(
    /// Index of a global variable.
    GlobalId,
    "global"
);

/// The four callable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Function,
    Operator,
    Constructor,
    GeneralFunction,
}

impl CallableKind {
    pub const ALL: [CallableKind; 4] = [
        CallableKind::Function,
        CallableKind::Operator,
        CallableKind::Constructor,
        CallableKind::GeneralFunction,
    ];

    pub fn queue_index(self) -> usize {
        match self {
            Self::Function => 0,
            Self::Operator => 1,
            Self::Constructor => 2,
            Self::GeneralFunction => 3,
        }
    }
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Function => "function",
            Self::Operator => "operator",
            Self::Constructor => "constructor",
            Self::GeneralFunction => "general function",
        })
    }
}

/// A global variable; outermost top-level declarations.
#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: GeneralType,
    pub file: FileId,
    pub span: Span,
}

/// A top-level `const`, computed once.
#[derive(Debug, Clone)]
pub struct GlobalConstant {
    pub name: String,
    pub ty: GeneralType,
    pub value: CompiledValue,
    pub file: FileId,
    pub span: Span,
}

/// A top-level instruction label.
#[derive(Debug, Clone)]
pub struct GlobalLabel {
    pub name: String,
    pub file: FileId,
    pub span: Span,
}

/// Why inserting a callable failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateSignature(pub FunctionId);

#[derive(Debug, Default, Clone)]
pub struct Declarations<'ast> {
    structs: Vec<CompiledStruct<'ast>>,
    aliases: Vec<CompiledAlias>,
    functions: Vec<CompiledFunction<'ast>>,
    globals: Vec<GlobalVariable>,
    constants: Vec<GlobalConstant>,
    labels: Vec<GlobalLabel>,
    functions_by_name: FxHashMap<String, Vec<FunctionId>>,
    signatures: FxHashMap<u64, FunctionId>,
}

impl<'ast> Declarations<'ast> {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Structs
    // ==========================================================================

    pub fn add_struct(&mut self, structure: CompiledStruct<'ast>) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(structure);
        id
    }

    pub fn structure(&self, id: StructId) -> &CompiledStruct<'ast> {
        &self.structs[id.index()]
    }

    pub fn structure_mut(&mut self, id: StructId) -> &mut CompiledStruct<'ast> {
        &mut self.structs[id.index()]
    }

    pub fn structs(&self) -> impl Iterator<Item = (StructId, &CompiledStruct<'ast>)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(i, s)| (StructId(i as u32), s))
    }

    /// Fields of a struct with its template parameters substituted.
    pub fn struct_fields(&self, id: StructId, type_args: &[GeneralType]) -> Option<Vec<Field>> {
        let structure = self.structure(id);
        let fields = structure.fields.as_ref()?;
        if structure.template_params.is_empty() {
            return Some(fields.clone());
        }
        let bindings: Bindings = structure
            .template_params
            .iter()
            .cloned()
            .zip(type_args.iter().cloned())
            .collect();
        Some(
            fields
                .iter()
                .map(|f| Field {
                    ty: f.ty.substitute(&bindings),
                    ..f.clone()
                })
                .collect(),
        )
    }

    pub fn find_struct(&self, name: &str, file: FileId) -> RankOutcome<StructId> {
        let mut ranked = RankedMatch::new(file);
        for (id, s) in self.structs() {
            if s.name == name && !s.synthesized {
                ranked.accept(id, s.file, 0);
            }
        }
        ranked.finish()
    }

    // ==========================================================================
    // Aliases
    // ==========================================================================

    pub fn add_alias(&mut self, alias: CompiledAlias) -> AliasId {
        let id = AliasId(self.aliases.len() as u32);
        self.aliases.push(alias);
        id
    }

    pub fn alias(&self, id: AliasId) -> &CompiledAlias {
        &self.aliases[id.index()]
    }

    pub fn aliases(&self) -> impl Iterator<Item = (AliasId, &CompiledAlias)> {
        self.aliases
            .iter()
            .enumerate()
            .map(|(i, a)| (AliasId(i as u32), a))
    }

    pub fn find_alias(&self, name: &str, file: FileId) -> RankOutcome<AliasId> {
        let mut ranked = RankedMatch::new(file);
        for (id, a) in self.aliases() {
            if a.name == name {
                ranked.accept(id, a.file, 0);
            }
        }
        ranked.finish()
    }

    // ==========================================================================
    // Callables
    // ==========================================================================

    /// Insert a callable unless one with the same signature exists.
    pub fn add_function(
        &mut self,
        function: CompiledFunction<'ast>,
    ) -> Result<FunctionId, DuplicateSignature> {
        let hash = self.signature_hash(&function);
        if let Some(existing) = self.signatures.get(&hash) {
            return Err(DuplicateSignature(*existing));
        }
        let id = FunctionId(self.functions.len() as u32);
        self.signatures.insert(hash, id);
        self.functions_by_name
            .entry(function.name.clone())
            .or_default()
            .push(id);
        self.functions.push(function);
        Ok(id)
    }

    /// Insert a compiler-created callable that bypasses signature checks,
    /// such as template instances and lambdas.
    pub fn add_function_unchecked(&mut self, function: CompiledFunction<'ast>) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions_by_name
            .entry(function.name.clone())
            .or_default()
            .push(id);
        self.functions.push(function);
        id
    }

    /// Identity hash over (identifier, file, parameter types, return type).
    ///
    /// Kind and receiver form are included so the synthesized member variants
    /// never collide with each other.
    pub fn signature_hash(&self, function: &CompiledFunction<'ast>) -> u64 {
        let mut key = format!(
            "{:?}|{}|{}|{:?}|{}",
            function.kind,
            function.name,
            function.file.0,
            function.this_form,
            function.template_params.len()
        );
        for param in &function.params {
            key.push('|');
            key.push_str(&format!("{:?}", param.ty.canonical()));
        }
        key.push_str("->");
        key.push_str(&format!("{:?}", function.return_type.canonical()));
        xxh64(key.as_bytes(), 0)
    }

    pub fn function(&self, id: FunctionId) -> &CompiledFunction<'ast> {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut CompiledFunction<'ast> {
        &mut self.functions[id.index()]
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &CompiledFunction<'ast>)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(i as u32), f))
    }

    pub fn functions_named(&self, name: &str) -> &[FunctionId] {
        self.functions_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ==========================================================================
    // Globals, constants, labels
    // ==========================================================================

    pub fn add_global(&mut self, global: GlobalVariable) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(global);
        id
    }

    pub fn global(&self, id: GlobalId) -> &GlobalVariable {
        &self.globals[id.index()]
    }

    pub fn globals(&self) -> &[GlobalVariable] {
        &self.globals
    }

    pub fn find_global(&self, name: &str, file: FileId) -> RankOutcome<GlobalId> {
        let mut ranked = RankedMatch::new(file);
        for (i, g) in self.globals.iter().enumerate() {
            if g.name == name {
                ranked.accept(GlobalId(i as u32), g.file, 0);
            }
        }
        ranked.finish()
    }

    pub fn add_constant(&mut self, constant: GlobalConstant) {
        self.constants.push(constant);
    }

    pub fn constants(&self) -> &[GlobalConstant] {
        &self.constants
    }

    pub fn find_constant(&self, name: &str, file: FileId) -> RankOutcome<usize> {
        let mut ranked = RankedMatch::new(file);
        for (i, c) in self.constants.iter().enumerate() {
            if c.name == name {
                ranked.accept(i, c.file, 0);
            }
        }
        ranked.finish()
    }

    pub fn add_label(&mut self, label: GlobalLabel) -> u32 {
        self.labels.push(label);
        self.labels.len() as u32 - 1
    }

    pub fn labels(&self) -> &[GlobalLabel] {
        &self.labels
    }

    pub fn find_label(&self, name: &str, file: FileId) -> Option<u32> {
        self.labels
            .iter()
            .position(|l| l.name == name && l.file == file)
            .map(|i| i as u32)
    }
}
