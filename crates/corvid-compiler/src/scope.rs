//! Frames and lexical scopes.
//!
//! A [`Frame`] exists for every function, lambda or top-level body being
//! lowered. Frames live on a stack inside the
//! [`CompilationContext`](crate::context::CompilationContext); only the
//! innermost frame is searched for locals unless it is a lambda, which reaches
//! into the enclosing frames and records captures.
//!
//! Scopes are pushed and popped only through the context's closure guards, so
//! a failed lowering never leaves a scope behind.

use corvid_core::{CompiledValue, Span};
use corvid_syntax::ParamModifiers;

use crate::registry::{FunctionId, StructId};
use crate::types::{Bindings, GeneralType};

/// Index into a frame's local variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub name: String,
    pub ty: GeneralType,
    pub span: Span,
    /// Deleted when its scope ends.
    pub temp: bool,
    /// Field of the generator state object holding this variable.
    pub state_field: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    pub name: String,
    pub span: Span,
}

/// Where a captured variable lives in the enclosing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Local(VariableId),
    Parameter(u32),
    /// Already a capture of the enclosing lambda.
    Capture(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedVariable {
    pub name: String,
    pub ty: GeneralType,
    pub source: CaptureSource,
}

/// A compile-time constant declared in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalConstant {
    pub name: String,
    pub ty: GeneralType,
    pub value: CompiledValue,
}

/// One lexical block.
#[derive(Debug, Clone, Default)]
pub struct LocalScope {
    variables: Vec<(String, VariableId)>,
    labels: Vec<(String, u32)>,
    constants: Vec<LocalConstant>,
}

impl LocalScope {
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.iter().map(|(_, id)| *id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    TopLevel,
    Function,
    Lambda,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameParameter {
    pub name: String,
    pub ty: GeneralType,
    pub modifiers: ParamModifiers,
}

/// Extra state while lowering a generator body.
#[derive(Debug, Clone)]
pub struct GeneratorContext {
    /// Synthesized state struct.
    pub state: StructId,
    /// Type written through the output pointer.
    pub element: GeneralType,
    /// Parameters of the implementing function and their state fields.
    pub params: Vec<(String, GeneralType, u32)>,
}

impl GeneratorContext {
    /// Field holding the resume label address.
    pub const RESUME_FIELD: u32 = 0;
    /// Body function parameter holding the state pointer.
    pub const STATE_PARAM: u32 = 0;
    /// Body function parameter holding the output pointer.
    pub const OUT_PARAM: u32 = 1;

    pub fn state_type(&self) -> GeneralType {
        GeneralType::structure(self.state, Vec::new())
    }
}

/// Compilation state of one body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub function: Option<FunctionId>,
    pub params: Vec<FrameParameter>,
    scopes: Vec<LocalScope>,
    pub locals: Vec<LocalVariable>,
    pub labels: Vec<LabelInfo>,
    pub captures: Vec<CapturedVariable>,
    /// `None` while a lambda's return type is still being inferred.
    pub return_type: Option<GeneralType>,
    pub generator: Option<GeneratorContext>,
    pub bindings: Bindings,
    /// Struct whose private fields are accessible.
    pub owner: Option<StructId>,
    pub loop_depth: u32,
}

impl Frame {
    pub fn new(
        kind: FrameKind,
        function: Option<FunctionId>,
        return_type: Option<GeneralType>,
    ) -> Self {
        Self {
            kind,
            function,
            params: Vec::new(),
            scopes: vec![LocalScope::default()],
            locals: Vec::new(),
            labels: Vec::new(),
            captures: Vec::new(),
            return_type,
            generator: None,
            bindings: Bindings::default(),
            owner: None,
            loop_depth: 0,
        }
    }

    pub fn top_level() -> Self {
        Self::new(FrameKind::TopLevel, None, None)
    }

    pub fn is_lambda(&self) -> bool {
        self.kind == FrameKind::Lambda
    }

    /// Only the outermost scope of the top-level frame declares globals.
    pub fn is_global_scope(&self) -> bool {
        self.kind == FrameKind::TopLevel && self.scopes.len() == 1
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(LocalScope::default());
    }

    pub(crate) fn pop_scope(&mut self) -> Option<LocalScope> {
        debug_assert!(!self.scopes.is_empty(), "scope stack underflow");
        self.scopes.pop()
    }

    pub(crate) fn take_scopes(&mut self) -> Vec<LocalScope> {
        std::mem::replace(&mut self.scopes, vec![LocalScope::default()])
    }

    pub(crate) fn restore_scopes(&mut self, scopes: Vec<LocalScope>) {
        self.scopes = scopes;
    }

    fn current(&mut self) -> &mut LocalScope {
        if self.scopes.is_empty() {
            self.scopes.push(LocalScope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn declared_here(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|scope| {
            scope.variables.iter().any(|(n, _)| n == name)
                || scope.constants.iter().any(|c| c.name == name)
        })
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    /// Declare a local; redeclaring a name in the same scope fails.
    pub fn declare_variable(&mut self, variable: LocalVariable) -> Result<VariableId, String> {
        if self.declared_here(&variable.name) {
            return Err(format!("'{}' is already declared in this scope", variable.name));
        }
        let id = VariableId(self.locals.len() as u32);
        let name = variable.name.clone();
        self.locals.push(variable);
        self.current().variables.push((name, id));
        Ok(id)
    }

    pub fn find_variable(&self, name: &str) -> Option<VariableId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.variables.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn variable(&self, id: VariableId) -> &LocalVariable {
        &self.locals[id.0 as usize]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut LocalVariable {
        &mut self.locals[id.0 as usize]
    }

    /// `temp` locals of the innermost scope, latest first.
    pub fn scope_temps(&self) -> Vec<VariableId> {
        self.scopes
            .last()
            .map(|scope| {
                scope
                    .variables
                    .iter()
                    .rev()
                    .map(|(_, id)| *id)
                    .filter(|id| self.variable(*id).temp)
                    .collect()
            })
            .unwrap_or_default()
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    pub fn declare_constant(&mut self, constant: LocalConstant) -> Result<(), String> {
        if self.declared_here(&constant.name) {
            return Err(format!("'{}' is already declared in this scope", constant.name));
        }
        self.current().constants.push(constant);
        Ok(())
    }

    pub fn find_constant(&self, name: &str) -> Option<&LocalConstant> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.constants.iter().rev())
            .find(|c| c.name == name)
    }

    // ==========================================================================
    // Labels
    // ==========================================================================

    pub fn declare_label(&mut self, name: &str, span: Span) -> Result<u32, String> {
        if self
            .scopes
            .last()
            .is_some_and(|scope| scope.labels.iter().any(|(n, _)| n == name))
        {
            return Err(format!("label '{name}' is already declared in this scope"));
        }
        let id = self.add_label(name, span);
        self.current().labels.push((name.to_string(), id));
        Ok(id)
    }

    /// A label without a name binding, e.g. a generator resume point.
    pub fn add_label(&mut self, name: &str, span: Span) -> u32 {
        self.labels.push(LabelInfo {
            name: name.to_string(),
            span,
        });
        self.labels.len() as u32 - 1
    }

    pub fn find_label(&self, name: &str) -> Option<u32> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.labels.iter())
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    // ==========================================================================
    // Parameters and captures
    // ==========================================================================

    pub fn find_parameter(&self, name: &str) -> Option<(u32, &FrameParameter)> {
        self.params
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .map(|(i, p)| (i as u32, p))
    }

    pub fn find_capture(&self, name: &str) -> Option<u32> {
        self.captures.iter().position(|c| c.name == name).map(|i| i as u32)
    }

    /// Record a capture, reusing an existing one for the same name.
    pub fn capture(&mut self, captured: CapturedVariable) -> u32 {
        if let Some(existing) = self.find_capture(&captured.name) {
            return existing;
        }
        self.captures.push(captured);
        self.captures.len() as u32 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> LocalVariable {
        LocalVariable {
            name: name.into(),
            ty: GeneralType::I32,
            span: Span::default(),
            temp: false,
            state_field: None,
        }
    }

    #[test]
    fn shadowing_in_nested_scope() {
        let mut frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let outer = frame.declare_variable(var("x")).unwrap();
        frame.push_scope();
        let inner = frame.declare_variable(var("x")).unwrap();
        assert_ne!(outer, inner);
        assert_eq!(frame.find_variable("x"), Some(inner));
        frame.pop_scope();
        assert_eq!(frame.find_variable("x"), Some(outer));
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut frame = Frame::top_level();
        frame.declare_variable(var("x")).unwrap();
        assert!(frame.declare_variable(var("x")).is_err());
        let constant = LocalConstant {
            name: "x".into(),
            ty: GeneralType::I32,
            value: CompiledValue::I32(1),
        };
        assert!(frame.declare_constant(constant).is_err());
    }

    #[test]
    fn labels_are_scoped() {
        let mut frame = Frame::top_level();
        frame.push_scope();
        let id = frame.declare_label("done", Span::default()).unwrap();
        assert_eq!(frame.find_label("done"), Some(id));
        frame.pop_scope();
        assert_eq!(frame.find_label("done"), None);
        assert_eq!(frame.labels.len(), 1);
    }

    #[test]
    fn captures_are_deduplicated() {
        let mut frame = Frame::new(FrameKind::Lambda, None, None);
        let captured = CapturedVariable {
            name: "n".into(),
            ty: GeneralType::I32,
            source: CaptureSource::Parameter(0),
        };
        assert_eq!(frame.capture(captured.clone()), 0);
        assert_eq!(frame.capture(captured), 0);
        assert_eq!(frame.captures.len(), 1);
    }

    #[test]
    fn temps_of_innermost_scope() {
        let mut frame = Frame::top_level();
        frame.push_scope();
        let mut t = var("buffer");
        t.temp = true;
        let id = frame.declare_variable(t).unwrap();
        frame.declare_variable(var("plain")).unwrap();
        assert_eq!(frame.scope_temps(), vec![id]);
    }
}
