//! Template instantiation and the Compilable work queues.
//!
//! Instances are keyed by (template, canonical type arguments), so asking for
//! the same instantiation twice yields the same declaration and recursion
//! through templates terminates.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::context::CompilationContext;
use crate::decls::{BodyState, TemplateInstance};
use crate::registry::{CallableKind, FunctionId};
use crate::types::{Bindings, GeneralType};

/// Cache of function template instances.
#[derive(Debug, Default, Clone)]
pub struct TemplateInstanceCache {
    function_instances: FxHashMap<(FunctionId, Vec<GeneralType>), FunctionId>,
}

impl TemplateInstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_function_instance(
        &self,
        template: FunctionId,
        args: &[GeneralType],
    ) -> Option<FunctionId> {
        self.function_instances.get(&(template, args.to_vec())).copied()
    }

    pub fn cache_function_instance(
        &mut self,
        template: FunctionId,
        args: Vec<GeneralType>,
        instance: FunctionId,
    ) {
        self.function_instances.insert((template, args), instance);
    }
}

/// One append-only worklist per callable kind.
///
/// The driver iterates by index, so entries appended while a queue is being
/// drained are picked up in the same pass.
#[derive(Debug, Default, Clone)]
pub struct CompilableQueues {
    queues: [Vec<FunctionId>; 4],
}

impl CompilableQueues {
    pub fn push(&mut self, kind: CallableKind, id: FunctionId) {
        self.queues[kind.queue_index()].push(id);
    }

    pub fn get(&self, kind: CallableKind, index: usize) -> Option<FunctionId> {
        self.queues[kind.queue_index()].get(index).copied()
    }

    pub fn len(&self, kind: CallableKind) -> usize {
        self.queues[kind.queue_index()].len()
    }
}

/// Bind template parameter names to type arguments.
pub fn bind(params: &[String], args: &[GeneralType]) -> Bindings {
    params.iter().cloned().zip(args.iter().cloned()).collect()
}

/// Get or create the instance of `template` for `type_args`.
///
/// New instances are queued for body compilation.
pub fn instantiate(
    ctx: &mut CompilationContext<'_>,
    template: FunctionId,
    type_args: &[GeneralType],
) -> FunctionId {
    let key: Vec<GeneralType> = type_args.iter().map(GeneralType::canonical).collect();
    if let Some(existing) = ctx.templates.get_function_instance(template, &key) {
        return existing;
    }

    let source = ctx.decls.function(template);
    let bindings = bind(&source.template_params, type_args);
    let mut instance = source.clone();
    instance.return_type = source.return_type.substitute(&bindings);
    for param in &mut instance.params {
        param.ty = param.ty.substitute(&bindings);
    }
    instance.references.clear();
    instance.state = BodyState::Pending;
    instance.body = None;
    instance.instance_of = Some(TemplateInstance {
        template,
        type_args: type_args.to_vec(),
        bindings,
    });
    let kind = instance.kind;
    let name = instance.name.clone();

    let id = ctx.decls.add_function_unchecked(instance);
    ctx.templates.cache_function_instance(template, key, id);
    ctx.queues.push(kind, id);
    trace!(template = %name, instance = ?id, "instantiated template");
    id
}

#[cfg(test)]
mod tests {
    use corvid_core::{FileId, Span};

    use super::*;
    use crate::context::CompilerInputs;
    use crate::decls::{CompiledFunction, Parameter};

    fn identity_template() -> CompiledFunction<'static> {
        let t = GeneralType::Generic("T".into());
        let mut f = CompiledFunction::new(
            CallableKind::Function,
            "id",
            FileId(0),
            Span::default(),
            t.clone(),
        );
        f.template_params = vec!["T".into()];
        f.params = vec![Parameter::new("value", t, Span::default())];
        f
    }

    #[test]
    fn instances_are_cached_and_queued() {
        let inputs = CompilerInputs::default();
        let mut ctx = CompilationContext::new(&inputs);
        let template = ctx.decls.add_function(identity_template()).unwrap();

        let first = instantiate(&mut ctx, template, &[GeneralType::I32]);
        let again = instantiate(&mut ctx, template, &[GeneralType::I32]);
        let float = instantiate(&mut ctx, template, &[GeneralType::F32]);

        assert_eq!(first, again);
        assert_ne!(first, float);
        assert_eq!(ctx.queues.len(CallableKind::Function), 2);
        let instance = ctx.decls.function(first);
        assert_eq!(instance.return_type, GeneralType::I32);
        assert_eq!(instance.params[0].ty, GeneralType::I32);
        assert!(!instance.is_template());
    }
}
