//! Template argument inference.

use crate::types::{Bindings, GeneralType};

/// Match `param` (which may mention template parameters) against a concrete
/// `arg`, extending `bindings`.
///
/// Parts of `param` without template parameters are left to the cast rules;
/// only the generic positions must agree structurally.
pub fn unify(
    param: &GeneralType,
    arg: &GeneralType,
    bindings: &mut Bindings,
) -> Result<(), String> {
    if !param.contains_generic() {
        return Ok(());
    }
    match (param, arg.unaliased()) {
        (GeneralType::Generic(name), _) => match bindings.get(name) {
            Some(bound) if bound.same_as(arg) => Ok(()),
            Some(bound) => Err(format!(
                "'{name}' is bound to {:?} but also deduced as {:?}",
                bound.canonical(),
                arg.canonical()
            )),
            None => {
                bindings.insert(name.clone(), arg.clone());
                Ok(())
            }
        },
        (GeneralType::Alias { target, .. }, _) => unify(target, arg, bindings),
        (GeneralType::Pointer(p), GeneralType::Pointer(a)) => unify(p, a, bindings),
        (GeneralType::Array { of: p, .. }, GeneralType::Array { of: a, .. }) => {
            unify(p, a, bindings)
        }
        (
            GeneralType::Struct {
                id: pid,
                type_args: pargs,
            },
            GeneralType::Struct {
                id: aid,
                type_args: aargs,
            },
        ) if pid == aid && pargs.len() == aargs.len() => {
            for (p, a) in pargs.iter().zip(aargs) {
                unify(p, a, bindings)?;
            }
            Ok(())
        }
        (
            GeneralType::Function {
                return_type: pr,
                params: pp,
                ..
            },
            GeneralType::Function {
                return_type: ar,
                params: ap,
                ..
            },
        ) if pp.len() == ap.len() => {
            unify(pr, ar, bindings)?;
            for (p, a) in pp.iter().zip(ap) {
                unify(p, a, bindings)?;
            }
            Ok(())
        }
        _ => Err("argument shape does not match the template parameter".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StructId;

    fn t() -> GeneralType {
        GeneralType::Generic("T".into())
    }

    #[test]
    fn binds_through_pointers_and_structs() {
        let mut bindings = Bindings::default();
        let param = GeneralType::pointer_to(GeneralType::structure(StructId(0), vec![t()]));
        let arg =
            GeneralType::pointer_to(GeneralType::structure(StructId(0), vec![GeneralType::F32]));
        unify(&param, &arg, &mut bindings).unwrap();
        assert_eq!(bindings.get("T"), Some(&GeneralType::F32));
    }

    #[test]
    fn conflicting_bindings_fail() {
        let mut bindings = Bindings::default();
        unify(&t(), &GeneralType::I32, &mut bindings).unwrap();
        assert!(unify(&t(), &GeneralType::I32, &mut bindings).is_ok());
        assert!(unify(&t(), &GeneralType::F32, &mut bindings).is_err());
    }

    #[test]
    fn shape_mismatch_fails() {
        let mut bindings = Bindings::default();
        let param = GeneralType::pointer_to(t());
        assert!(unify(&param, &GeneralType::I32, &mut bindings).is_err());
        assert!(bindings.is_empty());
    }
}
