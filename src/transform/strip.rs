//! Stripping: hollowing a module out to its public surface.
//!
//! A stripped module keeps every type, method signature, and declared
//! attribute intact so existing callers still link against it, but no method
//! does anything any more. Embedded resources are dropped wholesale.

use crate::metadata::{
    method::{MethodBody, MethodImplAttributes},
    module::ModuleImage,
};

/// Replace every method body with a bare return and drop all resources.
///
/// Bodiless methods (abstract, forwarded) are left untouched. Methods that
/// had a body get a fresh empty-return body regardless of what the original
/// contained; their aggressive-inlining hint is cleared and no-inlining is
/// set so the runtime never inlines the hollow body into a caller and skips
/// the module load the proxy exists to trigger.
pub fn strip_module(module: &mut ModuleImage) {
    for type_def in &mut module.types {
        for method in &mut type_def.methods {
            if method.body.is_none() {
                continue;
            }
            method.body = Some(MethodBody::ret());
            method
                .impl_attributes
                .remove(MethodImplAttributes::AGGRESSIVE_INLINING);
            method
                .impl_attributes
                .insert(MethodImplAttributes::NO_INLINING);
        }
    }

    module.resources.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::{ModuleIdentity, ModuleVersion},
        method::{Instruction, MethodAttributes, MethodDef},
        module::{Resource, TypeDef},
    };

    fn busy_module() -> ModuleImage {
        let identity = ModuleIdentity::new("MyLib", ModuleVersion::new(1, 2, 3, 4), None, None);
        let mut module = ModuleImage::new(identity);

        let mut worker = TypeDef::new(Some("MyLib".to_string()), "Worker");
        worker.methods.push(
            MethodDef::new(
                "Compute",
                MethodAttributes::PUBLIC,
                "int32",
                vec!["int32".to_string(), "int32".to_string()],
            )
            .with_body(MethodBody::new(
                2,
                vec![
                    Instruction::Ldarg(0),
                    Instruction::Ldarg(1),
                    Instruction::Add,
                    Instruction::Ret,
                ],
            )),
        );
        worker.methods.push(MethodDef::new(
            "Forwarded",
            MethodAttributes::PUBLIC,
            "void",
            vec![],
        ));
        module.types.push(worker);

        module.resources.push(Resource {
            name: "MyLib.strings".to_string(),
            data: vec![1, 2, 3, 4],
        });

        module
    }

    #[test]
    fn every_surviving_body_is_a_bare_return() {
        let mut module = busy_module();
        strip_module(&mut module);

        for type_def in &module.types {
            for method in &type_def.methods {
                if let Some(body) = &method.body {
                    assert!(body.is_empty_return(), "{} kept content", method.name);
                    assert!(method
                        .impl_attributes
                        .contains(MethodImplAttributes::NO_INLINING));
                    assert!(!method
                        .impl_attributes
                        .contains(MethodImplAttributes::AGGRESSIVE_INLINING));
                }
            }
        }
    }

    #[test]
    fn resources_are_dropped() {
        let mut module = busy_module();
        assert!(!module.resources.is_empty());

        strip_module(&mut module);
        assert!(module.resources.is_empty());
    }

    #[test]
    fn declared_surface_survives() {
        let mut module = busy_module();
        let before: Vec<_> = module
            .types
            .iter()
            .flat_map(|t| t.methods.iter())
            .map(|m| (m.name.clone(), m.return_type.clone(), m.params.clone()))
            .collect();

        strip_module(&mut module);

        let after: Vec<_> = module
            .types
            .iter()
            .flat_map(|t| t.methods.iter())
            .map(|m| (m.name.clone(), m.return_type.clone(), m.params.clone()))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn bodiless_methods_stay_bodiless() {
        let mut module = busy_module();
        strip_module(&mut module);

        let forwarded = module.type_def("Worker").unwrap().method("Forwarded").unwrap();
        assert!(!forwarded.has_body());
        assert!(forwarded.impl_attributes.is_empty());
    }
}
