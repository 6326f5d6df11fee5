//! Load-time hook injection.
//!
//! Installs a static module initializer on the `<Module>` pseudo-type that
//! calls a well-known entry point in an external module. The runtime runs
//! that initializer exactly once, before any other code in the module, so
//! touching any member of the proxy transparently hands control to the hook
//! module first.

use crate::{
    metadata::{
        method::{Instruction, MethodAttributes, MethodBody, MethodDef},
        module::{MemberRef, ModuleImage, INITIALIZER_NAME},
    },
    Error, Result,
};

/// The external entry point an installed initializer calls.
///
/// The default contract targets `DotShim.Main.Start` in a module named
/// `DotShim`, a parameterless static method returning nothing. The hook
/// module itself is deployed separately; injection only wires up the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContract {
    /// Simple name of the module defining the entry point.
    pub module_name: String,
    /// Namespace-qualified name of the declaring type.
    pub type_name: String,
    /// Name of the entry method.
    pub method_name: String,
}

impl Default for HookContract {
    fn default() -> Self {
        Self {
            module_name: "DotShim".to_string(),
            type_name: "DotShim.Main".to_string(),
            method_name: "Start".to_string(),
        }
    }
}

impl HookContract {
    /// The member reference this contract resolves to at call sites.
    #[must_use]
    pub fn member_ref(&self) -> MemberRef {
        MemberRef {
            module_name: self.module_name.clone(),
            type_name: self.type_name.clone(),
            method_name: self.method_name.clone(),
        }
    }
}

/// Install a module initializer that calls the contract's entry point.
///
/// The initializer is the runtime-special `.cctor` on `<Module>`: static,
/// special-named, taking nothing and returning nothing, with a two
/// instruction body of `call` then `ret`.
///
/// # Errors
/// Returns [`Error::ModuleTypeMissing`] if the module does not declare the
/// `<Module>` pseudo-type, and [`Error::InitializerExists`] if it already
/// has a module initializer. Merging into an existing initializer would
/// change code this tool does not understand, so it refuses instead.
pub fn install_initializer(module: &mut ModuleImage, contract: &HookContract) -> Result<()> {
    let module_type = module
        .module_type()
        .ok_or(Error::ModuleTypeMissing)?;
    if module_type.method(INITIALIZER_NAME).is_some() {
        return Err(Error::InitializerExists(module.identity.name.clone()));
    }

    let token = module.import_reference(contract.member_ref());

    let initializer = MethodDef::new(
        INITIALIZER_NAME,
        MethodAttributes::STATIC
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME
            | MethodAttributes::HIDE_BY_SIG,
        "void",
        vec![],
    )
    .with_body(MethodBody::new(
        0,
        vec![Instruction::Call(token), Instruction::Ret],
    ));

    module.module_type_mut()?.methods.push(initializer);
    Ok(())
}
