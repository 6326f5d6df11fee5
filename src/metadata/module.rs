//! The in-memory module object graph.
//!
//! [`ModuleImage`] is the unit the whole pipeline operates on: an identity,
//! the ordered list of dependency references the module declares, its types
//! with their methods, embedded resources, and a member-reference table for
//! calls into other modules. The image is loaded through a
//! [`crate::metadata::store::ModuleStore`], edited in memory, and written to
//! a fresh path, never back over its source file.

use bitflags::bitflags;

use crate::{
    metadata::{identity::ModuleIdentity, method::MethodDef},
    Error, Result,
};

/// Name of the special pseudo-type that owns module-level methods.
///
/// Every well-formed module declares it; the hook injector attaches the
/// load-time initializer here.
pub const MODULE_TYPE_NAME: &str = "<Module>";

/// Name of the static module initializer method.
///
/// The runtime guarantees a method of this name on the module pseudo-type
/// runs exactly once, before any other code in the module, the first time
/// the module is touched.
pub const INITIALIZER_NAME: &str = ".cctor";

bitflags! {
    /// Module-level attribute flags.
    ///
    /// Mirrors the runtime header flags that matter for proxying: whether
    /// the module is pure managed and whether it is strong-name signed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleAttributes: u32 {
        /// Contains only managed code; no mixed native content.
        const IL_ONLY = 0x0001;
        /// Requires a 32-bit process.
        const REQUIRED_32BIT = 0x0002;
        /// Carries a strong-name signature.
        const STRONG_NAME_SIGNED = 0x0008;
        /// Has a native entry point.
        const NATIVE_ENTRYPOINT = 0x0010;
    }
}

/// Index of an imported member reference within a module's own table.
///
/// Returned by [`ModuleImage::import_reference`] and consumed by
/// [`crate::metadata::method::Instruction::Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRefToken(pub u32);

/// A reference to a method defined in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Simple name of the module that defines the member.
    pub module_name: String,
    /// Namespace-qualified name of the declaring type.
    pub type_name: String,
    /// Name of the referenced method.
    pub method_name: String,
}

/// A named type declared by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Namespace the type lives in; `None` for the global namespace.
    pub namespace: Option<String>,
    /// Simple type name.
    pub name: String,
    /// Methods declared by the type.
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// Create a type with no methods.
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Look up a declared method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// An embedded binary resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource name.
    pub name: String,
    /// Raw resource payload.
    pub data: Vec<u8>,
}

/// A loadable binary module: identity, dependencies, types, and resources.
///
/// Field order mirrors serialization order in the container codec. The
/// reference list preserves declaration order, which the resolver depends on:
/// resolution is first-match in declaration order by contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImage {
    /// The module's own identity.
    pub identity: ModuleIdentity,
    /// Module-level attribute flags.
    pub attributes: ModuleAttributes,
    /// Dependency identities, in declaration order.
    pub references: Vec<ModuleIdentity>,
    /// Imported member references.
    pub member_refs: Vec<MemberRef>,
    /// Declared types, including the `<Module>` pseudo-type.
    pub types: Vec<TypeDef>,
    /// Embedded resources.
    pub resources: Vec<Resource>,
}

impl ModuleImage {
    /// Create an empty pure-managed module with the given identity.
    ///
    /// The `<Module>` pseudo-type is declared up front, as every compiler
    /// emits it first.
    #[must_use]
    pub fn new(identity: ModuleIdentity) -> Self {
        Self {
            identity,
            attributes: ModuleAttributes::IL_ONLY,
            references: Vec::new(),
            member_refs: Vec::new(),
            types: vec![TypeDef::new(None, MODULE_TYPE_NAME)],
            resources: Vec::new(),
        }
    }

    /// Whether the module contains only managed code.
    #[must_use]
    pub fn is_il_only(&self) -> bool {
        self.attributes.contains(ModuleAttributes::IL_ONLY)
    }

    /// Whether the module is strong-name signed.
    ///
    /// A module is considered signed when its header says so or its identity
    /// carries a public key token.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.attributes.contains(ModuleAttributes::STRONG_NAME_SIGNED)
            || self.identity.is_strongly_named()
    }

    /// Append a dependency reference, preserving declaration order.
    pub fn add_reference(&mut self, reference: ModuleIdentity) {
        self.references.push(reference);
    }

    /// Look up a declared type by simple name.
    #[must_use]
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// The `<Module>` pseudo-type, if declared.
    #[must_use]
    pub fn module_type(&self) -> Option<&TypeDef> {
        self.type_def(MODULE_TYPE_NAME)
    }

    /// Mutable access to the `<Module>` pseudo-type.
    ///
    /// # Errors
    /// Returns [`Error::ModuleTypeMissing`] if the module does not declare
    /// the pseudo-type.
    pub fn module_type_mut(&mut self) -> Result<&mut TypeDef> {
        self.types
            .iter_mut()
            .find(|t| t.name == MODULE_TYPE_NAME)
            .ok_or(Error::ModuleTypeMissing)
    }

    /// Import an external member reference into this module's own table.
    ///
    /// Re-importing an identical reference returns the existing token
    /// instead of growing the table.
    pub fn import_reference(&mut self, member: MemberRef) -> MemberRefToken {
        if let Some(index) = self.member_refs.iter().position(|m| *m == member) {
            return MemberRefToken(index as u32);
        }
        self.member_refs.push(member);
        MemberRefToken((self.member_refs.len() - 1) as u32)
    }

    /// Resolve a member-reference token back to its entry.
    #[must_use]
    pub fn member_ref(&self, token: MemberRefToken) -> Option<&MemberRef> {
        self.member_refs.get(token.0 as usize)
    }

    /// Total number of methods across all declared types.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.types.iter().map(|t| t.methods.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::identity::ModuleVersion;

    fn test_identity(name: &str) -> ModuleIdentity {
        ModuleIdentity::new(name, ModuleVersion::new(1, 0, 0, 0), None, None)
    }

    fn test_member() -> MemberRef {
        MemberRef {
            module_name: "DotShim".to_string(),
            type_name: "DotShim.Main".to_string(),
            method_name: "Start".to_string(),
        }
    }

    #[test]
    fn new_module_declares_pseudo_type() {
        let module = ModuleImage::new(test_identity("MyLib"));
        assert!(module.module_type().is_some());
        assert!(module.is_il_only());
        assert!(!module.is_signed());
    }

    #[test]
    fn import_reference_deduplicates() {
        let mut module = ModuleImage::new(test_identity("MyLib"));

        let first = module.import_reference(test_member());
        let second = module.import_reference(test_member());
        assert_eq!(first, second);
        assert_eq!(module.member_refs.len(), 1);

        let other = module.import_reference(MemberRef {
            method_name: "Stop".to_string(),
            ..test_member()
        });
        assert_ne!(first, other);
        assert_eq!(module.member_refs.len(), 2);
    }

    #[test]
    fn member_ref_lookup_round_trips() {
        let mut module = ModuleImage::new(test_identity("MyLib"));
        let token = module.import_reference(test_member());
        assert_eq!(module.member_ref(token), Some(&test_member()));
    }

    #[test]
    fn signed_follows_token_or_header_flag() {
        let mut module = ModuleImage::new(test_identity("MyLib"));
        assert!(!module.is_signed());

        module.attributes |= ModuleAttributes::STRONG_NAME_SIGNED;
        assert!(module.is_signed());

        let mut keyed = ModuleImage::new(ModuleIdentity::new(
            "Keyed",
            ModuleVersion::new(1, 0, 0, 0),
            None,
            Some(crate::metadata::identity::PublicKeyToken::new([1; 8])),
        ));
        assert!(keyed.is_signed());
        keyed.attributes = ModuleAttributes::IL_ONLY;
        assert!(keyed.is_signed());
    }

    #[test]
    fn missing_pseudo_type_is_a_distinct_error() {
        let mut module = ModuleImage::new(test_identity("MyLib"));
        module.types.clear();

        assert!(matches!(
            module.module_type_mut(),
            Err(Error::ModuleTypeMissing)
        ));
    }
}
