//! Method definitions and their executable bodies.
//!
//! A [`MethodDef`] carries the declared surface (name, attributes, signature)
//! separately from its optional [`MethodBody`]. Abstract and forwarded
//! methods have no body at all; everything else carries an instruction
//! stream. The instruction set here is deliberately small; the pipeline
//! only ever inspects bodies for "has executable content", rewrites them to
//! a lone `ret`, or assembles a `call` + `ret` initializer.

use bitflags::bitflags;

use crate::metadata::module::MemberRefToken;

bitflags! {
    /// Declared method attributes (access, dispatch, naming).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u16 {
        /// Accessible to any caller.
        const PUBLIC = 0x0006;
        /// Defined on the type rather than per-instance.
        const STATIC = 0x0010;
        /// Hidden by name and signature rather than name alone.
        const HIDE_BY_SIG = 0x0080;
        /// Name carries special meaning to tooling.
        const SPECIAL_NAME = 0x0800;
        /// Name carries special meaning to the runtime itself.
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    /// Implementation-level method attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodImplAttributes: u16 {
        /// The runtime must never inline this method.
        const NO_INLINING = 0x0008;
        /// The runtime should inline this method aggressively.
        const AGGRESSIVE_INLINING = 0x0100;
    }
}

/// A single instruction in a method body's stream.
///
/// Operand-carrying variants encode their operand inline; everything the
/// proxy pipeline emits is covered by [`Instruction::Call`] and
/// [`Instruction::Ret`], the rest exists so realistic bodies can be
/// represented, stored, and stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// No operation.
    Nop,
    /// Load an argument by index onto the stack.
    Ldarg(u16),
    /// Load a 32-bit integer constant onto the stack.
    LdcI4(i32),
    /// Add the two topmost stack values.
    Add,
    /// Discard the topmost stack value.
    Pop,
    /// Call the referenced external method.
    Call(MemberRefToken),
    /// Return to the caller.
    Ret,
}

/// Executable content of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Maximum evaluation stack depth the body requires.
    pub max_stack: u16,
    /// The instruction stream, executed front to back.
    pub instructions: Vec<Instruction>,
}

impl MethodBody {
    /// Create a body from an instruction stream.
    #[must_use]
    pub fn new(max_stack: u16, instructions: Vec<Instruction>) -> Self {
        Self {
            max_stack,
            instructions,
        }
    }

    /// A body that does nothing but return.
    ///
    /// This is what every stripped method is left with.
    #[must_use]
    pub fn ret() -> Self {
        Self {
            max_stack: 0,
            instructions: vec![Instruction::Ret],
        }
    }

    /// Whether this body is a bare unconditional return.
    #[must_use]
    pub fn is_empty_return(&self) -> bool {
        self.instructions == [Instruction::Ret]
    }
}

/// A method declared by a type.
///
/// The declared surface (name, attributes, signature) is what callers link
/// against and survives stripping untouched; only [`MethodDef::body`] and
/// the inlining bits of [`MethodDef::impl_attributes`] are rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Method name.
    pub name: String,
    /// Declared attributes.
    pub attributes: MethodAttributes,
    /// Implementation attributes, including inlining hints.
    pub impl_attributes: MethodImplAttributes,
    /// Return type name; `"void"` for no return value.
    pub return_type: String,
    /// Parameter type names, in declaration order.
    pub params: Vec<String>,
    /// Executable body, if the method has one.
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Create a bodiless method definition.
    pub fn new(
        name: impl Into<String>,
        attributes: MethodAttributes,
        return_type: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            attributes,
            impl_attributes: MethodImplAttributes::empty(),
            return_type: return_type.into(),
            params,
            body: None,
        }
    }

    /// Attach a body, builder-style.
    #[must_use]
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Whether the method carries executable content.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ret_body_is_empty_return() {
        assert!(MethodBody::ret().is_empty_return());

        let busy = MethodBody::new(
            2,
            vec![Instruction::LdcI4(1), Instruction::LdcI4(2), Instruction::Add, Instruction::Pop, Instruction::Ret],
        );
        assert!(!busy.is_empty_return());
    }

    #[test]
    fn bodiless_method_reports_no_body() {
        let method = MethodDef::new(
            "Abstract",
            MethodAttributes::PUBLIC,
            "void",
            vec![],
        );
        assert!(!method.has_body());
        assert!(method.with_body(MethodBody::ret()).has_body());
    }

    #[test]
    fn inlining_flags_are_independent() {
        let mut flags = MethodImplAttributes::AGGRESSIVE_INLINING;
        flags.remove(MethodImplAttributes::AGGRESSIVE_INLINING);
        flags.insert(MethodImplAttributes::NO_INLINING);
        assert_eq!(flags, MethodImplAttributes::NO_INLINING);
    }
}
