//! Loading and persisting module images.
//!
//! The pipeline never parses raw bytes itself; it talks to a [`ModuleStore`],
//! the seam behind which the binary reader/writer lives. [`ImageStore`] is
//! the shipped implementation: a versioned little-endian container format
//! for [`ModuleImage`] with memory-mapped reads and bounds-checked decoding.
//! A backend for another physical format only needs to implement the trait.
//!
//! Encoding is deterministic, meaning the same image always serializes to the
//! same bytes, so re-running a pipeline over unchanged inputs reproduces its
//! output exactly.

use std::{fs::File, io::Write, path::Path};

use memmap2::Mmap;

use crate::{
    metadata::{
        identity::{ModuleIdentity, ModuleVersion, PublicKeyToken},
        method::{Instruction, MethodAttributes, MethodBody, MethodDef, MethodImplAttributes},
        module::{MemberRef, MemberRefToken, ModuleAttributes, ModuleImage, Resource, TypeDef},
    },
    Error, Result,
};

/// Container magic, first four bytes of every image file.
pub const IMAGE_MAGIC: &[u8; 4] = b"DSIM";

/// Container format version this library reads and writes.
pub const IMAGE_FORMAT_VERSION: u16 = 1;

// Key encoding discriminants in identity records.
const KEY_NONE: u8 = 0;
const KEY_TOKEN: u8 = 1;
const KEY_FULL: u8 = 2;

// Instruction opcodes.
const OP_NOP: u8 = 0x00;
const OP_LDARG: u8 = 0x01;
const OP_LDC_I4: u8 = 0x02;
const OP_ADD: u8 = 0x03;
const OP_POP: u8 = 0x04;
const OP_CALL: u8 = 0x05;
const OP_RET: u8 = 0x06;

/// Reader/writer collaborator for module files.
///
/// `open` fully materializes the object graph; the file handle does not
/// outlive the call. `write` serializes to a fresh file, truncating any
/// previous content at that path.
pub trait ModuleStore {
    /// Open and decode the module at `path`.
    ///
    /// # Errors
    /// Returns a parse error ([`Error::NotSupported`], [`Error::Malformed`],
    /// [`Error::OutOfBounds`], [`Error::Empty`]) for files that are not
    /// valid module containers, or [`Error::FileError`] for I/O failures.
    fn open(&self, path: &Path) -> Result<ModuleImage>;

    /// Encode `module` and write it to `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be created or written.
    fn write(&self, module: &ModuleImage, path: &Path) -> Result<()>;
}

/// The container-format implementation of [`ModuleStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageStore;

impl ImageStore {
    /// Create a store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode a module image from an in-memory buffer.
    ///
    /// # Errors
    /// Same taxonomy as [`ModuleStore::open`], minus I/O.
    pub fn decode(data: &[u8]) -> Result<ModuleImage> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let mut reader = ImageReader::new(data);

        if reader.read_bytes(4)? != IMAGE_MAGIC {
            return Err(Error::NotSupported);
        }
        let format = reader.read_u16()?;
        if format != IMAGE_FORMAT_VERSION {
            return Err(Error::NotSupported);
        }

        let identity = reader.read_identity()?;
        let attributes = ModuleAttributes::from_bits_retain(reader.read_u32()?);

        let reference_count = reader.read_u32()?;
        let mut references = Vec::with_capacity(reader.capacity_hint(reference_count));
        for _ in 0..reference_count {
            references.push(reader.read_identity()?);
        }

        let member_ref_count = reader.read_u32()?;
        let mut member_refs = Vec::with_capacity(reader.capacity_hint(member_ref_count));
        for _ in 0..member_ref_count {
            member_refs.push(MemberRef {
                module_name: reader.read_string()?,
                type_name: reader.read_string()?,
                method_name: reader.read_string()?,
            });
        }

        let type_count = reader.read_u32()?;
        let mut types = Vec::with_capacity(reader.capacity_hint(type_count));
        for _ in 0..type_count {
            types.push(reader.read_type()?);
        }

        let resource_count = reader.read_u32()?;
        let mut resources = Vec::with_capacity(reader.capacity_hint(resource_count));
        for _ in 0..resource_count {
            let name = reader.read_string()?;
            let data = reader.read_blob()?.to_vec();
            resources.push(Resource { name, data });
        }

        Ok(ModuleImage {
            identity,
            attributes,
            references,
            member_refs,
            types,
            resources,
        })
    }

    /// Encode a module image to bytes.
    #[must_use]
    pub fn encode(module: &ModuleImage) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);

        out.extend_from_slice(IMAGE_MAGIC);
        write_u16(&mut out, IMAGE_FORMAT_VERSION);

        write_identity(&mut out, &module.identity);
        write_u32(&mut out, module.attributes.bits());

        write_u32(&mut out, module.references.len() as u32);
        for reference in &module.references {
            write_identity(&mut out, reference);
        }

        write_u32(&mut out, module.member_refs.len() as u32);
        for member in &module.member_refs {
            write_string(&mut out, &member.module_name);
            write_string(&mut out, &member.type_name);
            write_string(&mut out, &member.method_name);
        }

        write_u32(&mut out, module.types.len() as u32);
        for type_def in &module.types {
            write_type(&mut out, type_def);
        }

        write_u32(&mut out, module.resources.len() as u32);
        for resource in &module.resources {
            write_string(&mut out, &resource.name);
            write_blob(&mut out, &resource.data);
        }

        out
    }
}

impl ModuleStore for ImageStore {
    fn open(&self, path: &Path) -> Result<ModuleImage> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::Empty);
        }

        // Safety: the mapping is read-only and dropped before this call
        // returns; the decoded image owns all of its data.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::decode(&mmap)
    }

    fn write(&self, module: &ModuleImage, path: &Path) -> Result<()> {
        let data = Self::encode(module);
        let mut file = File::create(path)?;
        file.write_all(&data)?;
        Ok(())
    }
}

/// Bounds-checked cursor over an image buffer.
struct ImageReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ImageReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bounded capacity for a declared element count.
    ///
    /// Every encoded element occupies at least one byte, so a count beyond
    /// the remaining buffer length can never be satisfied; capping the
    /// pre-allocation there keeps a hostile count from forcing a huge
    /// allocation before the per-element reads fail with
    /// [`Error::OutOfBounds`].
    fn capacity_hint(&self, declared: u32) -> usize {
        (declared as usize).min(self.data.len() - self.pos)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::OutOfBounds)?;
        if end > self.data.len() {
            return Err(Error::OutOfBounds);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_blob(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_blob()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| malformed_error!("Invalid UTF-8 in string at offset {}", self.pos))
    }

    fn read_opt_string(&mut self) -> Result<Option<String>> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_string()?)),
            other => Err(malformed_error!("Invalid option discriminant: {}", other)),
        }
    }

    fn read_identity(&mut self) -> Result<ModuleIdentity> {
        let name = self.read_string()?;
        let version = ModuleVersion::new(
            self.read_u16()?,
            self.read_u16()?,
            self.read_u16()?,
            self.read_u16()?,
        );
        let culture = self.read_opt_string()?;

        let public_key_token = match self.read_u8()? {
            KEY_NONE => None,
            KEY_TOKEN => {
                let bytes = self.read_bytes(8)?;
                let mut token = [0u8; 8];
                token.copy_from_slice(bytes);
                Some(PublicKeyToken::new(token))
            }
            // Full public key: the token is derived, not stored.
            KEY_FULL => {
                let key = self.read_blob()?;
                Some(PublicKeyToken::from_public_key(key))
            }
            other => Err(malformed_error!("Invalid key discriminant: {}", other))?,
        };

        Ok(ModuleIdentity {
            name,
            version,
            culture,
            public_key_token,
        })
    }

    fn read_type(&mut self) -> Result<TypeDef> {
        let namespace = self.read_opt_string()?;
        let name = self.read_string()?;

        let method_count = self.read_u32()?;
        let mut methods = Vec::with_capacity(self.capacity_hint(method_count));
        for _ in 0..method_count {
            methods.push(self.read_method()?);
        }

        Ok(TypeDef {
            namespace,
            name,
            methods,
        })
    }

    fn read_method(&mut self) -> Result<MethodDef> {
        let name = self.read_string()?;
        let attributes = MethodAttributes::from_bits_retain(self.read_u16()?);
        let impl_attributes = MethodImplAttributes::from_bits_retain(self.read_u16()?);
        let return_type = self.read_string()?;

        let param_count = self.read_u32()?;
        let mut params = Vec::with_capacity(self.capacity_hint(param_count));
        for _ in 0..param_count {
            params.push(self.read_string()?);
        }

        let body = match self.read_u8()? {
            0 => None,
            1 => {
                let max_stack = self.read_u16()?;
                let instruction_count = self.read_u32()?;
                let mut instructions = Vec::with_capacity(self.capacity_hint(instruction_count));
                for _ in 0..instruction_count {
                    instructions.push(self.read_instruction()?);
                }
                Some(MethodBody {
                    max_stack,
                    instructions,
                })
            }
            other => return Err(malformed_error!("Invalid body discriminant: {}", other)),
        };

        Ok(MethodDef {
            name,
            attributes,
            impl_attributes,
            return_type,
            params,
            body,
        })
    }

    fn read_instruction(&mut self) -> Result<Instruction> {
        match self.read_u8()? {
            OP_NOP => Ok(Instruction::Nop),
            OP_LDARG => Ok(Instruction::Ldarg(self.read_u16()?)),
            OP_LDC_I4 => Ok(Instruction::LdcI4(self.read_i32()?)),
            OP_ADD => Ok(Instruction::Add),
            OP_POP => Ok(Instruction::Pop),
            OP_CALL => Ok(Instruction::Call(MemberRefToken(self.read_u32()?))),
            OP_RET => Ok(Instruction::Ret),
            other => Err(malformed_error!("Unknown opcode: 0x{:02x}", other)),
        }
    }
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_blob(out: &mut Vec<u8>, data: &[u8]) {
    write_u32(out, data.len() as u32);
    out.extend_from_slice(data);
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_blob(out, value.as_bytes());
}

fn write_opt_string(out: &mut Vec<u8>, value: Option<&str>) {
    match value {
        None => out.push(0),
        Some(s) => {
            out.push(1);
            write_string(out, s);
        }
    }
}

fn write_identity(out: &mut Vec<u8>, identity: &ModuleIdentity) {
    write_string(out, &identity.name);
    write_u16(out, identity.version.major);
    write_u16(out, identity.version.minor);
    write_u16(out, identity.version.build);
    write_u16(out, identity.version.revision);
    write_opt_string(out, identity.culture.as_deref());

    match &identity.public_key_token {
        None => out.push(KEY_NONE),
        Some(token) => {
            out.push(KEY_TOKEN);
            out.extend_from_slice(token.as_bytes());
        }
    }
}

fn write_type(out: &mut Vec<u8>, type_def: &TypeDef) {
    write_opt_string(out, type_def.namespace.as_deref());
    write_string(out, &type_def.name);

    write_u32(out, type_def.methods.len() as u32);
    for method in &type_def.methods {
        write_method(out, method);
    }
}

fn write_method(out: &mut Vec<u8>, method: &MethodDef) {
    write_string(out, &method.name);
    write_u16(out, method.attributes.bits());
    write_u16(out, method.impl_attributes.bits());
    write_string(out, &method.return_type);

    write_u32(out, method.params.len() as u32);
    for param in &method.params {
        write_string(out, param);
    }

    match &method.body {
        None => out.push(0),
        Some(body) => {
            out.push(1);
            write_u16(out, body.max_stack);
            write_u32(out, body.instructions.len() as u32);
            for instruction in &body.instructions {
                write_instruction(out, instruction);
            }
        }
    }
}

fn write_instruction(out: &mut Vec<u8>, instruction: &Instruction) {
    match instruction {
        Instruction::Nop => out.push(OP_NOP),
        Instruction::Ldarg(index) => {
            out.push(OP_LDARG);
            write_u16(out, *index);
        }
        Instruction::LdcI4(value) => {
            out.push(OP_LDC_I4);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Instruction::Add => out.push(OP_ADD),
        Instruction::Pop => out.push(OP_POP),
        Instruction::Call(token) => {
            out.push(OP_CALL);
            write_u32(out, token.0);
        }
        Instruction::Ret => out.push(OP_RET),
    }
}
