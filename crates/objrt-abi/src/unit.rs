//! Load-unit format
//!
//! A load unit is what a compiled object file hands the runtime: the classes
//! and categories it defines, the selectors it references and the constant
//! object literals it embeds.
//!
//! ```text
//! header  : magic "OBJR" | version u32 | flags u32 | payload_len u32 | crc32 u32
//! payload : name | selector refs | classes | categories | [static instances]
//! ```
//!
//! The CRC32 covers the payload only. The static instance section is present
//! iff [`flags::HAS_STATIC_INSTANCES`] is set.

use crate::encoder::{DecodeError, UnitReader, UnitWriter};
use thiserror::Error;

/// Magic number for load units: "OBJR"
pub const MAGIC: [u8; 4] = *b"OBJR";

/// Current load-unit format version
pub const VERSION: u32 = 1;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 20;

/// Maximum nesting of inherited protocol records
const MAX_PROTOCOL_DEPTH: usize = 64;

/// Load-unit flags
pub mod flags {
    /// Unit carries a static instance section
    pub const HAS_STATIC_INSTANCES: u32 = 1 << 0;
}

/// Load-unit encoding/decoding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    /// Decode error inside the payload
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected OBJR, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported load unit version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Declared payload length does not match the input
    #[error("Payload length mismatch: header declares {declared} bytes, found {actual}")]
    LengthMismatch {
        /// Length from the header
        declared: usize,
        /// Bytes actually present after the header
        actual: usize,
    },

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// Payload has bytes after its last section
    #[error("Trailing data after load unit payload at offset {0}")]
    TrailingData(usize),
}

/// A selector referenced by the unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRef {
    /// Selector name (e.g. `initWithName:`)
    pub name: String,
    /// Type encoding, if the compiler emitted one
    pub types: Option<String>,
}

impl SelectorRef {
    /// Create a selector reference
    pub fn new(name: impl Into<String>, types: Option<&str>) -> Self {
        Self {
            name: name.into(),
            types: types.map(str::to_string),
        }
    }

    fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_string(&self.name);
        writer.emit_opt_string(self.types.as_deref());
    }

    fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            types: reader.read_opt_string()?,
        })
    }
}

/// Method definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Selector name
    pub name: String,
    /// Type encoding of the method
    pub types: String,
    /// Symbol of the implementation, resolved by the runtime at load time
    pub imp: String,
}

impl MethodDef {
    /// Create a method definition
    pub fn new(name: impl Into<String>, types: impl Into<String>, imp: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: types.into(),
            imp: imp.into(),
        }
    }

    fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_string(&self.name);
        writer.emit_string(&self.types);
        writer.emit_string(&self.imp);
    }

    fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            types: reader.read_string()?,
            imp: reader.read_string()?,
        })
    }
}

fn encode_methods(methods: &[MethodDef], writer: &mut UnitWriter) {
    writer.emit_count(methods.len());
    for method in methods {
        method.encode(writer);
    }
}

fn decode_methods(reader: &mut UnitReader<'_>) -> Result<Vec<MethodDef>, DecodeError> {
    let count = reader.read_count()?;
    let mut methods = Vec::with_capacity(count);
    for _ in 0..count {
        methods.push(MethodDef::decode(reader)?);
    }
    Ok(methods)
}

/// Protocol definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDef {
    /// Protocol name
    pub name: String,
    /// Protocols this one inherits from
    pub inherits: Vec<ProtocolDef>,
}

impl ProtocolDef {
    /// Create a protocol with no parents
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherits: Vec::new(),
        }
    }

    /// Add an inherited protocol
    pub fn inheriting(mut self, parent: ProtocolDef) -> Self {
        self.inherits.push(parent);
        self
    }

    fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_string(&self.name);
        encode_protocols(&self.inherits, writer);
    }

    fn decode(reader: &mut UnitReader<'_>, depth: usize) -> Result<Self, DecodeError> {
        if depth > MAX_PROTOCOL_DEPTH {
            return Err(DecodeError::NestingTooDeep(reader.position()));
        }
        let name = reader.read_string()?;
        let inherits = decode_protocols(reader, depth + 1)?;
        Ok(Self { name, inherits })
    }
}

fn encode_protocols(protocols: &[ProtocolDef], writer: &mut UnitWriter) {
    writer.emit_count(protocols.len());
    for protocol in protocols {
        protocol.encode(writer);
    }
}

fn decode_protocols(
    reader: &mut UnitReader<'_>,
    depth: usize,
) -> Result<Vec<ProtocolDef>, DecodeError> {
    let count = reader.read_count()?;
    let mut protocols = Vec::with_capacity(count);
    for _ in 0..count {
        protocols.push(ProtocolDef::decode(reader, depth)?);
    }
    Ok(protocols)
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Superclass name (None for root classes)
    pub superclass: Option<String>,
    /// Number of instance slots
    pub instance_size: u32,
    /// Instance-side methods
    pub instance_methods: Vec<MethodDef>,
    /// Class-side methods (installed on the metaclass)
    pub class_methods: Vec<MethodDef>,
    /// Adopted protocols
    pub protocols: Vec<ProtocolDef>,
}

impl ClassDef {
    /// Create a root class definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            instance_size: 0,
            instance_methods: Vec::new(),
            class_methods: Vec::new(),
            protocols: Vec::new(),
        }
    }

    /// Set the superclass name
    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Set the number of instance slots
    pub fn with_instance_size(mut self, instance_size: u32) -> Self {
        self.instance_size = instance_size;
        self
    }

    /// Add an instance method
    pub fn instance_method(mut self, name: &str, types: &str, imp: &str) -> Self {
        self.instance_methods.push(MethodDef::new(name, types, imp));
        self
    }

    /// Add a class method
    pub fn class_method(mut self, name: &str, types: &str, imp: &str) -> Self {
        self.class_methods.push(MethodDef::new(name, types, imp));
        self
    }

    /// Adopt a protocol
    pub fn adopting(mut self, protocol: ProtocolDef) -> Self {
        self.protocols.push(protocol);
        self
    }

    fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_string(&self.name);
        writer.emit_opt_string(self.superclass.as_deref());
        writer.emit_u32(self.instance_size);
        encode_methods(&self.instance_methods, writer);
        encode_methods(&self.class_methods, writer);
        encode_protocols(&self.protocols, writer);
    }

    fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            superclass: reader.read_opt_string()?,
            instance_size: reader.read_u32()?,
            instance_methods: decode_methods(reader)?,
            class_methods: decode_methods(reader)?,
            protocols: decode_protocols(reader, 0)?,
        })
    }
}

/// Category definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDef {
    /// Category name
    pub name: String,
    /// Name of the class the category extends
    pub class_name: String,
    /// Instance-side methods
    pub instance_methods: Vec<MethodDef>,
    /// Class-side methods
    pub class_methods: Vec<MethodDef>,
    /// Protocols the category adds to the class
    pub protocols: Vec<ProtocolDef>,
}

impl CategoryDef {
    /// Create an empty category on `class_name`
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            instance_methods: Vec::new(),
            class_methods: Vec::new(),
            protocols: Vec::new(),
        }
    }

    /// Add an instance method
    pub fn instance_method(mut self, name: &str, types: &str, imp: &str) -> Self {
        self.instance_methods.push(MethodDef::new(name, types, imp));
        self
    }

    /// Add a class method
    pub fn class_method(mut self, name: &str, types: &str, imp: &str) -> Self {
        self.class_methods.push(MethodDef::new(name, types, imp));
        self
    }

    /// Adopt a protocol
    pub fn adopting(mut self, protocol: ProtocolDef) -> Self {
        self.protocols.push(protocol);
        self
    }

    fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_string(&self.name);
        writer.emit_string(&self.class_name);
        encode_methods(&self.instance_methods, writer);
        encode_methods(&self.class_methods, writer);
        encode_protocols(&self.protocols, writer);
    }

    fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            class_name: reader.read_string()?,
            instance_methods: decode_methods(reader)?,
            class_methods: decode_methods(reader)?,
            protocols: decode_protocols(reader, 0)?,
        })
    }
}

/// Constant value stored in a static instance slot
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// Nil
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Float
    Float(f64),
    /// UTF-8 string
    Str(String),
}

impl ConstValue {
    const TAG_NIL: u8 = 0;
    const TAG_BOOL: u8 = 1;
    const TAG_INT: u8 = 2;
    const TAG_FLOAT: u8 = 3;
    const TAG_STR: u8 = 4;

    fn encode(&self, writer: &mut UnitWriter) {
        match self {
            ConstValue::Nil => writer.emit_u8(Self::TAG_NIL),
            ConstValue::Bool(b) => {
                writer.emit_u8(Self::TAG_BOOL);
                writer.emit_u8(*b as u8);
            }
            ConstValue::Int(i) => {
                writer.emit_u8(Self::TAG_INT);
                writer.emit_i64(*i);
            }
            ConstValue::Float(f) => {
                writer.emit_u8(Self::TAG_FLOAT);
                writer.emit_f64(*f);
            }
            ConstValue::Str(s) => {
                writer.emit_u8(Self::TAG_STR);
                writer.emit_string(s);
            }
        }
    }

    fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let tag = reader.read_u8()?;
        match tag {
            Self::TAG_NIL => Ok(ConstValue::Nil),
            Self::TAG_BOOL => Ok(ConstValue::Bool(reader.read_u8()? != 0)),
            Self::TAG_INT => Ok(ConstValue::Int(reader.read_i64()?)),
            Self::TAG_FLOAT => Ok(ConstValue::Float(reader.read_f64()?)),
            Self::TAG_STR => Ok(ConstValue::Str(reader.read_string()?)),
            _ => Err(DecodeError::InvalidTag {
                kind: "constant",
                tag,
                offset,
            }),
        }
    }
}

/// Object literals of one class embedded in the unit
#[derive(Debug, Clone, PartialEq)]
pub struct StaticInstanceGroup {
    /// Class the literals are instances of
    pub class_name: String,
    /// Slot values of each literal
    pub instances: Vec<Vec<ConstValue>>,
}

impl StaticInstanceGroup {
    /// Create an empty group for `class_name`
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            instances: Vec::new(),
        }
    }

    /// Add one literal with the given slot values
    pub fn instance(mut self, slots: Vec<ConstValue>) -> Self {
        self.instances.push(slots);
        self
    }

    fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_string(&self.class_name);
        writer.emit_count(self.instances.len());
        for slots in &self.instances {
            writer.emit_count(slots.len());
            for value in slots {
                value.encode(writer);
            }
        }
    }

    fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let class_name = reader.read_string()?;
        let count = reader.read_count()?;
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            let slot_count = reader.read_count()?;
            let mut slots = Vec::with_capacity(slot_count);
            for _ in 0..slot_count {
                slots.push(ConstValue::decode(reader)?);
            }
            instances.push(slots);
        }
        Ok(Self {
            class_name,
            instances,
        })
    }
}

/// A decoded load unit
#[derive(Debug, Clone, PartialEq)]
pub struct LoadUnit {
    /// Format version
    pub version: u32,
    /// Unit flags
    pub flags: u32,
    /// Unit name (usually the source object file)
    pub name: String,
    /// Selectors referenced by the unit
    pub selector_refs: Vec<SelectorRef>,
    /// Classes defined by the unit
    pub classes: Vec<ClassDef>,
    /// Categories defined by the unit
    pub categories: Vec<CategoryDef>,
    /// Static instances embedded in the unit
    pub static_instances: Vec<StaticInstanceGroup>,
}

impl LoadUnit {
    /// Create an empty unit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: VERSION,
            flags: 0,
            name: name.into(),
            selector_refs: Vec::new(),
            classes: Vec::new(),
            categories: Vec::new(),
            static_instances: Vec::new(),
        }
    }

    /// Add a selector reference
    pub fn with_selector(mut self, name: &str, types: Option<&str>) -> Self {
        self.selector_refs.push(SelectorRef::new(name, types));
        self
    }

    /// Add a class
    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.classes.push(class);
        self
    }

    /// Add a category
    pub fn with_category(mut self, category: CategoryDef) -> Self {
        self.categories.push(category);
        self
    }

    /// Add a static instance group (sets [`flags::HAS_STATIC_INSTANCES`])
    pub fn with_static_instances(mut self, group: StaticInstanceGroup) -> Self {
        self.flags |= flags::HAS_STATIC_INSTANCES;
        self.static_instances.push(group);
        self
    }

    /// Whether the unit carries a static instance section
    pub fn has_static_instances(&self) -> bool {
        (self.flags & flags::HAS_STATIC_INSTANCES) != 0
    }

    /// Encode the unit
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = UnitWriter::new();

        writer.emit_bytes(&MAGIC);
        writer.emit_u32(self.version);
        writer.emit_u32(self.flags);
        let len_offset = writer.reserve_u32();
        let crc_offset = writer.reserve_u32();

        writer.emit_string(&self.name);

        writer.emit_count(self.selector_refs.len());
        for sel in &self.selector_refs {
            sel.encode(&mut writer);
        }

        writer.emit_count(self.classes.len());
        for class in &self.classes {
            class.encode(&mut writer);
        }

        writer.emit_count(self.categories.len());
        for category in &self.categories {
            category.encode(&mut writer);
        }

        if self.has_static_instances() {
            writer.emit_count(self.static_instances.len());
            for group in &self.static_instances {
                group.encode(&mut writer);
            }
        }

        let payload_len = writer.offset() - HEADER_LEN;
        let crc32 = crc32fast::hash(&writer.buffer()[HEADER_LEN..]);
        writer.patch_u32(len_offset, payload_len as u32);
        writer.patch_u32(crc_offset, crc32);

        writer.into_bytes()
    }

    /// Decode a unit, validating header, length and checksum
    pub fn decode(data: &[u8]) -> Result<Self, UnitError> {
        let mut reader = UnitReader::new(data);

        let magic: [u8; 4] = reader.read_array()?;
        if magic != MAGIC {
            return Err(UnitError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(UnitError::UnsupportedVersion(version));
        }

        let flags = reader.read_u32()?;
        let declared = reader.read_u32()? as usize;
        let stored_crc32 = reader.read_u32()?;

        let payload = &data[HEADER_LEN..];
        if declared != payload.len() {
            return Err(UnitError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        let calculated = crc32fast::hash(payload);
        if calculated != stored_crc32 {
            return Err(UnitError::ChecksumMismatch {
                expected: stored_crc32,
                actual: calculated,
            });
        }

        let name = reader.read_string()?;

        let count = reader.read_count()?;
        let mut selector_refs = Vec::with_capacity(count);
        for _ in 0..count {
            selector_refs.push(SelectorRef::decode(&mut reader)?);
        }

        let count = reader.read_count()?;
        let mut classes = Vec::with_capacity(count);
        for _ in 0..count {
            classes.push(ClassDef::decode(&mut reader)?);
        }

        let count = reader.read_count()?;
        let mut categories = Vec::with_capacity(count);
        for _ in 0..count {
            categories.push(CategoryDef::decode(&mut reader)?);
        }

        let mut static_instances = Vec::new();
        if (flags & flags::HAS_STATIC_INSTANCES) != 0 {
            let count = reader.read_count()?;
            static_instances.reserve(count);
            for _ in 0..count {
                static_instances.push(StaticInstanceGroup::decode(&mut reader)?);
            }
        }

        if reader.has_more() {
            return Err(UnitError::TrailingData(reader.position()));
        }

        Ok(Self {
            version,
            flags,
            name,
            selector_refs,
            classes,
            categories,
            static_instances,
        })
    }
}
