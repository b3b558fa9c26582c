//! objrt load-unit format
//!
//! This crate defines the framed record format in which compiled code hands
//! class, category, selector and static-instance descriptors to the runtime,
//! along with the writer/reader primitives used to encode it.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod unit;

pub use encoder::{DecodeError, UnitReader, UnitWriter};
pub use unit::{
    flags, CategoryDef, ClassDef, ConstValue, LoadUnit, MethodDef, ProtocolDef, SelectorRef,
    StaticInstanceGroup, UnitError,
};
