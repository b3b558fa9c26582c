//! Protocols adopted by classes and categories

use objrt_abi::ProtocolDef;
use std::sync::Arc;

/// A named protocol and the protocols it inherits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    name: Arc<str>,
    inherits: Vec<Arc<Protocol>>,
}

impl Protocol {
    /// Create a protocol with no parents
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_parents(name, Vec::new())
    }

    /// Create a protocol inheriting `parents`
    pub fn with_parents(name: &str, parents: Vec<Arc<Protocol>>) -> Arc<Self> {
        Arc::new(Protocol {
            name: Arc::from(name),
            inherits: parents,
        })
    }

    /// Protocol name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directly inherited protocols
    pub fn inherits(&self) -> &[Arc<Protocol>] {
        &self.inherits
    }

    /// Whether this protocol is `name` or inherits it, directly or not
    pub fn conforms_to(&self, name: &str) -> bool {
        let mut stack: Vec<&Protocol> = vec![self];
        while let Some(protocol) = stack.pop() {
            if &*protocol.name == name {
                return true;
            }
            stack.extend(protocol.inherits.iter().map(|p| &**p));
        }
        false
    }
}

impl From<&ProtocolDef> for Protocol {
    fn from(def: &ProtocolDef) -> Self {
        Protocol {
            name: Arc::from(def.name.as_str()),
            inherits: def
                .inherits
                .iter()
                .map(|parent| Arc::new(Protocol::from(parent)))
                .collect(),
        }
    }
}
