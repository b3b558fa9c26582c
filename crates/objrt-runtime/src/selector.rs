//! Selector registry
//!
//! Interns message names into small integer uids. The name is the interning
//! key: every declaration of `foo:` shares one uid no matter which type
//! encoding it was declared with. uid 0 is never assigned.

use crate::hashtable::StringTable;
use crate::options::TypeMismatchPolicy;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Largest uid the sparse dispatch index can address
#[cfg(not(feature = "seluid24"))]
pub const MAX_SELECTOR_UID: u32 = 0xFFFF;

/// Largest uid the sparse dispatch index can address
#[cfg(feature = "seluid24")]
pub const MAX_SELECTOR_UID: u32 = 0xFF_FFFF;

/// An interned selector
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sel(u32);

impl Sel {
    /// Wrap a raw uid. Lookups with a uid that was never interned simply miss.
    pub const fn from_uid(uid: u32) -> Self {
        Sel(uid)
    }

    /// The selector's uid
    #[inline]
    pub const fn uid(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Sel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sel({})", self.0)
    }
}

/// Lookup of a name that was never interned
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Selector not found: {name}")]
pub struct SelectorNotFoundError {
    /// The name that was looked up
    pub name: String,
}

#[derive(Debug, Clone)]
struct SelectorInfo {
    name: Arc<str>,
    types: Option<Arc<str>>,
}

/// Name → uid interning table
#[derive(Debug)]
pub struct SelectorRegistry {
    table: StringTable<Sel>,
    entries: Vec<SelectorInfo>,
    mismatch: TypeMismatchPolicy,
}

impl SelectorRegistry {
    /// Create an empty registry
    pub fn new(initial_capacity: usize, mismatch: TypeMismatchPolicy) -> Self {
        Self {
            table: StringTable::with_capacity(initial_capacity),
            entries: Vec::new(),
            mismatch,
        }
    }

    /// Intern `name`, returning its uid.
    ///
    /// An existing selector keeps the type encoding it was first interned
    /// with. An absent encoding is filled in by the first declaration that
    /// has one.
    pub fn intern(&mut self, name: &str, types: Option<&str>) -> Sel {
        let types = types.filter(|t| !t.is_empty());

        if let Some(&sel) = self.table.get(name) {
            self.reconcile_types(sel, types);
            return sel;
        }

        let uid = self.entries.len() as u32 + 1;
        if uid > MAX_SELECTOR_UID {
            fatal!("Out of selector slots while interning {}", name);
        }

        let name: Arc<str> = Arc::from(name);
        self.entries.push(SelectorInfo {
            name: name.clone(),
            types: types.map(Arc::from),
        });
        let sel = Sel(uid);
        self.table.insert(name, sel);
        sel
    }

    /// Record `types` for an interned selector: fills an absent encoding,
    /// reports a conflicting one
    pub(crate) fn reconcile_types(&mut self, sel: Sel, types: Option<&str>) {
        let Some(types) = types.filter(|t| !t.is_empty()) else {
            return;
        };
        let Some(info) = (sel.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.entries.get_mut(i))
        else {
            return;
        };
        let Some(existing) = &info.types else {
            info.types = Some(Arc::from(types));
            return;
        };
        if &**existing != types && self.mismatch == TypeMismatchPolicy::Warn {
            tracing::warn!(
                selector = %info.name,
                kept = %existing,
                ignored = %types,
                "selector re-declared with a different type encoding"
            );
        }
    }

    /// Look up the uid of an already interned name
    pub fn lookup(&self, name: &str) -> Result<Sel, SelectorNotFoundError> {
        self.table
            .get(name)
            .copied()
            .ok_or_else(|| SelectorNotFoundError {
                name: name.to_string(),
            })
    }

    fn info(&self, sel: Sel) -> Option<&SelectorInfo> {
        (sel.0 as usize).checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Name of an interned selector
    pub fn name(&self, sel: Sel) -> Option<&Arc<str>> {
        self.info(sel).map(|info| &info.name)
    }

    /// Type encoding of an interned selector
    pub fn types(&self, sel: Sel) -> Option<&Arc<str>> {
        self.info(sel).and_then(|info| info.types.as_ref())
    }

    /// Whether `sel` was handed out by this registry
    pub fn contains(&self, sel: Sel) -> bool {
        self.info(sel).is_some()
    }

    /// Number of interned selectors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every interned selector. uids restart at 1.
    pub fn clear(&mut self) {
        self.table.clear();
        self.entries.clear();
    }

    /// Human-readable name for diagnostics
    pub(crate) fn describe(&self, sel: Sel) -> String {
        match self.name(sel) {
            Some(name) => name.to_string(),
            None => format!("<uid {}>", sel.0),
        }
    }
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        Self::new(16, TypeMismatchPolicy::Warn)
    }
}
