//! Load-unit execution
//!
//! Loading a unit resolves every implementation symbol and checks every
//! class name before touching the registries, so a unit that fails to load
//! leaves the runtime as it was.

use crate::category::{CategoryDescriptor, CategoryStatus};
use crate::class::{ClassDescriptor, MethodDescriptor};
use crate::imp::ImpRegistry;
use crate::protocol::Protocol;
use crate::registry::RegistryError;
use crate::runtime::Runtime;
use crate::static_instances::bind_all;
use crate::value::{Object, ObjectRef, Value};
use objrt_abi::{LoadUnit, MethodDef, ProtocolDef, UnitError};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use thiserror::Error;

/// Load failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The unit could not be decoded
    #[error("Invalid load unit: {0}")]
    Unit(#[from] UnitError),

    /// The unit conflicts with the class registry
    #[error("Cannot load unit: {0}")]
    Registry(#[from] RegistryError),

    /// A method names an implementation the embedder did not provide
    #[error("Unresolved implementation {symbol} for {method} in {unit}")]
    UnresolvedImplementation {
        /// Unit name
        unit: String,
        /// Selector of the method
        method: String,
        /// Implementation symbol
        symbol: String,
    },
}

/// What a load did
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Unit name
    pub unit: String,
    /// Selector references interned
    pub selectors: usize,
    /// Classes registered by the unit
    pub registered: Vec<String>,
    /// Classes that linked during the load, including earlier classes
    /// released by this unit
    pub linked: Vec<String>,
    /// Categories merged into their class
    pub categories_applied: usize,
    /// Categories waiting for their class
    pub categories_pending: usize,
    /// Static instances created by the unit, bound or not
    pub static_instances: Vec<ObjectRef>,
}

fn resolve_methods(
    unit: &str,
    methods: &[MethodDef],
    imps: &ImpRegistry,
) -> Result<Vec<MethodDescriptor>, LoadError> {
    methods
        .iter()
        .map(|method| {
            let imp = imps
                .get(&method.imp)
                .ok_or_else(|| LoadError::UnresolvedImplementation {
                    unit: unit.to_string(),
                    method: method.name.clone(),
                    symbol: method.imp.clone(),
                })?;
            Ok(MethodDescriptor::new(
                method.name.clone(),
                Some(method.types.as_str()),
                imp,
            ))
        })
        .collect()
}

fn protocols(defs: &[ProtocolDef]) -> Vec<Arc<Protocol>> {
    defs.iter().map(|def| Arc::new(Protocol::from(def))).collect()
}

impl Runtime {
    /// Decode and load a unit
    pub fn load_bytes(&self, bytes: &[u8], imps: &ImpRegistry) -> Result<LoadReport, LoadError> {
        let unit = LoadUnit::decode(bytes)?;
        self.load_unit(&unit, imps)
    }

    /// Load a unit: intern its selectors, register its classes, apply its
    /// categories and queue its static instances, then run initializers for
    /// every class that linked
    pub fn load_unit(&self, unit: &LoadUnit, imps: &ImpRegistry) -> Result<LoadReport, LoadError> {
        let mut classes = Vec::with_capacity(unit.classes.len());
        let mut seen = FxHashSet::default();
        for def in &unit.classes {
            if !seen.insert(def.name.as_str()) {
                return Err(RegistryError::DuplicateClass(def.name.clone()).into());
            }
            classes.push(ClassDescriptor {
                name: def.name.clone(),
                superclass: def.superclass.clone(),
                instance_size: def.instance_size,
                instance_methods: resolve_methods(&unit.name, &def.instance_methods, imps)?,
                class_methods: resolve_methods(&unit.name, &def.class_methods, imps)?,
                protocols: protocols(&def.protocols),
            });
        }

        let mut categories = Vec::with_capacity(unit.categories.len());
        for def in &unit.categories {
            categories.push(CategoryDescriptor {
                name: def.name.clone(),
                class_name: def.class_name.clone(),
                instance_methods: resolve_methods(&unit.name, &def.instance_methods, imps)?,
                class_methods: resolve_methods(&unit.name, &def.class_methods, imps)?,
                protocols: protocols(&def.protocols),
            });
        }

        let mut report = LoadReport {
            unit: unit.name.clone(),
            selectors: unit.selector_refs.len(),
            ..LoadReport::default()
        };

        let initialize = {
            let mut state = self.lock();
            for class in &classes {
                state.classes.check_available(&class.name)?;
            }

            for selector in &unit.selector_refs {
                state
                    .selectors
                    .intern(&selector.name, selector.types.as_deref());
            }

            let mut linked_ids = Vec::new();
            for class in classes {
                report.registered.push(class.name.clone());
                let resolved = state.resolve_class(class);
                let (_, linked) = state.classes.register(resolved)?;
                linked_ids.extend(linked);
            }

            for category in categories {
                let contribution = state.resolve_category(category);
                match state.classes.apply_category(contribution) {
                    CategoryStatus::Applied => report.categories_applied += 1,
                    CategoryStatus::Pending => report.categories_pending += 1,
                }
            }

            let (linked, _) = state.finish_linking(&linked_ids);

            for group in &unit.static_instances {
                let objects: Vec<ObjectRef> = group
                    .instances
                    .iter()
                    .map(|slots| Object::uninitialized(slots.iter().map(Value::from).collect()))
                    .collect();
                report.static_instances.extend(objects.iter().cloned());
                match state.classes.class_for_name(&group.class_name) {
                    Some(class) => {
                        bind_all(&class, &objects);
                    }
                    None => state.statics.enqueue(&group.class_name, objects),
                }
            }

            report.linked = linked.iter().map(|c| c.name().to_string()).collect();
            linked
        };

        tracing::debug!(
            unit = %report.unit,
            registered = report.registered.len(),
            linked = report.linked.len(),
            "load unit executed"
        );

        self.run_initializers(&initialize);
        Ok(report)
    }
}
