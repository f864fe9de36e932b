use std::any::{Any, TypeId};

use depot_core::FileRecord;

use super::{DeterministicNaming, NamingError, NamingResult, NamingStrategy};

struct Route {
    type_id: TypeId,
    type_name: &'static str,
    naming: Box<dyn DeterministicNaming>,
}

/// Picks a strategy by concrete record type. Routes are tried in registration order.
#[derive(Default)]
pub struct DelegatingNaming {
    routes: Vec<Route>,
}

impl DelegatingNaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: FileRecord>(mut self, naming: impl DeterministicNaming + 'static) -> Self {
        self.routes.push(Route {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            naming: Box::new(naming),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn route(&self, record: &dyn FileRecord) -> NamingResult<&dyn DeterministicNaming> {
        let type_id = Any::type_id(record.as_any());
        self.routes
            .iter()
            .find(|route| route.type_id == type_id)
            .map(|route| route.naming.as_ref())
            .ok_or_else(|| NamingError::NoResolver {
                record_type: record.type_name().to_string(),
            })
    }
}

impl std::fmt::Debug for DelegatingNaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatingNaming")
            .field(
                "routes",
                &self.routes.iter().map(|r| r.type_name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl NamingStrategy for DelegatingNaming {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        self.route(record)?.directory_name(record)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        self.route(record)?.file_name(record)
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        self.route(record)?.pathname(record)
    }

    fn replays_persisted_path(&self) -> bool {
        self.routes
            .iter()
            .any(|route| route.naming.replays_persisted_path())
    }
}

impl DeterministicNaming for DelegatingNaming {}
