// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The resource table: a loaded, indexed set of resource descriptors the
manager discovers, enumerates, and grants access to.
*/

use std::collections::HashMap;

use uuid::Uuid;
use vita49::ResourceDescriptor;

use crate::errors::AgentError;

/// A loaded set of resource descriptors, indexed by UUID and by name.
/// Built once at daemon startup by a config loader external to this
/// crate (see `ResourceTableBuilder`), then shared read-only with the
/// manager.
#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
    by_uuid: HashMap<Uuid, ResourceDescriptor>,
}

impl ResourceTable {
    /// Builds an empty resource table.
    pub fn new() -> ResourceTable {
        ResourceTable::default()
    }

    /// Looks up a resource by UUID.
    pub fn by_uuid(&self, uuid: Uuid) -> Option<&ResourceDescriptor> {
        self.by_uuid.get(&uuid)
    }

    /// Looks up a resource by exact, case-sensitive name.
    pub fn by_name(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.by_uuid.values().find(|r| r.name() == name)
    }

    /// Iterates every resource in the table, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.by_uuid.values()
    }

    /// Number of resources in the table.
    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    /// True if the table holds no resources.
    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

/// Builds a [`ResourceTable`] from individually inserted or copied
/// descriptors, mirroring `resource.conf`'s per-section `copy=` handling:
/// a new entry may clone an earlier one's fields (name, channel counts,
/// rate, packet bounds, access, spec tag) and override its UUID.
#[derive(Default)]
pub struct ResourceTableBuilder {
    table: ResourceTable,
}

impl ResourceTableBuilder {
    /// Starts a new, empty builder.
    pub fn new() -> ResourceTableBuilder {
        ResourceTableBuilder::default()
    }

    /// Inserts a fully specified descriptor.
    pub fn insert(mut self, descriptor: ResourceDescriptor) -> ResourceTableBuilder {
        self.table.by_uuid.insert(descriptor.uuid(), descriptor);
        self
    }

    /// Inserts a descriptor that copies every field from the entry named
    /// by `source`, except its UUID is replaced with `uuid`. Returns
    /// `AgentError::ResourceNotFound` if `source` isn't already present.
    pub fn copy_from(
        mut self,
        source: Uuid,
        uuid: Uuid,
    ) -> Result<ResourceTableBuilder, AgentError> {
        let base = self
            .table
            .by_uuid
            .get(&source)
            .ok_or_else(|| AgentError::ResourceNotFound(source.to_string()))?;
        let copy = base.copy_with_uuid(uuid);
        self.table.by_uuid.insert(uuid, copy);
        Ok(self)
    }

    /// Consumes the builder, yielding the finished table.
    pub fn build(self) -> ResourceTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita49::AccessBits;

    fn descriptor(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(
            Uuid::new_v4(),
            name,
            1,
            1,
            61.44,
            64,
            4096,
            AccessBits::empty(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn lookup_by_uuid_and_name() {
        let desc = descriptor("radio0");
        let uuid = desc.uuid();
        let table = ResourceTableBuilder::new().insert(desc).build();
        assert_eq!(table.by_uuid(uuid).unwrap().name(), "radio0");
        assert_eq!(table.by_name("radio0").unwrap().uuid(), uuid);
        assert!(table.by_name("missing").is_none());
    }

    #[test]
    fn copy_from_clones_fields_with_new_uuid() {
        let desc = descriptor("radio0");
        let source_uuid = desc.uuid();
        let new_uuid = Uuid::new_v4();
        let table = ResourceTableBuilder::new()
            .insert(desc)
            .copy_from(source_uuid, new_uuid)
            .unwrap()
            .build();
        assert_eq!(table.len(), 2);
        let copy = table.by_uuid(new_uuid).unwrap();
        assert_eq!(copy.name(), "radio0");
        assert_eq!(copy.uuid(), new_uuid);
    }

    #[test]
    fn copy_from_unknown_source_errors() {
        let result = ResourceTableBuilder::new().copy_from(Uuid::new_v4(), Uuid::new_v4());
        assert!(result.is_err());
    }
}
