//! Shared fixtures for unit tests

use crate::context::ApplyContext;
use crate::guard::{ensure_unique, renamed_to};
use crate::resource::Resource;
use crate::types::{Change, ChangeSet, Ensure};
use graphkit::{Client, EntityKind, Error, Group, MockBackend, Result};
use std::sync::Arc;

/// Context over a fresh mock backend
pub fn context() -> (MockBackend, ApplyContext) {
    let mock = MockBackend::new();
    let ctx = ApplyContext::new(Client::with_backend(Arc::new(mock.clone())));
    (mock, ctx)
}

/// Minimal group resource managing only the display name
#[derive(Debug, Clone)]
pub struct TestGroup {
    name: String,
    id: Option<String>,
    display_name: String,
    ensure: Ensure,
    guard: bool,
}

impl TestGroup {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            display_name: display_name.to_string(),
            ensure: Ensure::Present,
            guard: false,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn absent(mut self) -> Self {
        self.ensure = Ensure::Absent;
        self
    }

    pub fn guarded(mut self) -> Self {
        self.guard = true;
        self
    }

    fn desired(&self) -> Group {
        Group {
            display_name: Some(self.display_name.clone()),
            ..Group::default()
        }
    }
}

impl Resource for TestGroup {
    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn ensure(&self) -> Ensure {
        self.ensure
    }

    fn description(&self) -> String {
        format!("Group {}", self.display_name)
    }

    fn check(&self, ctx: &ApplyContext, id: Option<&str>, changes: &[Change]) -> Result<()> {
        let name = match id {
            None => Some(self.display_name.as_str()),
            Some(_) => renamed_to(changes),
        };
        match name {
            Some(name) if self.guard => ensure_unique::<Group>(&ctx.client, name, id),
            _ => Ok(()),
        }
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<Group>().get(id)? else {
            return Ok(None);
        };
        let mut changes = ChangeSet::new();
        changes.field(
            "display_name",
            current.display_name.as_ref(),
            Some(&self.display_name),
        );
        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        if self.guard {
            ensure_unique::<Group>(&ctx.client, &self.display_name, None)?;
        }
        let created = ctx.client.accessor::<Group>().create(&self.desired(), &[])?;
        created
            .id
            .ok_or_else(|| Error::InvalidResponse("created group has no id".to_string()))
    }

    fn update(&self, ctx: &ApplyContext, id: &str, _changes: &[Change]) -> Result<()> {
        ctx.client.accessor::<Group>().update(id, &self.desired())
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        if ctx.client.accessor::<Group>().delete(id)? {
            Ok(())
        } else {
            Err(Error::not_found(EntityKind::Group, id))
        }
    }
}
