//! Domain resource
//!
//! A domain's object ID is its fully qualified name, so there is no display
//! name to guard. Creating a domain that already exists is reported as a
//! duplicate at plan time instead.

use converge::{ApplyContext, Change, ChangeSet, Ensure, Resource};
use graphkit::{Domain, EntityKind, Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::{create_unowned, delete_entity, touches, validate_one_of};

static FQDN: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^(?i)([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
});

const AUTHENTICATION_TYPES: &[&str] = &["Managed", "Federated"];

const PATCHED_FIELDS: &[&str] = &["authentication_type", "is_default", "supported_services"];

/// A `[[domain]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainResource {
    pub name: String,
    /// Set once the domain is managed; equal to `domain_name`
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    pub domain_name: String,
    #[serde(default)]
    pub authentication_type: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub supported_services: Option<Vec<String>>,
}

impl DomainResource {
    fn desired(&self) -> Domain {
        Domain {
            authentication_type: self.authentication_type.clone(),
            is_default: self.is_default,
            supported_services: self.supported_services.clone(),
            ..Domain::default()
        }
    }
}

impl Resource for DomainResource {
    fn kind(&self) -> EntityKind {
        EntityKind::Domain
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
        format!("Domain {}", self.domain_name)
    }

    fn validate(&self) -> Result<()> {
        let kind = EntityKind::Domain;
        let pattern = FQDN.as_ref().map_err(|e| Error::Config(e.to_string()))?;
        if !pattern.is_match(&self.domain_name) {
            return Err(Error::validation(
                kind,
                "domain_name",
                format!("{:?} is not a fully qualified domain name", self.domain_name),
            ));
        }
        if let Some(id) = &self.id
            && !id.eq_ignore_ascii_case(&self.domain_name)
        {
            return Err(Error::validation(
                kind,
                "id",
                format!("must equal domain_name {:?}", self.domain_name),
            ));
        }
        if let Some(auth) = &self.authentication_type {
            validate_one_of(kind, "authentication_type", auth, AUTHENTICATION_TYPES)?;
        }
        Ok(())
    }

    fn check(&self, ctx: &ApplyContext, id: Option<&str>, _changes: &[Change]) -> Result<()> {
        if id.is_some() {
            return Ok(());
        }
        match ctx.client.accessor::<Domain>().get(&self.domain_name)? {
            Some(existing) => Err(Error::DuplicateName {
                kind: EntityKind::Domain,
                name: self.domain_name.clone(),
                existing_id: existing.id.unwrap_or_else(|| self.domain_name.clone()),
            }),
            None => Ok(()),
        }
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<Domain>().get(id)? else {
            return Ok(None);
        };

        let mut changes = ChangeSet::new();
        changes
            .field(
                "authentication_type",
                current.authentication_type.as_ref(),
                self.authentication_type.as_ref(),
            )
            .field(
                "is_default",
                current.is_default.as_ref(),
                self.is_default.as_ref(),
            )
            .set(
                "supported_services",
                current.supported_services.as_deref().unwrap_or_default(),
                self.supported_services.as_deref(),
            );
        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        let domain = Domain {
            id: Some(self.domain_name.clone()),
            ..self.desired()
        };
        let id = create_unowned(ctx, &domain)?;

        let verified = ctx
            .client
            .accessor::<Domain>()
            .get(&id)?
            .and_then(|domain| domain.is_verified)
            .unwrap_or(false);
        if !verified {
            log::warn!("domain {id} is not verified yet; add the DNS records the tenant expects");
        }
        Ok(id)
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        if !touches(changes, PATCHED_FIELDS) {
            return Ok(());
        }
        let mut journal = ctx.journal(EntityKind::Domain, Some(id));
        let accessor = ctx.client.accessor::<Domain>();
        let desired = self.desired();
        journal.step("updating domain", || accessor.update(id, &desired))
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        delete_entity::<Domain>(ctx, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::*;
    use converge::{Action, plan_resource};
    use graphkit::backend::Call;
    use serde_json::json;

    fn contoso() -> DomainResource {
        DomainResource {
            name: "contoso".into(),
            id: None,
            ensure: Ensure::Present,
            domain_name: "contoso.com".into(),
            authentication_type: Some("Managed".into()),
            is_default: None,
            supported_services: None,
        }
    }

    #[test]
    fn test_validate() {
        assert!(contoso().validate().is_ok());

        let mut domain = contoso();
        domain.domain_name = "contoso".into();
        assert!(domain.validate().is_err());

        let mut domain = contoso();
        domain.id = Some("fabrikam.com".into());
        assert!(domain.validate().is_err());

        let mut domain = contoso();
        domain.authentication_type = Some("Sso".into());
        assert!(domain.validate().is_err());
    }

    #[test]
    fn test_create_uses_name_as_id() {
        let (mock, ctx) = context();
        let id = contoso().create(&ctx).unwrap();

        assert_eq!(id, "contoso.com");
        assert!(matches!(&mock.writes()[0], Call::Create { body, .. }
            if body == &json!({ "id": "contoso.com", "authenticationType": "Managed" })));
        let stored = mock.object(EntityKind::Domain, &id).unwrap();
        assert_eq!(stored["isVerified"], false);
    }

    #[test]
    fn test_existing_domain_is_duplicate() {
        let (mock, ctx) = context();
        mock.insert(&Domain {
            id: Some("contoso.com".into()),
            ..Domain::default()
        });

        let err = plan_resource(&contoso(), &ctx).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { ref existing_id, .. } if existing_id == "contoso.com"));
    }

    #[test]
    fn test_make_default() {
        let (mock, ctx) = context();
        let mut domain = contoso();
        let id = domain.create(&ctx).unwrap();

        domain.id = Some(id.clone());
        domain.is_default = Some(true);
        let Action::Update(changes) = plan_resource(&domain, &ctx).unwrap() else {
            panic!("expected update");
        };
        domain.update(&ctx, &id, &changes).unwrap();

        assert_eq!(mock.object(EntityKind::Domain, &id).unwrap()["isDefault"], true);
        assert_eq!(plan_resource(&domain, &ctx).unwrap(), Action::None);
    }
}
