use anyhow::{Result, anyhow};
use graphkit::{EntityKind, Relation};
use serde_json::{Map, Value};

use crate::Context;
use crate::config::DirsyncConfig;

/// Print a remote object and its relations as JSON
pub fn run(ctx: &Context, kind: &str, id: &str) -> Result<()> {
    let kind: EntityKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let config = DirsyncConfig::load(ctx.config.as_deref())?;
    let client = config.provider.client()?;

    let object = describe(&client, kind, id)?;
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}

/// Fetch an object with the relations its kind carries
fn describe(client: &graphkit::Client, kind: EntityKind, id: &str) -> Result<Value> {
    let backend = client.backend();
    let object = backend
        .get(kind, id)?
        .ok_or_else(|| graphkit::Error::not_found(kind, id))?;

    let mut out = match object {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    for relation in [Relation::Owners, Relation::Members] {
        if kind.supports(relation) {
            let ids = backend.list_relation(kind, id, relation)?;
            out.insert(relation.to_string(), Value::from(ids));
        }
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphkit::{Client, Domain, Group, MockBackend};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_describe_group_with_relations() {
        let mock = MockBackend::new();
        let id = mock.insert(&Group {
            display_name: Some("Admins".into()),
            ..Group::default()
        });
        mock.set_relation(EntityKind::Group, &id, Relation::Members, &["u1", "u2"]);
        let client = Client::with_backend(Arc::new(mock));

        let value = describe(&client, EntityKind::Group, &id).unwrap();
        assert_eq!(value["displayName"], "Admins");
        assert_eq!(value["members"], json!(["u1", "u2"]));
        assert_eq!(value["owners"], json!([]));
    }

    #[test]
    fn test_describe_domain_has_no_relations() {
        let mock = MockBackend::new();
        mock.insert(&Domain {
            id: Some("contoso.com".into()),
            ..Domain::default()
        });
        let client = Client::with_backend(Arc::new(mock));

        let value = describe(&client, EntityKind::Domain, "contoso.com").unwrap();
        assert!(value.get("owners").is_none());
    }

    #[test]
    fn test_describe_missing() {
        let client = Client::with_backend(Arc::new(MockBackend::new()));
        let err = describe(&client, EntityKind::User, "nobody").unwrap_err();
        assert!(err.to_string().contains("nobody"));
    }
}
