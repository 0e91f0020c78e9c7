//! Namespace ownership and the publish/view authorization gate.
//!
//! | protection | publish        | view       |
//! |------------|----------------|------------|
//! | (absent)   | unless reserved| nobody     |
//! | public     | anyone         | anyone     |
//! | protected  | owner          | anyone     |
//! | private    | owner          | owner      |

use chrono::Utc;

use crate::catalog::{Namespace, Protection};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::identity::{validate_namespace_name, ActorId};
use crate::store::RegistryStore;

/// Publish decision for a namespace record (or its absence).
pub fn may_publish(namespace: Option<&Namespace>, reserved: bool, actor: &ActorId) -> bool {
    match namespace {
        None => !reserved,
        Some(ns) => match ns.protection {
            Protection::Public => true,
            Protection::Protected | Protection::Private => &ns.owner == actor,
        },
    }
}

/// View decision. Anonymous callers pass `None`.
pub fn may_view(namespace: Option<&Namespace>, actor: Option<&ActorId>) -> bool {
    match namespace {
        None => false,
        Some(ns) => match ns.protection {
            Protection::Public | Protection::Protected => true,
            Protection::Private => actor == Some(&ns.owner),
        },
    }
}

/// Changes an owner may make to a namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceUpdate {
    pub protection: Option<Protection>,
    pub description: Option<String>,
}

/// Namespace operations against a store, under a registry policy.
pub struct NamespaceGate<'a> {
    store: &'a dyn RegistryStore,
    config: &'a RegistryConfig,
}

impl<'a> NamespaceGate<'a> {
    pub fn new(store: &'a dyn RegistryStore, config: &'a RegistryConfig) -> Self {
        NamespaceGate { store, config }
    }

    pub fn get(&self, name: &str) -> Result<Option<Namespace>> {
        self.store.namespace(name)
    }

    pub fn can_publish(&self, name: &str, actor: &ActorId) -> Result<bool> {
        let namespace = self.store.namespace(name)?;
        Ok(may_publish(
            namespace.as_ref(),
            self.config.is_reserved(name),
            actor,
        ))
    }

    pub fn can_view(&self, name: &str, actor: Option<&ActorId>) -> Result<bool> {
        Ok(may_view(self.store.namespace(name)?.as_ref(), actor))
    }

    /// Claim an unowned namespace.
    pub fn claim(
        &self,
        name: &str,
        owner: &ActorId,
        protection: Protection,
        description: Option<String>,
    ) -> Result<Namespace> {
        validate_namespace_name(name)?;
        if self.config.is_reserved(name) {
            return Err(RegistryError::ReservedNamespace {
                name: name.to_string(),
            });
        }

        let namespace = Namespace {
            name: name.to_string(),
            owner: owner.clone(),
            protection,
            description,
            created_at: Utc::now(),
        };
        self.store.create_namespace(&namespace)?;
        tracing::info!(namespace = %name, owner = %owner, protection = %protection, "claimed namespace");
        Ok(namespace)
    }

    /// Claim `name` for `owner` with the default protection unless someone
    /// already holds it. Returns whichever record ends up stored.
    pub fn auto_claim(&self, name: &str, owner: &ActorId) -> Result<Namespace> {
        if let Some(existing) = self.store.namespace(name)? {
            return Ok(existing);
        }
        match self.claim(name, owner, self.config.default_protection, None) {
            Err(RegistryError::NamespaceTaken { .. }) => {
                self.store
                    .namespace(name)?
                    .ok_or_else(|| RegistryError::NamespaceNotFound {
                        name: name.to_string(),
                    })
            }
            other => other,
        }
    }

    /// Owner-only change of protection level or description.
    pub fn update(&self, name: &str, actor: &ActorId, changes: NamespaceUpdate) -> Result<Namespace> {
        let mut namespace =
            self.store
                .namespace(name)?
                .ok_or_else(|| RegistryError::NamespaceNotFound {
                    name: name.to_string(),
                })?;
        if &namespace.owner != actor {
            return Err(RegistryError::NotOwner {
                actor: actor.to_string(),
                target: format!("namespace {name}"),
            });
        }

        if let Some(protection) = changes.protection {
            namespace.protection = protection;
        }
        if let Some(description) = changes.description {
            namespace.description = Some(description);
        }
        self.store.update_namespace(&namespace)?;
        tracing::info!(namespace = %name, protection = %namespace.protection, "updated namespace");
        Ok(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalRegistry;

    fn ns(protection: Protection) -> Namespace {
        Namespace {
            name: "acme".to_string(),
            owner: ActorId::new("alice"),
            protection,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn publish_rules() {
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");

        assert!(may_publish(None, false, &bob));
        assert!(!may_publish(None, true, &bob));

        let public = ns(Protection::Public);
        assert!(may_publish(Some(&public), false, &bob));

        for p in [Protection::Protected, Protection::Private] {
            let owned = ns(p);
            assert!(may_publish(Some(&owned), false, &alice));
            assert!(!may_publish(Some(&owned), false, &bob));
        }
    }

    #[test]
    fn view_rules() {
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");

        assert!(!may_view(None, Some(&alice)));
        assert!(may_view(Some(&ns(Protection::Public)), None));
        assert!(may_view(Some(&ns(Protection::Protected)), Some(&bob)));
        assert!(may_view(Some(&ns(Protection::Private)), Some(&alice)));
        assert!(!may_view(Some(&ns(Protection::Private)), Some(&bob)));
        assert!(!may_view(Some(&ns(Protection::Private)), None));
    }

    #[test]
    fn claim_validates_and_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let config = RegistryConfig::default();
        let gate = NamespaceGate::new(&registry, &config);
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");

        assert!(matches!(
            gate.claim("admin", &alice, Protection::Public, None),
            Err(RegistryError::ReservedNamespace { .. })
        ));
        assert!(matches!(
            gate.claim("admin.tools", &alice, Protection::Public, None),
            Err(RegistryError::ReservedNamespace { .. })
        ));
        assert!(matches!(
            gate.claim("Bad_Name", &alice, Protection::Public, None),
            Err(RegistryError::InvalidNamespace { .. })
        ));

        gate.claim("acme", &alice, Protection::Protected, None).unwrap();
        assert!(matches!(
            gate.claim("acme", &bob, Protection::Public, None),
            Err(RegistryError::NamespaceTaken { .. })
        ));
        assert!(gate.can_publish("acme", &alice).unwrap());
        assert!(!gate.can_publish("acme", &bob).unwrap());
        assert!(gate.can_publish("fresh", &bob).unwrap());
        assert!(!gate.can_publish("system", &bob).unwrap());
    }

    #[test]
    fn auto_claim_keeps_existing_owner() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let config = RegistryConfig::default();
        let gate = NamespaceGate::new(&registry, &config);

        let claimed = gate.auto_claim("acme", &ActorId::new("alice")).unwrap();
        assert_eq!(claimed.protection, Protection::Protected);

        let again = gate.auto_claim("acme", &ActorId::new("bob")).unwrap();
        assert_eq!(again.owner, ActorId::new("alice"));
    }

    #[test]
    fn update_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let config = RegistryConfig::default();
        let gate = NamespaceGate::new(&registry, &config);
        let alice = ActorId::new("alice");
        gate.claim("acme", &alice, Protection::Private, None).unwrap();

        let changes = NamespaceUpdate {
            protection: Some(Protection::Public),
            description: Some("Acme prompts".to_string()),
        };
        assert!(matches!(
            gate.update("acme", &ActorId::new("bob"), changes.clone()),
            Err(RegistryError::NotOwner { .. })
        ));

        let updated = gate.update("acme", &alice, changes).unwrap();
        assert_eq!(updated.protection, Protection::Public);
        assert_eq!(gate.get("acme").unwrap(), Some(updated));
        assert!(gate.can_view("acme", None).unwrap());

        assert!(matches!(
            gate.update("ghost", &alice, NamespaceUpdate::default()),
            Err(RegistryError::NamespaceNotFound { .. })
        ));
    }
}
