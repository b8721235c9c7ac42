//! Resolution of an [`ApiSpec`] into the domain model used by provisioning
//! and telemetry

use crate::access::{is_public, AccessBinding, Principal};
use crate::canonical::{classify, ChannelRef};
use crate::domain::{DomainCatalog, DomainId, Namespace};
use crate::error::{NamingError, Result};
use crate::model::{ApiSpec, ChannelSpec, Direction};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A channel after canonicalization
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannel {
    /// Name as written in the document
    pub name: String,
    /// Canonical cluster topic
    pub topic: String,
    pub reference: ChannelRef,
    pub spec: ChannelSpec,
}

impl ResolvedChannel {
    /// Whether the resolving domain owns (and provisions) this topic
    pub fn is_owned(&self, domain: &DomainId) -> bool {
        self.reference.is_owned_by(domain)
    }
}

/// Immutable, resolved view of one domain's document
#[derive(Debug, Clone, PartialEq)]
pub struct DomainModel {
    domain: DomainId,
    namespace: Namespace,
    channels: BTreeMap<String, ResolvedChannel>,
    bindings: Vec<AccessBinding>,
}

impl DomainModel {
    /// Validate, canonicalize and derive bindings for `spec`.
    ///
    /// `catalog` lists the domain roots absolute references may point into;
    /// the document's own domain is always added.
    pub fn resolve(spec: &ApiSpec, catalog: &DomainCatalog) -> Result<Self> {
        spec.validate()?;

        let domain = spec.id.clone();
        let catalog = catalog.clone().with_domain(domain.clone());

        let mut channels: BTreeMap<String, ResolvedChannel> = BTreeMap::new();
        for (name, channel) in &spec.channels {
            let reference = classify(&domain, &catalog, name)?;
            let topic = reference.topic(&domain);

            match channels.entry(topic.clone()) {
                Entry::Occupied(existing) => {
                    return Err(NamingError::Collision {
                        topic,
                        first: existing.get().name.clone(),
                        second: name.clone(),
                    }
                    .into());
                }
                Entry::Vacant(slot) => {
                    debug!(channel = %name, topic = %topic, "Resolved channel");
                    slot.insert(ResolvedChannel {
                        name: name.clone(),
                        topic,
                        reference,
                        spec: channel.clone(),
                    });
                }
            }
        }

        let namespace = catalog.namespace_of(&domain);
        let bindings = derive_bindings(&namespace, channels.values());

        Ok(Self {
            domain,
            namespace,
            channels,
            bindings,
        })
    }

    pub fn domain(&self) -> &DomainId {
        &self.domain
    }

    /// The domain's namespace, minus nested known domains
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Canonical topic → resolved channel
    pub fn channels(&self) -> &BTreeMap<String, ResolvedChannel> {
        &self.channels
    }

    /// Canonical topic → logical name as written in the document
    pub fn canonical_channels(&self) -> BTreeMap<String, String> {
        self.channels
            .iter()
            .map(|(topic, channel)| (topic.clone(), channel.name.clone()))
            .collect()
    }

    /// Channels whose topics this domain owns and provisions
    pub fn owned_channels(&self) -> impl Iterator<Item = &ResolvedChannel> {
        self.channels
            .values()
            .filter(move |channel| channel.is_owned(&self.domain))
    }

    pub fn owned_topics(&self) -> Vec<String> {
        self.owned_channels().map(|c| c.topic.clone()).collect()
    }

    /// Topics owned by other domains that this document references
    pub fn referenced_topics(&self) -> Vec<String> {
        self.channels
            .values()
            .filter(|channel| !channel.is_owned(&self.domain))
            .map(|channel| channel.topic.clone())
            .collect()
    }

    /// Every canonical topic named by the document
    pub fn topics(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Derived access bindings, sorted and de-duplicated
    pub fn access_bindings(&self) -> &[AccessBinding] {
        &self.bindings
    }
}

/// Grants implied by a set of resolved channels:
/// owner rights over the namespace, read for `_public` channels and
/// `grant_access` domains, and the minimum operation for cross-domain
/// references.
///
/// A prefixed owner grant would also cover nested domains, so when the
/// namespace has any the owner rights are issued per owned topic instead.
fn derive_bindings<'a>(
    namespace: &Namespace,
    channels: impl Iterator<Item = &'a ResolvedChannel>,
) -> Vec<AccessBinding> {
    let domain = namespace.domain();
    let mut bindings = BTreeSet::new();
    let owner = Principal::Domain(domain.clone());

    for channel in channels {
        if channel.is_owned(domain) {
            if namespace.has_nested() {
                bindings.extend(AccessBinding::topic_owner_rights(domain, &channel.topic));
            } else {
                bindings.extend(AccessBinding::owner_rights(domain));
            }

            if is_public(&channel.topic) {
                bindings.insert(AccessBinding::read(Principal::Anyone, &channel.topic));
            }
            for grantee in channel.spec.grant_access.iter().filter(|g| *g != domain) {
                bindings.insert(AccessBinding::read(
                    Principal::Domain(grantee.clone()),
                    &channel.topic,
                ));
            }
        } else {
            let binding = match channel.spec.direction {
                Direction::Consume => AccessBinding::read(owner.clone(), &channel.topic),
                Direction::Produce => AccessBinding::write(owner.clone(), &channel.topic),
            };
            bindings.insert(binding);
        }
    }

    bindings.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AclOperation, ResourcePattern};
    use crate::error::Error;

    fn streetlights() -> ApiSpec {
        ApiSpec::new(DomainId::parse("simple.streetlights").unwrap())
            .with_channel("public.light.measured", ChannelSpec::produced())
            .with_channel(
                "london.hammersmith.transport.public.tube",
                ChannelSpec::consumed(),
            )
    }

    fn catalog() -> DomainCatalog {
        DomainCatalog::new().with_domain(DomainId::parse("london.hammersmith.transport").unwrap())
    }

    #[test]
    fn test_streetlights_canonical_channels() {
        let model = DomainModel::resolve(&streetlights(), &catalog()).unwrap();
        let canonical = model.canonical_channels();

        assert_eq!(canonical.len(), 2);
        assert!(canonical.contains_key("simple.streetlights.public.light.measured"));
        assert!(canonical.contains_key("london.hammersmith.transport.public.tube"));
        assert_eq!(
            model.owned_topics(),
            vec!["simple.streetlights.public.light.measured".to_string()]
        );
        assert_eq!(
            model.referenced_topics(),
            vec!["london.hammersmith.transport.public.tube".to_string()]
        );
    }

    #[test]
    fn test_collision_is_reported() {
        let spec = ApiSpec::new(DomainId::parse("acme.sales").unwrap())
            .with_channel("orders/created", ChannelSpec::produced())
            .with_channel("orders.created", ChannelSpec::produced());

        let err = DomainModel::resolve(&spec, &DomainCatalog::new()).unwrap_err();
        match err {
            Error::NamingCollision(NamingError::Collision { topic, .. }) => {
                assert_eq!(topic, "acme.sales.orders.created")
            }
            other => panic!("expected collision, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_root_fails_resolution() {
        let spec = ApiSpec::new(DomainId::parse("acme.sales").unwrap())
            .with_channel("/acme/billing/invoices", ChannelSpec::consumed());

        let err = DomainModel::resolve(&spec, &DomainCatalog::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::NamingCollision(NamingError::UnknownDomainRoot { .. })
        ));
    }

    #[test]
    fn test_invalid_channel_fails_before_naming() {
        let spec = ApiSpec::new(DomainId::parse("acme.sales").unwrap())
            .with_channel("orders", ChannelSpec::produced().with_replication_factor(0));
        let err = DomainModel::resolve(&spec, &DomainCatalog::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn test_bindings_for_owned_and_referenced_channels() {
        let domain = DomainId::parse("acme.sales").unwrap();
        let billing = DomainId::parse("acme.billing").unwrap();
        let analytics = DomainId::parse("acme.analytics").unwrap();

        let spec = ApiSpec::new(domain.clone())
            .with_channel("_public/orders", ChannelSpec::produced())
            .with_channel(
                "_protected/refunds",
                ChannelSpec::produced().with_grant(analytics.clone()),
            )
            .with_channel("_private/drafts", ChannelSpec::produced())
            .with_channel("acme.billing.invoices", ChannelSpec::consumed())
            .with_channel("/acme/billing/payments", ChannelSpec::produced());

        let catalog = DomainCatalog::new().with_domain(billing);
        let model = DomainModel::resolve(&spec, &catalog).unwrap();
        let bindings = model.access_bindings();

        let me = Principal::Domain(domain.clone());
        for binding in AccessBinding::owner_rights(&domain) {
            assert!(bindings.contains(&binding));
        }
        assert!(bindings.contains(&AccessBinding::read(
            Principal::Anyone,
            "acme.sales._public.orders"
        )));
        assert!(bindings.contains(&AccessBinding::read(
            Principal::Domain(analytics),
            "acme.sales._protected.refunds"
        )));
        assert!(bindings.contains(&AccessBinding::read(me.clone(), "acme.billing.invoices")));
        assert!(bindings.contains(&AccessBinding::write(me, "acme.billing.payments")));

        // owner rights (3) + public read + protected grant + two references
        assert_eq!(bindings.len(), 7);
        assert!(!bindings.iter().any(|b| b.pattern
            == ResourcePattern::Literal("acme.sales._private.drafts".to_string())));
        assert!(bindings
            .iter()
            .filter(|b| b.operation == AclOperation::Write)
            .all(|b| b.principal == Principal::Domain(domain.clone())));
    }

    #[test]
    fn test_nested_domain_keeps_parent_rights_literal() {
        let london = DomainId::parse("london").unwrap();
        let transport = DomainId::parse("london.hammersmith.transport").unwrap();
        let spec = ApiSpec::new(london.clone())
            .with_channel("city/events", ChannelSpec::produced())
            .with_channel("hammersmith.transport._public.tube", ChannelSpec::consumed());

        let catalog = DomainCatalog::new().with_domain(transport.clone());
        let model = DomainModel::resolve(&spec, &catalog).unwrap();

        assert_eq!(model.owned_topics(), vec!["london.city.events".to_string()]);
        assert_eq!(
            model.referenced_topics(),
            vec!["london.hammersmith.transport._public.tube".to_string()]
        );
        assert!(!model
            .namespace()
            .contains("london.hammersmith.transport._public.tube"));

        let bindings = model.access_bindings();
        assert!(bindings
            .iter()
            .all(|b| matches!(b.pattern, ResourcePattern::Literal(_))));
        for binding in AccessBinding::topic_owner_rights(&london, "london.city.events") {
            assert!(bindings.contains(&binding));
        }
        assert!(bindings.contains(&AccessBinding::read(
            Principal::Domain(london),
            "london.hammersmith.transport._public.tube"
        )));
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn test_no_owned_channels_means_no_owner_rights() {
        let spec = ApiSpec::new(DomainId::parse("acme.sales").unwrap())
            .with_channel("acme.billing.invoices", ChannelSpec::consumed());
        let catalog =
            DomainCatalog::new().with_domain(DomainId::parse("acme.billing").unwrap());
        let model = DomainModel::resolve(&spec, &catalog).unwrap();
        assert_eq!(model.access_bindings().len(), 1);
        assert!(model.owned_topics().is_empty());
    }
}
