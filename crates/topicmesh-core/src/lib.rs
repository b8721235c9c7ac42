//! # topicmesh core
//!
//! Pure domain model for declarative topic ownership on a broker cluster.
//!
//! A spec document names a domain (tenant) and the channels it produces or
//! consumes. Resolving it yields:
//!
//! - the canonical, collision-free topic name of every channel
//! - which of those topics the domain owns
//! - the access bindings the domain's channels imply
//!
//! ```rust,ignore
//! use topicmesh_core::prelude::*;
//!
//! let spec = load_spec("streetlights.yaml")?;
//! let catalog = DomainCatalog::new()
//!     .with_domain(DomainId::parse("london.hammersmith.transport")?);
//! let model = DomainModel::resolve(&spec, &catalog)?;
//!
//! for topic in model.owned_topics() {
//!     println!("{topic}");
//! }
//! ```
//!
//! Naming rules live in [`canonical`]; every naming problem is reported as
//! [`Error::NamingCollision`] before anything touches a cluster.

pub mod access;
pub mod canonical;
pub mod domain;
pub mod error;
pub mod loader;
pub mod model;
pub mod resolver;

pub use access::{AccessBinding, AclOperation, Principal, ResourcePattern};
pub use canonical::{canonicalize, classify, ChannelRef};
pub use domain::{DomainCatalog, DomainId, Namespace};
pub use error::{Error, NamingError, Result};
pub use loader::{load_spec, parse_spec};
pub use model::{ApiSpec, ChannelSpec, Direction, SchemaFormat, SchemaRef};
pub use resolver::{DomainModel, ResolvedChannel};

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::access::{AccessBinding, AclOperation, Principal, ResourcePattern};
    pub use crate::canonical::{canonicalize, ChannelRef};
    pub use crate::domain::{DomainCatalog, DomainId, Namespace};
    pub use crate::error::{Error, NamingError, Result};
    pub use crate::loader::load_spec;
    pub use crate::model::{ApiSpec, ChannelSpec, Direction, SchemaFormat, SchemaRef};
    pub use crate::resolver::DomainModel;
}
