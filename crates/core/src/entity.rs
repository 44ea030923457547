//! Entities: records whose identity survives changes to their fields.

/// A record with a stable, strongly-typed identity.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Display;

    fn id(&self) -> Self::Id;

    /// Whether `other` is a copy (possibly stale) of the same record.
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientId;

    struct Named {
        id: ClientId,
        name: &'static str,
    }

    impl Entity for Named {
        type Id = ClientId;

        fn id(&self) -> ClientId {
            self.id
        }
    }

    #[test]
    fn identity_ignores_fields() {
        let id = ClientId::new();
        let a = Named { id, name: "before" };
        let b = Named { id, name: "after" };
        assert_ne!(a.name, b.name);
        assert!(a.is_same(&b));
        assert!(!a.is_same(&Named { id: ClientId::new(), name: "before" }));
    }
}
