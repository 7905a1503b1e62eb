//! Lookup keys for registered dependencies.
//!
//! A [`TypeKey`] is the erased identity the registry stores bindings under:
//! the requested type plus an optional tag so one type can be bound several
//! times. [`Key<T>`] is the typed token callers hold; it carries `T` so that
//! registration and resolution are checked at compile time.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Erased identity of a registered abstraction.
///
/// Equality and hashing consider only the type and the tag; the type name is
/// kept for diagnostics.
#[derive(Clone)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    tag: Option<Cow<'static, str>>,
}

impl TypeKey {
    /// Key for the untagged binding of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            tag: None,
        }
    }

    /// Key for a tagged binding of `T`
    pub fn named<T: ?Sized + 'static>(tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            tag: Some(tag.into()),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.tag == other.tag
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.tag.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}#{}", self.type_name, tag),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeKey")
            .field("type_name", &self.type_name)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Typed lookup token for a dependency of type `T`.
pub struct Key<T> {
    erased: TypeKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Key<T> {
    pub fn new() -> Self {
        Self {
            erased: TypeKey::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// A key distinguishing one of several bindings of `T`
    pub fn named(tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            erased: TypeKey::named::<T>(tag),
            _marker: PhantomData,
        }
    }
}

impl<T> Key<T> {
    pub fn erased(&self) -> &TypeKey {
        &self.erased
    }
}

impl<T: 'static> Default for Key<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            erased: self.erased.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.erased == other.erased
    }
}

impl<T> Eq for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.erased).finish()
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.erased, f)
    }
}

impl<T> From<Key<T>> for TypeKey {
    fn from(key: Key<T>) -> Self {
        key.erased
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Logger;
    struct Database;

    #[test]
    fn test_same_type_same_key() {
        assert_eq!(TypeKey::of::<Logger>(), TypeKey::of::<Logger>());
        assert_ne!(TypeKey::of::<Logger>(), TypeKey::of::<Database>());
    }

    #[test]
    fn test_tag_distinguishes_keys() {
        let primary = TypeKey::named::<Database>("primary");
        let replica = TypeKey::named::<Database>("replica");

        assert_ne!(primary, replica);
        assert_ne!(primary, TypeKey::of::<Database>());
        assert_eq!(primary, TypeKey::named::<Database>(String::from("primary")));
    }

    #[test]
    fn test_keys_hash_consistently() {
        let mut set = HashSet::new();
        set.insert(TypeKey::of::<Logger>());
        set.insert(TypeKey::of::<Logger>());
        set.insert(TypeKey::named::<Logger>("audit"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        let key = TypeKey::named::<u32>("port");
        assert_eq!(key.to_string(), "u32#port");
        assert_eq!(TypeKey::of::<u32>().to_string(), "u32");
        assert_eq!(key.tag(), Some("port"));
    }

    #[test]
    fn test_typed_key_erases_to_type_key() {
        let key = Key::<Logger>::named("audit");
        assert_eq!(key.erased(), &TypeKey::named::<Logger>("audit"));
        assert_eq!(TypeKey::from(key.clone()), TypeKey::named::<Logger>("audit"));
        assert_eq!(Key::<Logger>::default(), Key::<Logger>::new());
    }
}
