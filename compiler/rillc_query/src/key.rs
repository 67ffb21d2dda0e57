//! Contains the traits queries are written against: [`Key`] for argument
//! tuples, [`Value`] for results, and the [`DynamicKey`] type erasure that
//! lets keys of different queries share one table.

use std::{any::Any, hash::Hash, sync::Arc};

use rillc_intern::InternedStr;

/// An argument tuple identifying one invocation of a query.
///
/// Keys must be cheap to copy and provide stable hashing and equality:
/// interned string handles, node identifiers and small plain aggregates are
/// fine, owning containers are not. The key type itself names the query, so
/// two queries never share a key type.
///
/// ``` ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// struct Parse(InternedStr);
///
/// impl Key for Parse {
///     type Value = BuildResult;
/// }
/// ```
pub trait Key: 'static + Clone + Eq + Hash {
    /// The result type the query produces.
    type Value: Value;
}

/// A query result stored in the program database.
///
/// Results are compared and combined through [`merge`](Value::merge), which
/// lets a result type keep parts of the previously saved value when only some
/// of it changed.
pub trait Value: 'static + Clone + Eq {
    /// Combines the saved value with a freshly computed candidate.
    ///
    /// On return `keep` holds the value to retain in the database and
    /// `candidate` holds the displaced one. Returns `false` exactly when the
    /// two were semantically equal and the saved value did not change.
    fn merge(keep: &mut Self, candidate: &mut Self) -> bool {
        if keep == candidate {
            false
        } else {
            std::mem::swap(keep, candidate);
            true
        }
    }
}

macro_rules! plain_values {
    ($($ty:ty),* $(,)?) => {
        $(impl Value for $ty {})*
    };
}

plain_values! {
    (), bool, char,
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    String, InternedStr, &'static str,
}

impl<T: 'static + Eq + ?Sized> Value for Arc<T> {}

impl<T: Value> Value for Vec<T> {}

impl<T: Value> Value for Option<T> {}

/// Inline storage space for type-erased keys; large enough for the common
/// shapes (interned handles, node identifiers, small tuples) so lookups do
/// not allocate.
pub type KeySpace = smallbox::space::S4;

/// A type-erased, inline-boxed [`Key`].
pub type KeyBox = smallbox::SmallBox<dyn DynamicKey, KeySpace>;

/// Allows keys of every query to live in a single hashtable. Implemented for
/// all types that implement [`Key`].
pub trait DynamicKey: 'static {
    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;
    #[doc(hidden)]
    fn dyn_eq(&self, other: &dyn DynamicKey) -> bool;
    #[doc(hidden)]
    fn dyn_hash(&self, state: &mut dyn std::hash::Hasher);
    #[doc(hidden)]
    fn boxed_clone(&self) -> KeyBox;
    #[doc(hidden)]
    fn query_name(&self) -> &'static str;
}

impl<K: Key> DynamicKey for K {
    fn as_any(&self) -> &dyn Any { self as &dyn Any }

    fn dyn_eq(&self, other: &dyn DynamicKey) -> bool {
        other.as_any().downcast_ref::<Self>().is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn std::hash::Hasher) {
        // fold the key type in so equal tuples of different queries collide
        // only by accident
        std::any::TypeId::of::<Self>().hash(&mut state);
        Hash::hash(self, &mut state);
    }

    fn boxed_clone(&self) -> KeyBox { smallbox::smallbox!(self.clone()) }

    fn query_name(&self) -> &'static str { std::any::type_name::<K>() }
}

impl std::fmt::Debug for dyn DynamicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynamicKey")
            .field(&self.query_name())
            .finish_non_exhaustive()
    }
}

impl PartialEq for dyn DynamicKey {
    fn eq(&self, other: &Self) -> bool { self.dyn_eq(other) }
}

impl Eq for dyn DynamicKey {}

impl Hash for dyn DynamicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dyn_hash(state);
    }
}
