//! Runtime shapes of call arguments as seen by key derivation

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use tokio_util::sync::CancellationToken;

/// Primitive value contributing `"{index}:{value}:{value}_"` to a key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Signed(i64),
    Unsigned(u64),
    /// Kept apart from `Float` so it renders with `f32` precision
    Float32(f32),
    Float(f64),
    Bool(bool),
    Char(char),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Signed(v) => write!(f, "{}", v),
            Scalar::Unsigned(v) => write!(f, "{}", v),
            Scalar::Float32(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Char(v) => write!(f, "{}", v),
        }
    }
}

/// An argument value, classified by the shape that decides how it
/// contributes to a cache key
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Absent value
    Null,

    /// Numeric, boolean or character value
    Scalar(Scalar),

    /// Cancellation signal; truncates key contribution
    Cancellation,

    /// Ordered, indexable collection (sampled when large)
    List(Vec<ArgValue>),

    /// Key/value collection (sampled when large)
    Map {
        key_type: String,
        value_type: String,
        entries: Vec<(ArgValue, ArgValue)>,
    },

    /// Any other iterable (never sampled)
    Sequence(Vec<ArgValue>),

    /// Display form of any other object
    Text(String),

    /// Object known only by its hash
    Opaque(u64),
}

impl ArgValue {
    /// Display form of an arbitrary object
    pub fn text(value: impl fmt::Display) -> Self {
        ArgValue::Text(value.to_string())
    }

    /// Hash-only contribution, using a fixed-key hasher so the value is
    /// stable across calls and processes built from the same toolchain
    pub fn hashed<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        ArgValue::Opaque(hasher.finish())
    }

    /// Build a list from any iterator of convertible items
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToArgument,
    {
        ArgValue::List(items.into_iter().map(|i| i.to_argument()).collect())
    }

    /// Build a non-sampled sequence from any iterator of convertible items
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToArgument,
    {
        ArgValue::Sequence(items.into_iter().map(|i| i.to_argument()).collect())
    }

    /// Build a map, recording `K` and `V` type names; entries keep the
    /// iteration order they are given in
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: ToArgument,
        V: ToArgument,
        I: IntoIterator<Item = (K, V)>,
    {
        ArgValue::Map {
            key_type: short_type_name::<K>().to_string(),
            value_type: short_type_name::<V>().to_string(),
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_argument(), v.to_argument()))
                .collect(),
        }
    }

    /// Whether this value is a cancellation signal
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ArgValue::Cancellation)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => write!(f, "Null"),
            ArgValue::Scalar(s) => write!(f, "{}", s),
            ArgValue::Cancellation => write!(f, "CancellationToken"),
            ArgValue::List(items) | ArgValue::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ArgValue::Map { entries, .. } => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ArgValue::Text(s) => write!(f, "{}", s),
            ArgValue::Opaque(h) => write!(f, "{}", h),
        }
    }
}

/// Last path segment of a type name, without generic arguments
/// (`alloc::vec::Vec<i32>` becomes `Vec`)
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::")
        .next()
        .unwrap_or(base)
        .trim_start_matches('&')
}

/// Conversion of a call argument into its key-derivation shape
pub trait ToArgument {
    fn to_argument(&self) -> ArgValue;
}

macro_rules! signed_argument {
    ($($t:ty),*) => {
        $(impl ToArgument for $t {
            fn to_argument(&self) -> ArgValue {
                ArgValue::Scalar(Scalar::Signed(*self as i64))
            }
        })*
    };
}

macro_rules! unsigned_argument {
    ($($t:ty),*) => {
        $(impl ToArgument for $t {
            fn to_argument(&self) -> ArgValue {
                ArgValue::Scalar(Scalar::Unsigned(*self as u64))
            }
        })*
    };
}

signed_argument!(i8, i16, i32, i64, isize);
unsigned_argument!(u8, u16, u32, u64, usize);

impl ToArgument for f32 {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Scalar(Scalar::Float32(*self))
    }
}

impl ToArgument for f64 {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Scalar(Scalar::Float(*self))
    }
}

impl ToArgument for bool {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Scalar(Scalar::Bool(*self))
    }
}

impl ToArgument for char {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Scalar(Scalar::Char(*self))
    }
}

impl ToArgument for str {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Text(self.to_string())
    }
}

impl ToArgument for String {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Text(self.clone())
    }
}

impl ToArgument for ArgValue {
    fn to_argument(&self) -> ArgValue {
        self.clone()
    }
}

impl ToArgument for CancellationToken {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Cancellation
    }
}

impl<T: ToArgument + ?Sized> ToArgument for &T {
    fn to_argument(&self) -> ArgValue {
        (**self).to_argument()
    }
}

impl<T: ToArgument> ToArgument for Option<T> {
    fn to_argument(&self) -> ArgValue {
        match self {
            Some(v) => v.to_argument(),
            None => ArgValue::Null,
        }
    }
}

impl<T: ToArgument> ToArgument for [T] {
    fn to_argument(&self) -> ArgValue {
        ArgValue::list(self.iter())
    }
}

impl<T: ToArgument> ToArgument for Vec<T> {
    fn to_argument(&self) -> ArgValue {
        ArgValue::list(self.iter())
    }
}

impl<T: ToArgument> ToArgument for VecDeque<T> {
    fn to_argument(&self) -> ArgValue {
        ArgValue::list(self.iter())
    }
}

impl<K: ToArgument, V: ToArgument> ToArgument for BTreeMap<K, V> {
    fn to_argument(&self) -> ArgValue {
        ArgValue::Map {
            key_type: short_type_name::<K>().to_string(),
            value_type: short_type_name::<V>().to_string(),
            entries: self
                .iter()
                .map(|(k, v)| (k.to_argument(), v.to_argument()))
                .collect(),
        }
    }
}

impl<K: ToArgument, V: ToArgument, S: BuildHasher> ToArgument for HashMap<K, V, S> {
    fn to_argument(&self) -> ArgValue {
        // Hash maps iterate in per-instance random order; order by rendered key.
        let mut entries: Vec<(ArgValue, ArgValue)> = self
            .iter()
            .map(|(k, v)| (k.to_argument(), v.to_argument()))
            .collect();
        entries.sort_by_cached_key(|(k, _)| k.to_string());

        ArgValue::Map {
            key_type: short_type_name::<K>().to_string(),
            value_type: short_type_name::<V>().to_string(),
            entries,
        }
    }
}

impl<T: ToArgument> ToArgument for BTreeSet<T> {
    fn to_argument(&self) -> ArgValue {
        ArgValue::sequence(self.iter())
    }
}

impl<T: ToArgument, S: BuildHasher> ToArgument for HashSet<T, S> {
    fn to_argument(&self) -> ArgValue {
        let mut items: Vec<ArgValue> = self.iter().map(|i| i.to_argument()).collect();
        items.sort_by_cached_key(|i| i.to_string());
        ArgValue::Sequence(items)
    }
}

impl ToArgument for serde_json::Value {
    fn to_argument(&self) -> ArgValue {
        use serde_json::Value;

        match self {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => b.to_argument(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ArgValue::Scalar(Scalar::Signed(i))
                } else if let Some(u) = n.as_u64() {
                    ArgValue::Scalar(Scalar::Unsigned(u))
                } else {
                    ArgValue::Scalar(Scalar::Float(n.as_f64().unwrap_or_default()))
                }
            }
            Value::String(s) => ArgValue::Text(s.clone()),
            Value::Array(items) => ArgValue::list(items.iter()),
            Value::Object(map) => ArgValue::Map {
                key_type: "String".to_string(),
                value_type: "Value".to_string(),
                entries: map
                    .iter()
                    .map(|(k, v)| (ArgValue::Text(k.clone()), v.to_argument()))
                    .collect(),
            },
        }
    }
}

/// Build a `Vec<ArgValue>` from a list of arguments
///
/// ```
/// use ouroboros_memo::{args, ArgValue};
///
/// let arguments = args![2, "two", vec![1, 2]];
/// assert_eq!(arguments.len(), 3);
/// assert!(matches!(arguments[2], ArgValue::List(_)));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::key::ArgValue>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::key::ToArgument::to_argument(&$arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(42i32.to_argument(), ArgValue::Scalar(Scalar::Signed(42)));
        assert_eq!(7usize.to_argument(), ArgValue::Scalar(Scalar::Unsigned(7)));
        assert_eq!(true.to_argument(), ArgValue::Scalar(Scalar::Bool(true)));
        assert_eq!('x'.to_argument(), ArgValue::Scalar(Scalar::Char('x')));
        assert_eq!(2.5f64.to_argument().to_string(), "2.5");
    }

    #[test]
    fn test_f32_keeps_its_precision() {
        assert_eq!(1.1f32.to_argument(), ArgValue::Scalar(Scalar::Float32(1.1)));
        assert_eq!(1.1f32.to_argument().to_string(), "1.1");
        assert_eq!(
            crate::key::derive_key_or_empty(
                "Calculator",
                "Scale",
                &[1.1f32.to_argument()],
                &crate::key::CacheSettings::Default,
                &crate::key::ParameterMap::default(),
            ),
            crate::key::derive_key_or_empty(
                "Calculator",
                "Scale",
                &[1.1f64.to_argument()],
                &crate::key::CacheSettings::Default,
                &crate::key::ParameterMap::default(),
            ),
        );
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i32> = None;
        assert_eq!(none.to_argument(), ArgValue::Null);
        assert_eq!(Some("a").to_argument(), ArgValue::Text("a".to_string()));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
        assert_eq!(short_type_name::<i32>(), "i32");
        assert_eq!(short_type_name::<&str>(), "str");
    }

    #[test]
    fn test_hash_map_is_ordered() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for i in 0..20 {
            first.insert(format!("k{}", i), i);
        }
        for i in (0..20).rev() {
            second.insert(format!("k{}", i), i);
        }

        assert_eq!(first.to_argument(), second.to_argument());
        match first.to_argument() {
            ArgValue::Map {
                key_type,
                value_type,
                ..
            } => {
                assert_eq!(key_type, "String");
                assert_eq!(value_type, "i32");
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(token.to_argument().is_cancellation());
    }

    #[test]
    fn test_hashed_is_stable() {
        assert_eq!(ArgValue::hashed("payload"), ArgValue::hashed("payload"));
        assert_ne!(ArgValue::hashed("payload"), ArgValue::hashed("other"));
    }

    #[test]
    fn test_json_value_conversion() {
        let value = serde_json::json!({"id": 3, "tags": ["a", "b"], "missing": null});
        match value.to_argument() {
            ArgValue::Map { entries, .. } => {
                assert_eq!(entries.len(), 3);
                assert!(entries.contains(&(
                    ArgValue::Text("id".to_string()),
                    ArgValue::Scalar(Scalar::Signed(3))
                )));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(vec![1, 2, 3].to_argument().to_string(), "[1, 2, 3]");
        assert_eq!(ArgValue::Null.to_string(), "Null");
        assert_eq!(ArgValue::text("abc").to_string(), "abc");
    }

    #[test]
    fn test_args_macro() {
        let arguments = crate::args![1, "two", Some(3u8), CancellationToken::new()];
        assert_eq!(arguments.len(), 4);
        assert!(arguments[3].is_cancellation());
        assert!(crate::args![].is_empty());
    }
}
