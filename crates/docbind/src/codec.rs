//! Field value codecs.
//!
//! A codec converts one field type to a wire [`Value`] and back. The set of
//! codecs is closed and chosen when a field is bound, never per value:
//!
//! | field type                     | codec               |
//! |--------------------------------|---------------------|
//! | `String`, integers, floats, `bool` | [`ScalarCodec`] |
//! | [`Uuid`]                       | [`IdentifierCodec`] |
//! | `FromStr + Display` value types | [`ParseCodec`]     |
//! | `Option<T>`                    | [`NullableCodec`]   |
//! | anything, via a [`Serializer`] | [`SerializedCodec`] |
//!
//! Every codec writes strings. Decoding accepts a value that already has the
//! field's native wire shape unchanged, serialized fields included, and
//! otherwise parses the wire value's text form. `None` is written as [`NULL_MARKER`].

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use docbind_store::Value;
use uuid::Uuid;

use crate::error::CodecError;

/// Wire text standing in for an absent optional value.
pub const NULL_MARKER: &str = "NULL";

/// The family a codec belongs to, for diagnostics and reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecKind {
    Text,
    Integer,
    Float,
    Boolean,
    Identifier,
    Parsed,
    Custom,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Identifier => write!(f, "identifier"),
            Self::Parsed => write!(f, "parsed"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Converts a field of type `T` to and from its wire form.
pub trait FieldCodec<T>: Send + Sync + 'static {
    fn kind(&self) -> CodecKind;

    fn encode(&self, value: &T) -> Result<Value, CodecError>;

    /// Decode a non-null wire value. Null and absent keys never reach a
    /// codec except through [`NullableCodec`].
    fn decode(&self, wire: &Value) -> Result<T, CodecError>;
}

/// The codec a type gets when bound without an explicit one.
pub trait DefaultCodec: Sized + 'static {
    type Codec: FieldCodec<Self> + Default;
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// A primitive that maps onto a native JSON scalar.
pub trait Scalar: FromStr + fmt::Display + Sized + Send + Sync + 'static {
    const KIND: CodecKind;

    /// Accept a wire value that already has this type's native shape.
    fn from_native(wire: &Value) -> Option<Self>;
}

impl Scalar for String {
    const KIND: CodecKind = CodecKind::Text;

    fn from_native(wire: &Value) -> Option<Self> {
        wire.as_str().map(str::to_string)
    }
}

impl Scalar for bool {
    const KIND: CodecKind = CodecKind::Boolean;

    fn from_native(wire: &Value) -> Option<Self> {
        wire.as_bool()
    }
}

macro_rules! integer_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const KIND: CodecKind = CodecKind::Integer;

            fn from_native(wire: &Value) -> Option<Self> {
                let Value::Number(n) = wire else {
                    return None;
                };
                n.as_i64()
                    .and_then(|v| <$t>::try_from(v).ok())
                    .or_else(|| n.as_u64().and_then(|v| <$t>::try_from(v).ok()))
            }
        }

        impl DefaultCodec for $t {
            type Codec = ScalarCodec<$t>;
        }
    )*};
}

macro_rules! float_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const KIND: CodecKind = CodecKind::Float;

            fn from_native(wire: &Value) -> Option<Self> {
                wire.as_f64().map(|v| v as $t)
            }
        }

        impl DefaultCodec for $t {
            type Codec = ScalarCodec<$t>;
        }
    )*};
}

integer_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
float_scalar!(f32, f64);

impl DefaultCodec for String {
    type Codec = ScalarCodec<String>;
}

impl DefaultCodec for bool {
    type Codec = ScalarCodec<bool>;
}

/// Codec for [`Scalar`] types: native shape as-is, else parse the text form.
pub struct ScalarCodec<T>(PhantomData<fn() -> T>);

impl<T> Default for ScalarCodec<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> FieldCodec<T> for ScalarCodec<T>
where
    T::Err: fmt::Display,
{
    fn kind(&self) -> CodecKind {
        T::KIND
    }

    fn encode(&self, value: &T) -> Result<Value, CodecError> {
        Ok(Value::String(value.to_string()))
    }

    fn decode(&self, wire: &Value) -> Result<T, CodecError> {
        if let Some(value) = T::from_native(wire) {
            return Ok(value);
        }
        parse_text(T::KIND, wire)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Codec for [`Uuid`]: hyphenated text on the wire.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentifierCodec;

impl FieldCodec<Uuid> for IdentifierCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Identifier
    }

    fn encode(&self, value: &Uuid) -> Result<Value, CodecError> {
        Ok(Value::String(value.hyphenated().to_string()))
    }

    fn decode(&self, wire: &Value) -> Result<Uuid, CodecError> {
        let text = wire_text(CodecKind::Identifier, wire)?;
        Uuid::parse_str(&text).map_err(|e| decode_error(CodecKind::Identifier, wire, e))
    }
}

impl DefaultCodec for Uuid {
    type Codec = IdentifierCodec;
}

// ---------------------------------------------------------------------------
// Parsed value types
// ---------------------------------------------------------------------------

/// Codec for enum-like and custom value types through `Display`/`FromStr`.
///
/// The `Display` output must parse back with `FromStr` for the field to
/// round-trip.
pub struct ParseCodec<T>(PhantomData<fn() -> T>);

impl<T> Default for ParseCodec<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> FieldCodec<T> for ParseCodec<T>
where
    T: FromStr + fmt::Display + 'static,
    T::Err: fmt::Display,
{
    fn kind(&self) -> CodecKind {
        CodecKind::Parsed
    }

    fn encode(&self, value: &T) -> Result<Value, CodecError> {
        Ok(Value::String(value.to_string()))
    }

    fn decode(&self, wire: &Value) -> Result<T, CodecError> {
        parse_text(CodecKind::Parsed, wire)
    }
}

// ---------------------------------------------------------------------------
// Optional values
// ---------------------------------------------------------------------------

/// Wraps another codec to carry `Option<T>`.
///
/// `None` encodes to [`NULL_MARKER`]; both `null` and the marker decode to
/// `None`. An `Option<String>` holding the literal text `"NULL"` therefore
/// comes back as `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullableCodec<C>(pub C);

impl<T, C> FieldCodec<Option<T>> for NullableCodec<C>
where
    C: FieldCodec<T>,
{
    fn kind(&self) -> CodecKind {
        self.0.kind()
    }

    fn encode(&self, value: &Option<T>) -> Result<Value, CodecError> {
        match value {
            Some(v) => self.0.encode(v),
            None => Ok(Value::String(NULL_MARKER.to_string())),
        }
    }

    fn decode(&self, wire: &Value) -> Result<Option<T>, CodecError> {
        match wire {
            Value::Null => Ok(None),
            Value::String(s) if s == NULL_MARKER => Ok(None),
            other => self.0.decode(other).map(Some),
        }
    }
}

impl<T: DefaultCodec> DefaultCodec for Option<T> {
    type Codec = NullableCodec<T::Codec>;
}

// ---------------------------------------------------------------------------
// Custom serializers
// ---------------------------------------------------------------------------

/// Error raised by a [`Serializer`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SerializerError(pub String);

impl SerializerError {
    pub fn new(msg: impl fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

/// A user-supplied, stateless conversion between a field value and its
/// wire text.
pub trait Serializer<T>: Send + Sync + 'static {
    fn to_wire(&self, value: &T) -> Result<String, SerializerError>;

    fn from_wire(&self, text: &str) -> Result<T, SerializerError>;
}

/// Adapts a [`Serializer`] to [`FieldCodec`]. Output is used verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializedCodec<S>(pub S);

impl<T, S> FieldCodec<T> for SerializedCodec<S>
where
    T: 'static,
    S: Serializer<T>,
{
    fn kind(&self) -> CodecKind {
        CodecKind::Custom
    }

    fn encode(&self, value: &T) -> Result<Value, CodecError> {
        self.0
            .to_wire(value)
            .map(Value::String)
            .map_err(|e| CodecError::Encode {
                kind: CodecKind::Custom,
                reason: e.to_string(),
            })
    }

    /// A wire value that already has the field's native scalar shape is
    /// taken as-is; only other values go through [`Serializer::from_wire`].
    fn decode(&self, wire: &Value) -> Result<T, CodecError> {
        if let Some(value) = native_scalar::<T>(wire) {
            return Ok(value);
        }
        let text = wire_text(CodecKind::Custom, wire)?;
        self.0
            .from_wire(&text)
            .map_err(|e| decode_error(CodecKind::Custom, wire, e))
    }
}

/// `wire` as a `T`, when `T` is one of the [`Scalar`] types and `wire`
/// already has its native shape.
fn native_scalar<T: 'static>(wire: &Value) -> Option<T> {
    fn cast<S: Scalar, T: 'static>(wire: &Value) -> Option<T> {
        if TypeId::of::<S>() != TypeId::of::<T>() {
            return None;
        }
        let boxed: Box<dyn Any> = Box::new(S::from_native(wire)?);
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    macro_rules! first_native {
        ($($t:ty),*) => {
            None$(.or_else(|| cast::<$t, T>(wire)))*
        };
    }

    first_native!(
        String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The text form of a scalar wire value.
fn wire_text(kind: CodecKind, wire: &Value) -> Result<Cow<'_, str>, CodecError> {
    match wire {
        Value::String(s) => Ok(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Bool(b) => Ok(Cow::Owned(b.to_string())),
        Value::Null => Err(CodecError::Unsupported { kind, found: "null" }),
        Value::Array(_) => Err(CodecError::Unsupported { kind, found: "array" }),
        Value::Object(_) => Err(CodecError::Unsupported { kind, found: "object" }),
    }
}

fn parse_text<T>(kind: CodecKind, wire: &Value) -> Result<T, CodecError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let text = wire_text(kind, wire)?;
    text.parse::<T>().map_err(|e| decode_error(kind, wire, e))
}

fn decode_error(kind: CodecKind, wire: &Value, reason: impl fmt::Display) -> CodecError {
    CodecError::Decode {
        kind,
        wire: wire.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn codec<T: DefaultCodec>() -> T::Codec {
        T::Codec::default()
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Rank {
        Member,
        Admin,
    }

    impl fmt::Display for Rank {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Rank::Member => write!(f, "MEMBER"),
                Rank::Admin => write!(f, "ADMIN"),
            }
        }
    }

    impl FromStr for Rank {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "MEMBER" => Ok(Rank::Member),
                "ADMIN" => Ok(Rank::Admin),
                other => Err(format!("unknown rank {other:?}")),
            }
        }
    }

    struct CommaSet;

    impl Serializer<BTreeSet<String>> for CommaSet {
        fn to_wire(&self, value: &BTreeSet<String>) -> Result<String, SerializerError> {
            Ok(value.iter().cloned().collect::<Vec<_>>().join(","))
        }

        fn from_wire(&self, text: &str) -> Result<BTreeSet<String>, SerializerError> {
            Ok(text
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect())
        }
    }

    struct Broken;

    impl Serializer<u8> for Broken {
        fn to_wire(&self, _: &u8) -> Result<String, SerializerError> {
            Err(SerializerError::new("refusing to encode"))
        }

        fn from_wire(&self, _: &str) -> Result<u8, SerializerError> {
            Err(SerializerError::new("refusing to decode"))
        }
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn scalars_encode_to_strings() {
        assert_eq!(codec::<String>().encode(&"Alice".to_string()).unwrap(), json!("Alice"));
        assert_eq!(codec::<i32>().encode(&-42).unwrap(), json!("-42"));
        assert_eq!(codec::<u64>().encode(&u64::MAX).unwrap(), json!("18446744073709551615"));
        assert_eq!(codec::<f64>().encode(&1.5).unwrap(), json!("1.5"));
        assert_eq!(codec::<bool>().encode(&true).unwrap(), json!("true"));
    }

    #[test]
    fn none_encodes_to_null_marker() {
        assert_eq!(codec::<Option<i64>>().encode(&None).unwrap(), json!("NULL"));
        assert_eq!(codec::<Option<i64>>().encode(&Some(7)).unwrap(), json!("7"));
    }

    #[test]
    fn uuid_encodes_hyphenated() {
        let id = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(
            IdentifierCodec.encode(&id).unwrap(),
            json!("01234567-89ab-cdef-0123-456789abcdef")
        );
    }

    #[test]
    fn serializer_output_is_verbatim() {
        let set: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(SerializedCodec(CommaSet).encode(&set).unwrap(), json!("a,b"));
    }

    #[test]
    fn serializer_encode_failure_is_codec_error() {
        let err = SerializedCodec(Broken).encode(&1).unwrap_err();
        assert!(matches!(err, CodecError::Encode { kind: CodecKind::Custom, .. }));
    }

    // -----------------------------------------------------------------------
    // Decoding precedence
    // -----------------------------------------------------------------------

    #[test]
    fn native_values_are_used_as_is() {
        assert_eq!(codec::<String>().decode(&json!("x")).unwrap(), "x");
        assert_eq!(codec::<i64>().decode(&json!(12)).unwrap(), 12);
        assert_eq!(codec::<u8>().decode(&json!(200)).unwrap(), 200);
        assert_eq!(codec::<f64>().decode(&json!(2.25)).unwrap(), 2.25);
        assert_eq!(codec::<f64>().decode(&json!(3)).unwrap(), 3.0);
        assert!(codec::<bool>().decode(&json!(true)).unwrap());
    }

    #[test]
    fn scalars_parse_their_text_form() {
        assert_eq!(codec::<i32>().decode(&json!("-7")).unwrap(), -7);
        assert_eq!(codec::<f32>().decode(&json!("0.5")).unwrap(), 0.5);
        assert!(!codec::<bool>().decode(&json!("false")).unwrap());
    }

    #[test]
    fn text_field_accepts_numbers_and_booleans() {
        assert_eq!(codec::<String>().decode(&json!(42)).unwrap(), "42");
        assert_eq!(codec::<String>().decode(&json!(false)).unwrap(), "false");
    }

    #[test]
    fn out_of_range_native_integer_falls_back_and_fails() {
        let err = codec::<u8>().decode(&json!(300)).unwrap_err();
        assert!(matches!(err, CodecError::Decode { kind: CodecKind::Integer, .. }));
        assert!(codec::<i8>().decode(&json!(-129)).is_err());
    }

    #[test]
    fn unparseable_text_is_decode_error() {
        let err = codec::<i64>().decode(&json!("twelve")).unwrap_err();
        match err {
            CodecError::Decode { kind, wire, .. } => {
                assert_eq!(kind, CodecKind::Integer);
                assert_eq!(wire, "\"twelve\"");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn containers_are_unsupported() {
        let err = codec::<String>().decode(&json!(["a"])).unwrap_err();
        assert_eq!(
            err,
            CodecError::Unsupported {
                kind: CodecKind::Text,
                found: "array"
            }
        );
        assert!(codec::<i64>().decode(&json!({"a": 1})).is_err());
    }

    #[test]
    fn uuid_parses_from_text() {
        let id = Uuid::from_u128(42);
        let wire = IdentifierCodec.encode(&id).unwrap();
        assert_eq!(IdentifierCodec.decode(&wire).unwrap(), id);
        assert!(IdentifierCodec.decode(&json!("not-a-uuid")).is_err());
        assert!(IdentifierCodec.decode(&json!(17)).is_err());
    }

    #[test]
    fn parsed_values_use_from_str() {
        let codec = ParseCodec::<Rank>::default();
        assert_eq!(codec.kind(), CodecKind::Parsed);
        assert_eq!(codec.encode(&Rank::Admin).unwrap(), json!("ADMIN"));
        assert_eq!(codec.decode(&json!("MEMBER")).unwrap(), Rank::Member);
        let err = codec.decode(&json!("OWNER")).unwrap_err();
        assert!(err.to_string().contains("unknown rank"));
    }

    #[test]
    fn nullable_decodes_null_and_marker_as_none() {
        let c = codec::<Option<String>>();
        assert_eq!(c.decode(&Value::Null).unwrap(), None);
        assert_eq!(c.decode(&json!("NULL")).unwrap(), None);
        assert_eq!(c.decode(&json!("x")).unwrap(), Some("x".to_string()));
        assert_eq!(c.kind(), CodecKind::Text);
    }

    #[test]
    fn plain_string_keeps_literal_null_text() {
        assert_eq!(codec::<String>().decode(&json!("NULL")).unwrap(), "NULL");
    }

    #[test]
    fn serializer_decodes_any_scalar_text() {
        let set = SerializedCodec(CommaSet).decode(&json!("c,a,b")).unwrap();
        let expected: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(set, expected);
        assert!(SerializedCodec(Broken).decode(&json!("x")).is_err());
    }

    struct Tagged;

    impl Serializer<String> for Tagged {
        fn to_wire(&self, value: &String) -> Result<String, SerializerError> {
            Ok(format!("tag:{value}"))
        }

        fn from_wire(&self, text: &str) -> Result<String, SerializerError> {
            Ok(format!("decoded:{text}"))
        }
    }

    struct Counter;

    impl Serializer<u32> for Counter {
        fn to_wire(&self, value: &u32) -> Result<String, SerializerError> {
            Ok(format!("#{value}"))
        }

        fn from_wire(&self, text: &str) -> Result<u32, SerializerError> {
            text.trim_start_matches('#').parse().map_err(SerializerError::new)
        }
    }

    #[test]
    fn serialized_field_takes_native_value_first() {
        assert_eq!(SerializedCodec(Tagged).decode(&json!("alice")).unwrap(), "alice");
        assert_eq!(SerializedCodec(Counter).decode(&json!(9)).unwrap(), 9);
    }

    #[test]
    fn serialized_field_without_native_shape_uses_serializer() {
        assert_eq!(
            SerializedCodec(Tagged).decode(&json!(5)).unwrap(),
            "decoded:5"
        );
        assert_eq!(SerializedCodec(Counter).decode(&json!("#12")).unwrap(), 12);
        // Out of range for the native shape, so the serializer sees "-1".
        assert!(SerializedCodec(Counter).decode(&json!(-1)).is_err());
    }

    #[test]
    fn codec_kinds_display() {
        assert_eq!(CodecKind::Identifier.to_string(), "identifier");
        assert_eq!(codec::<u16>().kind(), CodecKind::Integer);
        assert_eq!(codec::<Uuid>().kind(), CodecKind::Identifier);
    }
}
