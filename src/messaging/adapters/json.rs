//! JSON serializer with case-insensitive field matching on read.

use crate::messaging::ports::{MessageSerializer, SerializationError, SerializationResult};
use serde::Serialize;
use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{
    DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, Error as _, IntoDeserializer,
    Unexpected, VariantAccess, Visitor,
};
use serde::forward_to_deserialize_any;
use serde_json::Value;

/// [`MessageSerializer`] backed by `serde_json`.
///
/// Output field names are whatever the type's serde attributes produce, so
/// body types are expected to carry `#[serde(rename_all = "camelCase")]`.
/// On read, object keys are matched against a struct's field names ignoring
/// ASCII case at every nesting level, so `{"Data": 1}`, `{"data": 1}` and
/// `{"DATA": 1}` all populate a field named `data`. Externally tagged enum
/// variant names and the fields of struct variants match the same way.
///
/// Types deserialized through serde's buffered paths see keys as written:
/// structs containing `#[serde(flatten)]` fields, and internally tagged or
/// untagged enums. Their keys must match the serialized names exactly.
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use switchyard::messaging::adapters::JsonSerializer;
/// use switchyard::messaging::ports::MessageSerializer;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// #[serde(rename_all = "camelCase")]
/// struct Greeting {
///     display_name: String,
/// }
///
/// let greeting: Greeting = JsonSerializer::new()
///     .deserialize(r#"{"DisplayName":"Ada"}"#)
///     .expect("case-insensitive read");
/// assert_eq!(greeting.display_name, "Ada");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Creates a JSON serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageSerializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> SerializationResult<String>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_string(value).map_err(SerializationError::serialize)
    }

    fn deserialize<T>(&self, text: &str) -> SerializationResult<T>
    where
        T: DeserializeOwned,
    {
        let value: Value = serde_json::from_str(text).map_err(SerializationError::deserialize)?;
        T::deserialize(CaseInsensitive(value)).map_err(SerializationError::deserialize)
    }
}

/// Deserializer over a parsed JSON value that renames object keys to the
/// target struct's declared field names before handing them to serde.
struct CaseInsensitive(Value);

impl<'de> IntoDeserializer<'de, serde_json::Error> for CaseInsensitive {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

/// Returns the declared field matching `key`, preferring an exact match.
fn declared_field(key: String, fields: &'static [&'static str]) -> String {
    if fields.contains(&key.as_str()) {
        return key;
    }
    fields
        .iter()
        .find(|field| field.eq_ignore_ascii_case(&key))
        .map_or(key, |field| (*field).to_owned())
}

impl<'de> Deserializer<'de> for CaseInsensitive {
    type Error = serde_json::Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Array(items) => {
                let mut access: SeqDeserializer<_, serde_json::Error> =
                    SeqDeserializer::new(items.into_iter().map(CaseInsensitive));
                let value = visitor.visit_seq(&mut access)?;
                access.end()?;
                Ok(value)
            }
            Value::Object(entries) => {
                let mut access: MapDeserializer<'de, _, serde_json::Error> = MapDeserializer::new(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key, CaseInsensitive(value))),
                );
                let value = visitor.visit_map(&mut access)?;
                access.end()?;
                Ok(value)
            }
            scalar => scalar.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Object(entries) => {
                let mut access: MapDeserializer<'de, _, serde_json::Error> = MapDeserializer::new(
                    entries
                        .into_iter()
                        .map(|(key, value)| (declared_field(key, fields), CaseInsensitive(value))),
                );
                let value = visitor.visit_map(&mut access)?;
                access.end()?;
                Ok(value)
            }
            other => Self(other).deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let (variant, content) = match self.0 {
            Value::String(variant) => (variant, None),
            Value::Object(entries) if entries.len() == 1 => {
                let mut entries = entries.into_iter();
                let Some((variant, content)) = entries.next() else {
                    return Err(serde_json::Error::custom(format!("missing {name} variant")));
                };
                (variant, Some(content))
            }
            other => {
                return Err(serde_json::Error::invalid_type(
                    unexpected(&other),
                    &"a variant name or a single-key object",
                ));
            }
        };
        visitor.visit_enum(CaseInsensitiveVariant {
            variant: declared_field(variant, variants),
            content,
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier
        ignored_any
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(flag) => Unexpected::Bool(*flag),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(text) => Unexpected::Str(text),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn invalid_variant(content: Option<&Value>, expected: &'static str) -> serde_json::Error {
    let found = content.map_or(Unexpected::UnitVariant, unexpected);
    serde_json::Error::invalid_type(found, &expected)
}

/// Externally tagged enum value whose variant name has already been matched
/// against the declared variants.
struct CaseInsensitiveVariant {
    variant: String,
    content: Option<Value>,
}

impl<'de> EnumAccess<'de> for CaseInsensitiveVariant {
    type Error = serde_json::Error;
    type Variant = VariantContent;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(StringDeserializer::<serde_json::Error>::new(self.variant))?;
        Ok((variant, VariantContent(self.content)))
    }
}

struct VariantContent(Option<Value>);

impl<'de> VariantAccess<'de> for VariantContent {
    type Error = serde_json::Error;

    fn unit_variant(self) -> Result<(), Self::Error> {
        match self.0 {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(invalid_variant(Some(&other), "unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.0 {
            Some(value) => seed.deserialize(CaseInsensitive(value)),
            None => Err(invalid_variant(None, "newtype variant")),
        }
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Some(value @ Value::Array(_)) => CaseInsensitive(value).deserialize_any(visitor),
            other => Err(invalid_variant(other.as_ref(), "tuple variant")),
        }
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Some(value @ Value::Object(_)) => {
                CaseInsensitive(value).deserialize_struct("", fields, visitor)
            }
            other => Err(invalid_variant(other.as_ref(), "struct variant")),
        }
    }
}
