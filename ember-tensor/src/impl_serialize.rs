use std::fmt;

use serde::de::{Deserialize, Deserializer, Error, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::Tensor;

impl<T: Serialize> Serialize for Tensor<T> {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let mut tensor = serializer.serialize_struct("Tensor", 2)?;
        tensor.serialize_field("shape", self.shape())?;
        tensor.serialize_field("data", self.data())?;
        tensor.end()
    }
}

struct TensorVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

impl<'de, T> Visitor<'de> for TensorVisitor<T>
where
    T: Deserialize<'de>,
{
    type Value = Tensor<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a tensor with \"shape\" and \"data\" fields")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut data: Option<Vec<T>> = None;
        let mut shape: Option<Vec<usize>> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "data" => {
                    if data.is_some() {
                        return Err(A::Error::duplicate_field("data"));
                    }
                    data = Some(map.next_value()?);
                }
                "shape" => {
                    if shape.is_some() {
                        return Err(A::Error::duplicate_field("shape"));
                    }
                    shape = Some(map.next_value()?);
                }
                _ => {
                    return Err(A::Error::unknown_field(&key, &["data", "shape"]));
                }
            }
        }

        let data = data.ok_or_else(|| A::Error::missing_field("data"))?;
        let shape = shape.ok_or_else(|| A::Error::missing_field("shape"))?;
        Tensor::from_data(&shape, data).map_err(A::Error::custom)
    }
}

impl<'de, T> Deserialize<'de> for Tensor<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TensorVisitor {
            marker: std::marker::PhantomData,
        })
    }
}
