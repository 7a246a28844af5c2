use std::fmt::{self, Display};

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::parameters::Parameter;

/// The parameter values that identify one combination of a sweep, in axis order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    values: Vec<(Parameter, f64)>,
}

impl Tag {
    #[must_use]
    pub fn new(values: Vec<(Parameter, f64)>) -> Self {
        Tag { values }
    }

    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.values
            .iter()
            .find(|(tagged, _)| *tagged == parameter)
            .map(|&(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f64)> + '_ {
        self.values.iter().copied()
    }

    pub fn parameters(&self) -> impl Iterator<Item = Parameter> + '_ {
        self.values.iter().map(|&(parameter, _)| parameter)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The lookup key of this tag.
    #[must_use]
    pub fn key(&self) -> TagKey {
        TagKey::new(self.values.iter().copied())
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str("(no tag)");
        }
        for (i, (parameter, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{parameter}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (parameter, value) in &self.values {
            map.serialize_entry(parameter, value)?;
        }
        map.end()
    }
}

// The lookup key for a tag: the parameter indices and the bit patterns of their values laid
// end to end. Keys that fit in 128 bits (a single axis) are stored in `Fixed` to avoid
// allocating.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[doc(hidden)]
pub enum TagKey {
    Fixed(u128),
    Variable(Vec<u8>),
}

impl TagKey {
    pub fn new(values: impl IntoIterator<Item = (Parameter, f64)>) -> TagKey {
        let mut buf = Vec::new();
        for (parameter, value) in values {
            buf.push(parameter.index() as u8);
            buf.extend_from_slice(&value_bits(value).to_le_bytes());
        }
        if buf.len() <= 16 {
            let mut tmp: [u8; 16] = [0; 16];
            tmp[..buf.len()].copy_from_slice(&buf);
            return TagKey::Fixed(u128::from_le_bytes(tmp));
        }
        TagKey::Variable(buf)
    }
}

/// `-0.0` and `0.0` compare equal, so they must share a key.
fn value_bits(value: f64) -> u64 {
    (value + 0.0).to_bits()
}
