use std::fmt;

/// A resource reference typed by a human: either an opaque platform ID or a name.
///
/// Platform IDs are 24 lowercase hexadecimal characters. Anything else is taken
/// as a name and has to be resolved through a name-filtered search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Id(String),
    Name(String),
}

impl ResourceRef {
    pub fn parse(value: &str) -> Self {
        if is_object_id(value) {
            ResourceRef::Id(value.to_string())
        } else {
            ResourceRef::Name(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceRef::Id(id) => id,
            ResourceRef::Name(name) => name,
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(value: &str) -> Self {
        ResourceRef::parse(value)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for strings shaped like a platform ID (24 lowercase hex characters)
pub fn is_object_id(value: &str) -> bool {
    value.len() == 24
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
