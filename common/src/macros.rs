/// Declares a string-backed identifier newtype.
///
/// Identifiers are compared by value only, so two ids built from equal strings
/// always resolve to the same entry.
#[macro_export]
macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            PartialEq,
            Eq,
            Ord,
            PartialOrd,
            Debug,
            Hash,
            Default,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> $name {
                $name(id.into())
            }
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> $name {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> $name {
                $name(id)
            }
        }

        impl From<&$name> for $name {
            fn from(id: &$name) -> $name {
                id.clone()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(id: &str) -> Result<$name, Self::Err> {
                Ok($name(id.to_string()))
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    id_type!(TestId);

    #[test]
    fn ids_compare_by_value() {
        let a = TestId::from("a");
        let b: TestId = "a".to_string().into();

        assert_eq!(a, b);
        assert_eq!(a, "a");
        assert_eq!(a.to_string(), "a");
        assert!(TestId::default().is_empty());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TestId::new("node-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"node-1\"");

        let parsed: TestId = serde_json::from_str("\"node-1\"").unwrap();
        assert_eq!(parsed, id);
    }
}
