use std::fmt;

use uuid::Uuid;

/// Key of one uploaded image, both in the bucket and in the local cache.
///
/// Only constructed through [`ObjKey::generate`] or [`ObjKey::parse`], so any
/// value of this type is safe to splice into a storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjKey(String);

impl ObjKey {
    /// Fresh random (version 4) key in simple hex form.
    pub fn generate() -> Self {
        ObjKey(Uuid::new_v4().simple().to_string())
    }

    /// Accepts only keys this service could have issued.
    pub fn parse(raw: &str) -> Option<Self> {
        if is_valid_obj_key(raw) {
            Some(ObjKey(raw.to_owned()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key is valid iff it is a version 4 UUID whose canonical simple form is
/// exactly the given string.
pub fn is_valid_obj_key(raw: &str) -> bool {
    match Uuid::try_parse(raw) {
        Ok(uuid) => uuid.get_version_num() == 4 && uuid.simple().to_string() == raw,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_keys_are_valid() {
        for _ in 0..100 {
            let key = ObjKey::generate();
            assert_eq!(key.as_str().len(), 32);
            assert!(is_valid_obj_key(key.as_str()));
        }
    }

    #[test]
    fn generated_keys_do_not_repeat() {
        let keys: HashSet<_> = (0..1000).map(|_| ObjKey::generate()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn rejects_non_canonical_forms() {
        let key = ObjKey::generate();
        let uuid = Uuid::try_parse(key.as_str()).unwrap();

        assert!(!is_valid_obj_key(&uuid.hyphenated().to_string()));
        assert!(!is_valid_obj_key(&uuid.braced().to_string()));
        assert!(!is_valid_obj_key(&uuid.urn().to_string()));
        assert!(!is_valid_obj_key(&key.as_str().to_uppercase()));
        assert!(!is_valid_obj_key(&format!(" {}", key)));
        assert!(!is_valid_obj_key(&format!("{}\n", key)));
    }

    #[test]
    fn rejects_wrong_version() {
        // version nibble is 1
        assert!(!is_valid_obj_key("c232ab00946111ee9e0e0242ac120002"));
        assert!(!is_valid_obj_key("00000000000000000000000000000000"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_obj_key(""));
        assert!(!is_valid_obj_key("not-a-uuid"));
        assert!(!is_valid_obj_key("../../etc/passwd"));
        assert!(ObjKey::parse("not-a-uuid").is_none());
    }

    #[test]
    fn accepts_v4_simple_form() {
        assert!(is_valid_obj_key("9f1c5bd2e0a44c1b8f3e2a7d6c5b4a39"));
        let key = ObjKey::parse("9f1c5bd2e0a44c1b8f3e2a7d6c5b4a39").unwrap();
        assert_eq!(key.to_string(), "9f1c5bd2e0a44c1b8f3e2a7d6c5b4a39");
    }
}
