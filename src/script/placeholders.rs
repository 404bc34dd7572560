//! Resolving `<<username>>`/`<<password>>`/`<<enable>>`/`<<enable_password>>`
//! and custom `<<name>>` tokens in a script's `@write`/`@send` payloads
//! against the session's credentials and variables.

use std::collections::HashMap;

use crate::config::CredentialsConfig;
use crate::errors::ExpectError;

/// The set of custom placeholder names a script registered via
/// `RegisterPlaceholder`, resolved against [`crate::session::Session`]'s
/// variable bag at substitution time.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRegistry {
    custom: Vec<String>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` so `<<name>>` resolves against a session variable of
    /// the same name at substitution time.
    pub fn register(&mut self, name: impl Into<String>) {
        self.custom.push(name.into());
    }

    /// Replace every known placeholder token in `buf`. Fails if a
    /// registered custom placeholder's variable isn't set.
    pub fn substitute(
        &self,
        buf: &[u8],
        credentials: &CredentialsConfig,
        variables: &HashMap<String, String>,
    ) -> Result<Vec<u8>, ExpectError> {
        let mut out = buf.to_vec();
        out = replace_all(&out, b"<<username>>", credentials.username.as_bytes());
        out = replace_all(&out, b"<<password>>", credentials.password.as_bytes());
        out = replace_all(&out, b"<<enable>>", credentials.enable_command.as_bytes());
        out = replace_all(&out, b"<<enable_password>>", credentials.enable_password.as_bytes());

        for name in &self.custom {
            let tag = format!("<<{name}>>");
            if contains(&out, tag.as_bytes()) {
                let value = variables
                    .get(name)
                    .ok_or_else(|| ExpectError::UnknownVariable(name.clone()))?;
                out = replace_all(&out, tag.as_bytes(), value.as_bytes());
            }
        }

        Ok(out)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> CredentialsConfig {
        CredentialsConfig {
            username: "admin".into(),
            password: "hunter2".into(),
            enable_command: "enable".into(),
            enable_password: "enpw".into(),
        }
    }

    #[test]
    fn substitutes_builtin_placeholders() {
        let reg = PlaceholderRegistry::new();
        let out = reg
            .substitute(b"login <<username>> <<password>>", &creds(), &HashMap::new())
            .unwrap();
        assert_eq!(out, b"login admin hunter2");
    }

    #[test]
    fn substitutes_custom_registered_placeholder() {
        let mut reg = PlaceholderRegistry::new();
        reg.register("site");
        let mut vars = HashMap::new();
        vars.insert("site".to_string(), "dc1".to_string());
        let out = reg.substitute(b"set location <<site>>", &creds(), &vars).unwrap();
        assert_eq!(out, b"set location dc1");
    }

    #[test]
    fn unregistered_custom_placeholder_is_left_alone() {
        let reg = PlaceholderRegistry::new();
        let out = reg.substitute(b"set location <<site>>", &creds(), &HashMap::new()).unwrap();
        assert_eq!(out, b"set location <<site>>");
    }

    #[test]
    fn missing_variable_for_registered_placeholder_errors() {
        let mut reg = PlaceholderRegistry::new();
        reg.register("site");
        let err = reg.substitute(b"set location <<site>>", &creds(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ExpectError::UnknownVariable(_)));
    }
}
