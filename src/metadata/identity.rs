//! Module identity: the (name, version, culture, public key token) tuple a
//! loader uses to decide whether two modules are "the same" dependency.
//!
//! Identities come in two strengths. A *weakly-named* identity carries no
//! public key token and is matched by name alone at load time; a
//! *strongly-keyed* identity carries a token and is matched on the full
//! tuple, which is why redirecting one requires an explicit old-version to
//! new-version mapping in the manifest rather than a plain location override.
//!
//! Two identities are a *reference match* when name, version, culture and
//! token all agree (the derived equality); a *name match* compares the simple
//! name case-insensitively and ignores the rest.

use std::{fmt, fmt::Write as _, str::FromStr};

use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// Four-part version numbering for binary modules.
///
/// Standard major.minor.build.revision scheme with four 16-bit components,
/// compared component-wise in order. Rendered canonically as
/// `"major.minor.build.revision"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleVersion {
    /// Major version component.
    pub major: u16,
    /// Minor version component.
    pub minor: u16,
    /// Build version component.
    pub build: u16,
    /// Revision version component.
    pub revision: u16,
}

impl ModuleVersion {
    /// Create a new module version with the specified components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a version from string representation.
    ///
    /// Accepts one to four dot-separated components; omitted components
    /// default to zero, so `"1.2"` parses as `1.2.0.0`.
    ///
    /// # Errors
    /// Returns an error if the string is empty, has more than four
    /// components, or a component is not a valid `u16`.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.split('.').collect();

        if parts.is_empty() || parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];

        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for ModuleVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// An 8-byte public key token identifying a strongly-keyed module.
///
/// The token is the trailing 8 bytes of the SHA-1 digest of the full public
/// key, in reversed order, which matches how loaders derive and display it.
/// Rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyToken([u8; 8]);

impl PublicKeyToken {
    /// Wrap raw token bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Derive the token from a full public key blob.
    ///
    /// Computes SHA-1 over the key and takes the last 8 digest bytes in
    /// reversed order.
    #[must_use]
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha1::digest(public_key);
        let mut token = [0u8; 8];
        for (slot, byte) in token.iter_mut().zip(digest[12..20].iter().rev()) {
            *slot = *byte;
        }
        Self(token)
    }

    /// Parse a token from its 16-character hex form.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or does not decode to
    /// exactly 8 bytes.
    pub fn parse(token_str: &str) -> Result<Self> {
        let bytes = hex::decode(token_str)
            .map_err(|e| malformed_error!("Invalid hex in public key token '{}': {}", token_str, e))?;

        if bytes.len() != 8 {
            return Err(malformed_error!(
                "Public key token must be exactly 8 bytes (16 hex characters), got {} bytes from '{}'",
                bytes.len(),
                token_str
            ));
        }

        let mut token = [0u8; 8];
        token.copy_from_slice(&bytes);
        Ok(Self(token))
    }

    /// The raw token bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PublicKeyToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Complete identity information for a binary module.
///
/// The derived equality (and hash) covers all four components, which is the
/// *reference match* used when matching a declared dependency against a
/// discovered candidate. Use [`ModuleIdentity::name_matches`] for the looser
/// name-only comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    /// Simple module name (e.g. "MyLib", "System.Core").
    pub name: String,

    /// Four-part version number used for binding decisions.
    pub version: ModuleVersion,

    /// Localization culture; `None` for culture-neutral modules.
    pub culture: Option<String>,

    /// Public key token; `None` for weakly-named modules.
    ///
    /// An identity with a token present is strongly named and follows the
    /// full-redirect policy during resolution and manifest generation.
    pub public_key_token: Option<PublicKeyToken>,
}

impl ModuleIdentity {
    /// Create a new module identity with the specified components.
    pub fn new(
        name: impl Into<String>,
        version: ModuleVersion,
        culture: Option<String>,
        public_key_token: Option<PublicKeyToken>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            culture,
            public_key_token,
        }
    }

    /// Parse a module identity from display-name form.
    ///
    /// # Format
    ///
    /// ```text
    /// Name[, Version=Major.Minor.Build.Revision][, Culture=culture][, PublicKeyToken=token]
    /// ```
    ///
    /// `Culture=neutral` maps to `None`, as does `PublicKeyToken=null`.
    ///
    /// # Errors
    /// Returns an error if the name is empty or a component fails to parse.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut version = ModuleVersion::new(0, 0, 0, 0);
        let mut culture = None;
        let mut public_key_token = None;

        let parts: Vec<&str> = display_name.split(',').map(str::trim).collect();

        let name = parts[0].to_string();
        if name.is_empty() {
            return Err(malformed_error!("Module name cannot be empty"));
        }

        for part in parts.iter().skip(1) {
            if let Some(value) = part.strip_prefix("Version=") {
                version = ModuleVersion::parse(value)?;
            } else if let Some(value) = part.strip_prefix("Culture=") {
                if value != "neutral" {
                    culture = Some(value.to_string());
                }
            } else if let Some(value) = part.strip_prefix("PublicKeyToken=") {
                if value != "null" && !value.is_empty() {
                    public_key_token = Some(PublicKeyToken::parse(value)?);
                }
            }
        }

        Ok(Self {
            name,
            version,
            culture,
            public_key_token,
        })
    }

    /// Generate the display-name string for this identity.
    ///
    /// This is the literal identity string the candidate index is keyed by;
    /// two identities are a reference match exactly when their display names
    /// are equal.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);

        let _ = write!(result, ", Version={}", self.version);

        let culture_str = self.culture.as_deref().unwrap_or("neutral");
        let _ = write!(result, ", Culture={}", culture_str);

        result.push_str(", PublicKeyToken=");
        match &self.public_key_token {
            Some(token) => {
                let _ = write!(result, "{}", token);
            }
            None => result.push_str("null"),
        }

        result
    }

    /// Whether this identity carries a public key token.
    ///
    /// Strongly-named identities require an explicit old-version to
    /// new-version mapping in the redirect manifest; a location override
    /// alone is not honored by the loader.
    #[must_use]
    pub fn is_strongly_named(&self) -> bool {
        self.public_key_token.is_some()
    }

    /// Whether this identity is culture-neutral.
    #[must_use]
    pub fn is_culture_neutral(&self) -> bool {
        self.culture.is_none()
    }

    /// Name-only match, ignoring version, culture and key.
    ///
    /// Module names are compared case-insensitively, matching loader
    /// behavior.
    #[must_use]
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ModuleIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse_full() {
        let version = ModuleVersion::parse("4.0.0.0").unwrap();
        assert_eq!(version, ModuleVersion::new(4, 0, 0, 0));
    }

    #[test]
    fn test_version_parse_partial() {
        assert_eq!(
            ModuleVersion::parse("1.2.3").unwrap(),
            ModuleVersion::new(1, 2, 3, 0)
        );
        assert_eq!(
            ModuleVersion::parse("1.2").unwrap(),
            ModuleVersion::new(1, 2, 0, 0)
        );
        assert_eq!(
            ModuleVersion::parse("7").unwrap(),
            ModuleVersion::new(7, 0, 0, 0)
        );
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(ModuleVersion::parse("").is_err());
        assert!(ModuleVersion::parse("1.2.3.4.5").is_err());
        assert!(ModuleVersion::parse("1.2.abc.4").is_err());
        assert!(ModuleVersion::parse("1.2.99999.4").is_err());
    }

    #[test]
    fn test_version_display_is_canonical_four_part() {
        assert_eq!(ModuleVersion::new(99, 0, 0, 0).to_string(), "99.0.0.0");
        assert_eq!(ModuleVersion::new(1, 2, 3, 4).to_string(), "1.2.3.4");
    }

    #[test]
    fn test_version_ordering() {
        let v1 = ModuleVersion::new(1, 0, 0, 0);
        let v1_1 = ModuleVersion::new(1, 1, 0, 0);
        let v2 = ModuleVersion::new(2, 0, 0, 0);

        assert!(v1 < v1_1);
        assert!(v1_1 < v2);
    }

    #[test]
    fn test_token_parse_and_display() {
        let token = PublicKeyToken::parse("b77a5c561934e089").unwrap();
        assert_eq!(
            token.as_bytes(),
            &[0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]
        );
        assert_eq!(token.to_string(), "b77a5c561934e089");
    }

    #[test]
    fn test_token_parse_invalid() {
        assert!(PublicKeyToken::parse("not_hex_at_all!!").is_err());
        assert!(PublicKeyToken::parse("b77a5c56").is_err());
        assert!(PublicKeyToken::parse("b77a5c561934e089aabbccdd").is_err());
    }

    #[test]
    fn test_token_from_public_key_is_deterministic() {
        let key = [0x01u8, 0x02, 0x03, 0x04, 0x05];
        let a = PublicKeyToken::from_public_key(&key);
        let b = PublicKeyToken::from_public_key(&key);
        assert_eq!(a, b);

        let other = PublicKeyToken::from_public_key(&[0xFFu8; 16]);
        assert_ne!(a, other);
    }

    #[test]
    fn test_identity_parse_simple_name() {
        let identity = ModuleIdentity::parse("MyLibrary").unwrap();
        assert_eq!(identity.name, "MyLibrary");
        assert_eq!(identity.version, ModuleVersion::new(0, 0, 0, 0));
        assert!(identity.culture.is_none());
        assert!(!identity.is_strongly_named());
    }

    #[test]
    fn test_identity_parse_full() {
        let identity = ModuleIdentity::parse(
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();

        assert_eq!(identity.name, "mscorlib");
        assert_eq!(identity.version, ModuleVersion::new(4, 0, 0, 0));
        assert!(identity.is_culture_neutral());
        assert!(identity.is_strongly_named());
    }

    #[test]
    fn test_identity_parse_with_culture() {
        let identity =
            ModuleIdentity::parse("Resources, Version=1.0.0.0, Culture=en-US, PublicKeyToken=null")
                .unwrap();

        assert_eq!(identity.culture, Some("en-US".to_string()));
        assert!(!identity.is_strongly_named());
    }

    #[test]
    fn test_identity_parse_empty_returns_error() {
        assert!(ModuleIdentity::parse("").is_err());
    }

    #[test]
    fn test_identity_display_name_round_trip() {
        let identity = ModuleIdentity::new(
            "MyLib",
            ModuleVersion::new(1, 2, 3, 4),
            None,
            Some(PublicKeyToken::parse("ab12cd34ef567890").unwrap()),
        );

        let display = identity.display_name();
        assert_eq!(
            display,
            "MyLib, Version=1.2.3.4, Culture=neutral, PublicKeyToken=ab12cd34ef567890"
        );

        let parsed = ModuleIdentity::parse(&display).unwrap();
        assert_eq!(parsed, identity);
    }

    #[test]
    fn test_reference_match_is_full_tuple() {
        let a = ModuleIdentity::new("MyLib", ModuleVersion::new(1, 0, 0, 0), None, None);
        let mut b = a.clone();
        assert_eq!(a, b);

        b.version = ModuleVersion::new(2, 0, 0, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_name_match_ignores_case_and_version() {
        let identity = ModuleIdentity::new("MyLib", ModuleVersion::new(1, 0, 0, 0), None, None);
        assert!(identity.name_matches("mylib"));
        assert!(identity.name_matches("MYLIB"));
        assert!(!identity.name_matches("OtherLib"));
    }
}
