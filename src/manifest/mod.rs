//! Redirect manifests: the loader-side half of a proxy deployment.
//!
//! A redirect manifest is the XML binding configuration that sits next to a
//! target executable and tells the loader to satisfy one dependency from the
//! proxy file instead of the original. For weakly-named dependencies a
//! location override (`codeBase`) is enough; strongly-keyed dependencies
//! additionally need an explicit version mapping (`bindingRedirect`),
//! because the loader's identity check includes the version and would
//! silently ignore a bare location override.
//!
//! Output is deterministic: the same manifest value always serializes to the
//! same bytes, so re-running a generation over its own output is a no-op at
//! the file level.

use std::{
    fs,
    path::{Path, PathBuf},
};

use quick_xml::{
    events::{BytesEnd, BytesStart, Event},
    Reader, Writer,
};

use crate::{
    metadata::identity::{ModuleVersion, PublicKeyToken},
    Result,
};

/// XML namespace of the loader's binding configuration schema.
pub const BINDING_NAMESPACE: &str = "urn:schemas-microsoft-com:asm.v1";

/// A binding override for a single dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectManifest {
    /// Simple name of the redirected dependency.
    pub name: String,
    /// Culture of the dependency; `None` means culture-neutral.
    pub culture: Option<String>,
    /// Public key token for strongly-keyed dependencies.
    pub public_key_token: Option<PublicKeyToken>,
    /// Version the target declared, for the explicit version mapping.
    ///
    /// Present exactly when the dependency is strongly keyed.
    pub old_version: Option<ModuleVersion>,
    /// Version of the module the loader should bind instead.
    pub new_version: ModuleVersion,
    /// Location of the replacement module, relative to the target or as a
    /// bare file name.
    pub location: String,
}

impl RedirectManifest {
    /// Manifest for a weakly-named dependency: location override only.
    #[must_use]
    pub fn location_override(
        name: impl Into<String>,
        culture: Option<String>,
        version: ModuleVersion,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            culture,
            public_key_token: None,
            old_version: None,
            new_version: version,
            location: location.into(),
        }
    }

    /// Manifest for a strongly-keyed dependency: version mapping plus
    /// location override.
    #[must_use]
    pub fn with_redirect(
        name: impl Into<String>,
        culture: Option<String>,
        public_key_token: PublicKeyToken,
        old_version: ModuleVersion,
        new_version: ModuleVersion,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            culture,
            public_key_token: Some(public_key_token),
            old_version: Some(old_version),
            new_version,
            location: location.into(),
        }
    }

    /// Whether this manifest carries an explicit version mapping.
    #[must_use]
    pub fn has_binding_redirect(&self) -> bool {
        self.old_version.is_some()
    }

    /// Serialize to the loader's XML binding configuration format.
    ///
    /// # Errors
    /// Returns [`crate::Error::Xml`] if event writing fails; with an
    /// in-memory buffer that does not happen in practice.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Start(BytesStart::new("configuration")))?;
        writer.write_event(Event::Start(BytesStart::new("runtime")))?;

        let mut binding = BytesStart::new("assemblyBinding");
        binding.push_attribute(("xmlns", BINDING_NAMESPACE));
        writer.write_event(Event::Start(binding))?;

        writer.write_event(Event::Start(BytesStart::new("dependentAssembly")))?;

        let mut identity = BytesStart::new("assemblyIdentity");
        identity.push_attribute(("name", self.name.as_str()));
        identity.push_attribute(("culture", self.culture.as_deref().unwrap_or("neutral")));
        if let Some(token) = &self.public_key_token {
            identity.push_attribute(("publicKeyToken", token.to_string().as_str()));
        }
        writer.write_event(Event::Empty(identity))?;

        if let Some(old_version) = &self.old_version {
            let mut redirect = BytesStart::new("bindingRedirect");
            redirect.push_attribute(("oldVersion", old_version.to_string().as_str()));
            redirect.push_attribute(("newVersion", self.new_version.to_string().as_str()));
            writer.write_event(Event::Empty(redirect))?;
        }

        let mut code_base = BytesStart::new("codeBase");
        code_base.push_attribute(("version", self.new_version.to_string().as_str()));
        code_base.push_attribute(("href", self.location.as_str()));
        writer.write_event(Event::Empty(code_base))?;

        writer.write_event(Event::End(BytesEnd::new("dependentAssembly")))?;
        writer.write_event(Event::End(BytesEnd::new("assemblyBinding")))?;
        writer.write_event(Event::End(BytesEnd::new("runtime")))?;
        writer.write_event(Event::End(BytesEnd::new("configuration")))?;

        let buffer = writer.into_inner();
        String::from_utf8(buffer).map_err(|e| crate::Error::Error(e.to_string()))
    }

    /// Parse a manifest back out of its XML form.
    ///
    /// Only the elements this generator emits are interpreted; anything else
    /// in the document is ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Xml`] on malformed XML and
    /// [`crate::Error::Malformed`] when required elements or attributes are
    /// absent or unparseable.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut name = None;
        let mut culture = None;
        let mut public_key_token = None;
        let mut old_version = None;
        let mut new_version = None;
        let mut location = None;

        loop {
            match reader.read_event()? {
                Event::Start(element) | Event::Empty(element) => {
                    match element.local_name().as_ref() {
                        b"assemblyIdentity" => {
                            for attribute in element.attributes() {
                                let attribute = attribute.map_err(quick_xml::Error::from)?;
                                let value = attribute.unescape_value()?.into_owned();
                                match attribute.key.local_name().as_ref() {
                                    b"name" => name = Some(value),
                                    b"culture" => {
                                        if !value.eq_ignore_ascii_case("neutral") {
                                            culture = Some(value);
                                        }
                                    }
                                    b"publicKeyToken" => {
                                        public_key_token = Some(value.parse::<PublicKeyToken>()?);
                                    }
                                    _ => {}
                                }
                            }
                        }
                        b"bindingRedirect" => {
                            for attribute in element.attributes() {
                                let attribute = attribute.map_err(quick_xml::Error::from)?;
                                let value = attribute.unescape_value()?;
                                match attribute.key.local_name().as_ref() {
                                    b"oldVersion" => {
                                        old_version = Some(value.parse::<ModuleVersion>()?);
                                    }
                                    b"newVersion" => {
                                        new_version = Some(value.parse::<ModuleVersion>()?);
                                    }
                                    _ => {}
                                }
                            }
                        }
                        b"codeBase" => {
                            for attribute in element.attributes() {
                                let attribute = attribute.map_err(quick_xml::Error::from)?;
                                let value = attribute.unescape_value()?;
                                match attribute.key.local_name().as_ref() {
                                    b"version" => {
                                        new_version = Some(value.parse::<ModuleVersion>()?);
                                    }
                                    b"href" => location = Some(value.into_owned()),
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let name = name.ok_or_else(|| malformed_error!("Manifest has no assemblyIdentity name"))?;
        let new_version =
            new_version.ok_or_else(|| malformed_error!("Manifest has no codeBase version"))?;
        let location = location.ok_or_else(|| malformed_error!("Manifest has no codeBase href"))?;

        Ok(Self {
            name,
            culture,
            public_key_token,
            old_version,
            new_version,
            location,
        })
    }

    /// Write the manifest next to its target.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}

/// The manifest path the loader probes for a given executable target.
///
/// For a target `app.exe` this is `app.exe.config` in the same directory.
#[must_use]
pub fn config_path_for(target: &Path) -> PathBuf {
    target.with_extension("exe.config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weakly_named_manifest_has_no_binding_redirect() {
        let manifest = RedirectManifest::location_override(
            "MyLib",
            None,
            ModuleVersion::new(1, 0, 0, 0),
            "libs/MyLib-proxy.dll",
        );

        let xml = manifest.to_xml().unwrap();
        assert!(xml.contains("urn:schemas-microsoft-com:asm.v1"));
        assert!(xml.contains(r#"name="MyLib""#));
        assert!(xml.contains(r#"culture="neutral""#));
        assert!(xml.contains(r#"href="libs/MyLib-proxy.dll""#));
        assert!(xml.contains(r#"version="1.0.0.0""#));
        assert!(!xml.contains("bindingRedirect"));
        assert!(!xml.contains("publicKeyToken"));

        assert_eq!(RedirectManifest::parse(&xml).unwrap(), manifest);
    }

    #[test]
    fn strongly_keyed_manifest_round_trips() {
        let manifest = RedirectManifest::with_redirect(
            "SignedLib",
            None,
            PublicKeyToken::new([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]),
            ModuleVersion::new(1, 0, 0, 0),
            ModuleVersion::new(99, 0, 0, 0),
            "SignedLib-proxy.dll",
        );

        let xml = manifest.to_xml().unwrap();
        assert!(xml.contains(r#"publicKeyToken="b77a5c561934e089""#));
        assert!(xml.contains(r#"oldVersion="1.0.0.0""#));
        assert!(xml.contains(r#"newVersion="99.0.0.0""#));
        assert!(xml.contains(r#"version="99.0.0.0""#));

        assert_eq!(RedirectManifest::parse(&xml).unwrap(), manifest);
    }

    #[test]
    fn serialization_is_deterministic() {
        let manifest = RedirectManifest::location_override(
            "MyLib",
            Some("en-US".to_string()),
            ModuleVersion::new(2, 1, 0, 0),
            "MyLib-proxy.dll",
        );

        assert_eq!(manifest.to_xml().unwrap(), manifest.to_xml().unwrap());
    }

    #[test]
    fn explicit_culture_survives_round_trip() {
        let manifest = RedirectManifest::location_override(
            "Localized",
            Some("de-DE".to_string()),
            ModuleVersion::new(1, 0, 0, 0),
            "Localized-proxy.dll",
        );

        let parsed = RedirectManifest::parse(&manifest.to_xml().unwrap()).unwrap();
        assert_eq!(parsed.culture.as_deref(), Some("de-DE"));
    }

    #[test]
    fn parse_rejects_incomplete_documents() {
        let missing_code_base = r#"<configuration><runtime>
            <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
              <dependentAssembly>
                <assemblyIdentity name="MyLib" culture="neutral"/>
              </dependentAssembly>
            </assemblyBinding>
          </runtime></configuration>"#;

        assert!(RedirectManifest::parse(missing_code_base).is_err());
        assert!(RedirectManifest::parse("<configuration>").is_err());
    }

    #[test]
    fn config_path_sits_next_to_the_target() {
        let path = config_path_for(Path::new("/opt/app/app.exe"));
        assert_eq!(path, Path::new("/opt/app/app.exe.config"));
    }
}
