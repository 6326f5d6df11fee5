//! End-to-end proxy generation.
//!
//! [`ProxyGenerator`] wires the stages together: validate the target,
//! discover candidates beside it, resolve one declared reference, strip the
//! resolved module, inject the load-time hook, and emit the proxy plus its
//! redirect manifest. Output ordering is part of the contract: the manifest
//! XML is assembled in memory before anything touches the disk, and if the
//! manifest cannot be written after the proxy was, the proxy is removed
//! again so a run never leaves half a deployment behind.

use std::path::{Path, PathBuf};

use crate::{
    diagnostics::Diagnostics,
    manifest::{config_path_for, RedirectManifest},
    metadata::{
        identity::{ModuleIdentity, ModuleVersion},
        store::ModuleStore,
    },
    resolve::{
        index::{CandidateIndex, MODULE_EXTENSION, PROXY_SUFFIX},
        resolver::{ReferenceResolver, ResolutionPolicy, SystemResolver},
    },
    transform::{hook::install_initializer, hook::HookContract, strip::strip_module},
    Error, Result,
};

/// Version stamped onto proxies for strongly-keyed dependencies.
///
/// The manifest's version mapping points the declared version at this one,
/// and the proxy module's own identity is rewritten to match, so the
/// loader's post-redirect identity check agrees with what it finds on disk.
pub const REDIRECT_VERSION: ModuleVersion = ModuleVersion::new(99, 0, 0, 0);

/// File extension expected of executable targets.
pub const TARGET_EXTENSION: &str = "exe";

/// What a successful generation produced.
#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    /// Identity of the dependency that was proxied, as the target declared
    /// it.
    pub declared: ModuleIdentity,
    /// Where the proxy module was written.
    pub proxy_path: PathBuf,
    /// Where the redirect manifest was written.
    pub manifest_path: PathBuf,
}

/// Drives a full proxy generation over one executable target.
pub struct ProxyGenerator<'a> {
    store: &'a dyn ModuleStore,
    resolver: &'a dyn SystemResolver,
    policy: ResolutionPolicy,
    contract: HookContract,
    diagnostics: Diagnostics,
}

impl<'a> ProxyGenerator<'a> {
    /// Create a generator with the default hook contract.
    pub fn new(
        store: &'a dyn ModuleStore,
        resolver: &'a dyn SystemResolver,
        policy: ResolutionPolicy,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            store,
            resolver,
            policy,
            contract: HookContract::default(),
            diagnostics,
        }
    }

    /// Replace the hook contract, builder-style.
    #[must_use]
    pub fn with_contract(mut self, contract: HookContract) -> Self {
        self.contract = contract;
        self
    }

    /// Generate a proxy module and redirect manifest for `target`.
    ///
    /// The proxy lands next to the resolved dependency as
    /// `<Name>-proxy.dll`; the manifest lands next to the target as
    /// `<target>.exe.config`.
    ///
    /// # Errors
    /// Returns [`Error::UnusableTarget`] for a missing or non-executable
    /// target and [`Error::NoSuitableModule`] when no declared reference can
    /// be proxied; both abort before any file is written. Write failures
    /// after that point clean up the proxy before propagating.
    pub fn generate(&self, target: &Path) -> Result<ProxyOutcome> {
        let target = validated_target(target)?;
        let target_dir = parent_dir(target);

        self.diagnostics
            .message(format!("Loading target: {}", target.display()));
        let target_module = self.store.open(target)?;

        let index = CandidateIndex::scan(target_dir, self.store, &self.diagnostics)?;
        let selected = ReferenceResolver::new(self.resolver, self.policy).select(
            &target_module.references,
            &index,
            &self.diagnostics,
        )?;
        self.diagnostics.message(format!(
            "Selected dependency: {}",
            selected.declared.display_name()
        ));

        let mut proxy = self.store.open(&selected.candidate.path)?;
        strip_module(&mut proxy);
        install_initializer(&mut proxy, &self.contract)?;

        if selected.requires_binding_redirect() {
            proxy.identity.version = REDIRECT_VERSION;
        }

        let proxy_path = selected
            .candidate
            .path
            .with_file_name(proxy_file_name(&selected.declared.name, MODULE_EXTENSION));
        let location = manifest_location(&proxy_path, target_dir);

        let manifest = if selected.requires_binding_redirect() {
            let token = selected
                .declared
                .public_key_token
                .clone()
                .ok_or_else(|| malformed_error!("Strongly-named reference lacks a key token"))?;
            RedirectManifest::with_redirect(
                selected.declared.name.clone(),
                selected.declared.culture.clone(),
                token,
                selected.declared.version,
                REDIRECT_VERSION,
                location,
            )
        } else {
            RedirectManifest::location_override(
                selected.declared.name.clone(),
                selected.declared.culture.clone(),
                proxy.identity.version,
                location,
            )
        };

        // Serialize before writing anything so an unencodable manifest
        // cannot strand a proxy on disk.
        let manifest_xml = manifest.to_xml()?;

        self.store.write(&proxy, &proxy_path)?;
        self.diagnostics
            .message(format!("Wrote proxy module: {}", proxy_path.display()));

        let manifest_path = config_path_for(target);
        if let Err(e) = std::fs::write(&manifest_path, &manifest_xml) {
            let _ = std::fs::remove_file(&proxy_path);
            return Err(e.into());
        }
        self.diagnostics
            .message(format!("Wrote redirect manifest: {}", manifest_path.display()));

        Ok(ProxyOutcome {
            declared: selected.declared,
            proxy_path,
            manifest_path,
        })
    }

    /// Inject the load-time hook into one module directly, without
    /// resolution or a manifest.
    ///
    /// Writes `<stem>-proxy.<ext>` next to the input and returns its path.
    /// When `strip` is set the module is hollowed out first, exactly as in
    /// full generation.
    ///
    /// # Errors
    /// Returns [`Error::UnusableTarget`] if the path does not name a module
    /// file, plus any parse or injection error from the module itself.
    pub fn install_hook(&self, module_path: &Path, strip: bool) -> Result<PathBuf> {
        let stem = module_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::UnusableTarget(module_path.display().to_string()))?;
        let extension = module_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(MODULE_EXTENSION);

        let mut module = self.store.open(module_path)?;
        if strip {
            strip_module(&mut module);
        }
        install_initializer(&mut module, &self.contract)?;

        let out_path = module_path.with_file_name(proxy_file_name(stem, extension));
        self.store.write(&module, &out_path)?;
        self.diagnostics
            .message(format!("Wrote hooked module: {}", out_path.display()));

        Ok(out_path)
    }
}

/// Reject targets that do not exist or are not executables.
fn validated_target(target: &Path) -> Result<&Path> {
    let is_executable = target
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(TARGET_EXTENSION));

    if !is_executable || !target.is_file() {
        return Err(Error::UnusableTarget(target.display().to_string()));
    }
    Ok(target)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn proxy_file_name(stem: &str, extension: &str) -> String {
    format!("{stem}{PROXY_SUFFIX}.{extension}")
}

/// The `href` value for the manifest: relative to the target's directory
/// when the proxy sits beneath it, the bare file name otherwise.
fn manifest_location(proxy_path: &Path, target_dir: &Path) -> String {
    match proxy_path.strip_prefix(target_dir) {
        Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
        Err(_) => proxy_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
